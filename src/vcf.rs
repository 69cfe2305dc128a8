//! Streaming VCF reader and writer.
//!
//! Records keep every column as read so that writing a record back out
//! reproduces the input line byte-for-byte, except for INFO fields added
//! by an annotating command.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use memchr::memchr_iter;

use crate::error::{Result, SvError};
use crate::order::ContigOrder;
use crate::streaming::buffers::{
    DEFAULT_INPUT_BUFFER, DEFAULT_LINE_BUFFER, DEFAULT_OUTPUT_BUFFER,
};
use crate::streaming::Positioned;

/// Structural variant class taken from the `SVTYPE` INFO field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SvType {
    Del,
    Ins,
    Dup,
    Inv,
    Bnd,
    Cnv,
    Other(String),
}

impl SvType {
    /// Parse an `SVTYPE` value. Anything other than the exact standard
    /// names is kept verbatim in `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "DEL" => SvType::Del,
            "INS" => SvType::Ins,
            "DUP" => SvType::Dup,
            "INV" => SvType::Inv,
            "BND" => SvType::Bnd,
            "CNV" => SvType::Cnv,
            _ => SvType::Other(s.to_string()),
        }
    }

    /// Insertions and duplications are interchangeable for matching.
    #[inline]
    pub fn is_insertion_like(&self) -> bool {
        matches!(self, SvType::Ins | SvType::Dup)
    }

    pub fn as_str(&self) -> &str {
        match self {
            SvType::Del => "DEL",
            SvType::Ins => "INS",
            SvType::Dup => "DUP",
            SvType::Inv => "INV",
            SvType::Bnd => "BND",
            SvType::Cnv => "CNV",
            SvType::Other(s) => s,
        }
    }
}

impl fmt::Display for SvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered INFO column. Flags have no value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    fields: Vec<(String, Option<String>)>,
}

impl Info {
    pub fn parse(column: &str) -> Self {
        if column == "." || column.is_empty() {
            return Self::default();
        }
        let fields = column
            .split(';')
            .filter(|f| !f.is_empty())
            .map(|f| match f.split_once('=') {
                Some((k, v)) => (k.to_string(), Some(v.to_string())),
                None => (f.to_string(), None),
            })
            .collect();
        Self { fields }
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Value of a key. Flags return `Some("")`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    /// Raw entry of a key, keeping the flag/value distinction.
    pub fn entry(&self, key: &str) -> Option<&Option<String>> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Append a field unless the key is already present.
    ///
    /// Returns true if the field was added.
    pub fn insert_if_absent(&mut self, key: &str, value: Option<String>) -> bool {
        if self.contains(key) {
            return false;
        }
        self.fields.push((key.to_string(), value));
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return f.write_str(".");
        }
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            f.write_str(k)?;
            if let Some(v) = v {
                write!(f, "={}", v)?;
            }
        }
        Ok(())
    }
}

/// A single VCF data line.
///
/// `start`/`stop` are 0-based half-open. `start = POS - 1`; `stop` is the
/// INFO `END` when present, `start` for breakends, else `start + len(REF)`.
#[derive(Debug, Clone)]
pub struct VcfRecord {
    pub chrom: String,
    /// 1-based POS column.
    pub pos: u64,
    pub id: String,
    pub ref_allele: String,
    pub alt: String,
    pub qual: String,
    pub filter: String,
    pub info: Info,
    pub format: Option<String>,
    pub samples: Vec<String>,
    pub start: u64,
    pub stop: u64,
    pub svtype: Option<SvType>,
    pub svlen: Option<u64>,
}

impl VcfRecord {
    /// Build a record from its columns and derive coordinates, SVTYPE and SVLEN.
    pub fn new(
        chrom: impl Into<String>,
        pos: u64,
        ref_allele: impl Into<String>,
        alt: impl Into<String>,
        info: Info,
    ) -> Self {
        let mut record = Self {
            chrom: chrom.into(),
            pos,
            id: ".".to_string(),
            ref_allele: ref_allele.into(),
            alt: alt.into(),
            qual: ".".to_string(),
            filter: ".".to_string(),
            info,
            format: None,
            samples: Vec::new(),
            start: 0,
            stop: 0,
            svtype: None,
            svlen: None,
        };
        record.derive_fields();
        record
    }

    fn derive_fields(&mut self) {
        self.start = self.pos.saturating_sub(1);
        self.svtype = self.info.get("SVTYPE").map(SvType::parse);
        let end = self.info.get("END").and_then(|v| v.parse::<u64>().ok());

        self.stop = match (&self.svtype, end) {
            (Some(SvType::Bnd), _) => self.start,
            (_, Some(end)) => end.max(self.start),
            _ => self.start + self.ref_allele.len() as u64,
        };

        self.svlen = self.derive_svlen(end);
    }

    fn derive_svlen(&self, end: Option<u64>) -> Option<u64> {
        if let Some(len) = self.info.get("SVLEN").and_then(first_signed) {
            return Some(len.unsigned_abs());
        }
        if self.svtype == Some(SvType::Bnd) {
            return self
                .info
                .get("MATEDIST")
                .and_then(first_signed)
                .map(i64::unsigned_abs);
        }
        let alt = self.alt.split(',').next().unwrap_or(".");
        if is_sequence_allele(alt) {
            return Some((alt.len() as i64 - self.ref_allele.len() as i64).unsigned_abs());
        }
        end.map(|end| end.saturating_sub(self.pos))
    }

    /// Record length, if defined.
    #[inline]
    pub fn svlen(&self) -> Option<u64> {
        self.svlen
    }

    #[inline]
    pub fn svtype(&self) -> Option<&SvType> {
        self.svtype.as_ref()
    }

    /// FILTER is `PASS` or missing.
    #[inline]
    pub fn filter_passes(&self) -> bool {
        self.filter == "PASS" || self.filter == "."
    }

    /// GT subfield of each sample, `None` when the sample has no GT.
    pub fn genotypes(&self) -> Vec<Option<&str>> {
        let gt_idx = self
            .format
            .as_deref()
            .and_then(|f| f.split(':').position(|k| k == "GT"));
        self.samples
            .iter()
            .map(|s| gt_idx.and_then(|i| s.split(':').nth(i)))
            .collect()
    }

    /// Serialize the record as a VCF line (without newline).
    pub fn write_to<W: Write>(&self, out: &mut W, itoa_buf: &mut itoa::Buffer) -> io::Result<()> {
        out.write_all(self.chrom.as_bytes())?;
        out.write_all(b"\t")?;
        out.write_all(itoa_buf.format(self.pos).as_bytes())?;
        for col in [
            &self.id,
            &self.ref_allele,
            &self.alt,
            &self.qual,
            &self.filter,
        ] {
            out.write_all(b"\t")?;
            out.write_all(col.as_bytes())?;
        }
        write!(out, "\t{}", self.info)?;
        if let Some(format) = &self.format {
            out.write_all(b"\t")?;
            out.write_all(format.as_bytes())?;
            for sample in &self.samples {
                out.write_all(b"\t")?;
                out.write_all(sample.as_bytes())?;
            }
        }
        Ok(())
    }
}

impl Positioned for VcfRecord {
    #[inline]
    fn chrom(&self) -> &str {
        &self.chrom
    }

    #[inline]
    fn position(&self) -> u64 {
        self.start
    }
}

fn first_signed(value: &str) -> Option<i64> {
    value.split(',').next()?.parse().ok()
}

fn is_sequence_allele(alt: &str) -> bool {
    !alt.is_empty()
        && alt != "."
        && alt != "*"
        && !alt.contains(['<', '[', ']'])
}

/// Meta lines, column header and sample names.
#[derive(Debug, Clone, Default)]
pub struct VcfHeader {
    meta: Vec<String>,
    column_line: String,
    samples: Vec<String>,
}

impl VcfHeader {
    pub fn new(meta: Vec<String>, column_line: String) -> Self {
        let samples = column_line.split('\t').skip(9).map(str::to_string).collect();
        Self {
            meta,
            column_line,
            samples,
        }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn meta_lines(&self) -> &[String] {
        &self.meta
    }

    /// Contig order declared by `##contig` lines.
    pub fn contig_order(&self) -> ContigOrder {
        ContigOrder::from_names(self.meta.iter().filter_map(|l| structured_id(l, "##contig=<")))
    }

    pub fn has_info(&self, id: &str) -> bool {
        self.meta
            .iter()
            .filter_map(|l| structured_id(l, "##INFO=<"))
            .any(|existing| existing == id)
    }

    /// The `##INFO` line declaring `id`, if any.
    pub fn info_line(&self, id: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|l| structured_id(l, "##INFO=<") == Some(id))
            .map(String::as_str)
    }

    /// IDs of every declared INFO field, in header order.
    pub fn info_ids(&self) -> impl Iterator<Item = &str> {
        self.meta
            .iter()
            .filter_map(|l| structured_id(l, "##INFO=<"))
    }

    /// Declare an INFO field unless it is already declared.
    ///
    /// New lines go after the last existing `##INFO` line.
    pub fn add_info(&mut self, id: &str, number: &str, ty: &str, description: &str) {
        if self.has_info(id) {
            return;
        }
        let line = format!(
            "##INFO=<ID={},Number={},Type={},Description=\"{}\">",
            id, number, ty, description
        );
        self.insert_info_line(line);
    }

    /// Copy a complete `##INFO` line from another header unless its ID is
    /// already declared here.
    pub fn copy_info_from(&mut self, other: &VcfHeader, id: &str) {
        if self.has_info(id) {
            return;
        }
        if let Some(line) = other.info_line(id) {
            self.insert_info_line(line.to_string());
        }
    }

    fn insert_info_line(&mut self, line: String) {
        let insert_at = self
            .meta
            .iter()
            .rposition(|l| l.starts_with("##INFO="))
            .map(|i| i + 1)
            .unwrap_or(self.meta.len());
        self.meta.insert(insert_at, line);
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for line in &self.meta {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.write_all(self.column_line.as_bytes())?;
        out.write_all(b"\n")
    }
}

/// Extract the `ID=` value of a structured meta line with the given prefix.
fn structured_id<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let body = line.strip_prefix(prefix)?;
    let body = body.strip_suffix('>').unwrap_or(body);
    body.split(',')
        .find_map(|kv| kv.strip_prefix("ID="))
}

/// Split a line on tabs.
#[inline]
fn split_tabs(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut fields = Vec::with_capacity(10);
    let mut last = 0;
    for idx in memchr_iter(b'\t', bytes) {
        fields.push(&line[last..idx]);
        last = idx + 1;
    }
    fields.push(&line[last..]);
    fields
}

/// A streaming VCF reader. The header is parsed on construction.
pub struct VcfReader<R: Read> {
    reader: BufReader<R>,
    header: VcfHeader,
    line_number: usize,
    buffer: String,
}

impl VcfReader<Box<dyn Read>> {
    /// Open a VCF file, or stdin when the path is `-`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source: Box<dyn Read> = if path.to_string_lossy() == "-" {
            Box::new(io::stdin())
        } else {
            Box::new(File::open(path)?)
        };
        Self::new(source)
    }
}

impl<R: Read> VcfReader<R> {
    /// Create a reader and consume the header.
    pub fn new(reader: R) -> Result<Self> {
        let mut this = Self {
            reader: BufReader::with_capacity(DEFAULT_INPUT_BUFFER, reader),
            header: VcfHeader::default(),
            line_number: 0,
            buffer: String::with_capacity(DEFAULT_LINE_BUFFER),
        };
        this.read_header()?;
        Ok(this)
    }

    fn read_header(&mut self) -> Result<()> {
        let mut meta = Vec::new();
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Err(SvError::InvalidFormat(
                    "VCF input ended before the #CHROM header line".to_string(),
                ));
            }
            self.line_number += 1;
            let line = self.buffer.trim_end_matches(['\n', '\r']);
            if line.starts_with("##") {
                meta.push(line.to_string());
            } else if line.starts_with("#CHROM") {
                self.header = VcfHeader::new(meta, line.to_string());
                return Ok(());
            } else {
                return Err(SvError::Parse {
                    line: self.line_number,
                    message: "Expected a #CHROM header line before records".to_string(),
                });
            }
        }
    }

    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    /// Read the next record, or `None` at end of input.
    pub fn read_record(&mut self) -> Result<Option<VcfRecord>> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim_end_matches(['\n', '\r']);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            return self.parse_line(line).map(Some);
        }
    }

    fn parse_line(&self, line: &str) -> Result<VcfRecord> {
        let fields = split_tabs(line);
        if fields.len() < 8 {
            return Err(SvError::Parse {
                line: self.line_number,
                message: format!("Expected at least 8 columns, got {}", fields.len()),
            });
        }

        let pos: u64 = fields[1].parse().map_err(|_| SvError::Parse {
            line: self.line_number,
            message: format!("Invalid POS: '{}'", fields[1]),
        })?;
        if pos == 0 {
            return Err(SvError::Parse {
                line: self.line_number,
                message: "POS must be 1-based".to_string(),
            });
        }

        let mut record = VcfRecord::new(
            fields[0],
            pos,
            fields[3],
            fields[4],
            Info::parse(fields[7]),
        );
        record.id = fields[2].to_string();
        record.qual = fields[5].to_string();
        record.filter = fields[6].to_string();
        if fields.len() > 8 {
            record.format = Some(fields[8].to_string());
            record.samples = fields[9..].iter().map(|s| s.to_string()).collect();
        }
        Ok(record)
    }

    /// Get an iterator over all records.
    pub fn records(self) -> VcfRecordIter<R> {
        VcfRecordIter { reader: self }
    }
}

/// Iterator over VCF records.
pub struct VcfRecordIter<R: Read> {
    reader: VcfReader<R>,
}

impl<R: Read> Iterator for VcfRecordIter<R> {
    type Item = Result<VcfRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

/// Buffered VCF writer with itoa position formatting.
pub struct VcfWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
}

impl<W: Write> VcfWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, output),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    pub fn write_header(&mut self, header: &VcfHeader) -> Result<()> {
        header.write_to(&mut self.writer)?;
        Ok(())
    }

    #[inline]
    pub fn write_record(&mut self, record: &VcfRecord) -> Result<()> {
        record.write_to(&mut self.writer, &mut self.itoa_buf)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Parse a complete VCF from a string (useful for testing).
pub fn parse_vcf(content: &str) -> Result<(VcfHeader, Vec<VcfRecord>)> {
    let reader = VcfReader::new(content.as_bytes())?;
    let header = reader.header().clone();
    let records = reader.records().collect::<Result<Vec<_>>>()?;
    Ok((header, records))
}
