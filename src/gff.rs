//! GFF3 feature reader.
//!
//! Builds the owning gene → transcript → exon hierarchy used for gene
//! consequences, and the flat regulatory-element list used for regulatory
//! consequences. GFF3 coordinates (1-based, inclusive) are converted to
//! 0-based half-open on read.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::error::{Result, SvError};
use crate::interval::{Span, Strand};
use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_LINE_BUFFER};
use crate::streaming::SweepFeature;

const GENE_TYPES: &[&str] = &["gene", "pseudogene", "ncRNA_gene"];
const NONCODING_SPAN_TYPES: &[&str] = &[
    "exon",
    "five_prime_UTR",
    "three_prime_UTR",
    "UTR",
    "noncoding_exon",
];
const TRANSCRIPT_TYPES: &[&str] = &[
    "mRNA",
    "transcript",
    "ncRNA",
    "lnc_RNA",
    "lncRNA",
    "miRNA",
    "snRNA",
    "snoRNA",
    "rRNA",
    "tRNA",
    "primary_transcript",
    "pseudogenic_transcript",
];

/// One parsed GFF3 data line.
#[derive(Debug, Clone)]
pub struct GffRow<'a> {
    pub seqid: &'a str,
    pub ty: &'a str,
    /// 0-based start.
    pub start: u64,
    /// 0-based exclusive end.
    pub end: u64,
    pub strand: Strand,
    attributes: &'a str,
}

impl<'a> GffRow<'a> {
    /// Value of an attribute in the ninth column.
    pub fn attribute(&self, key: &str) -> Option<&'a str> {
        self.attributes
            .split(';')
            .filter_map(|kv| kv.trim().split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    fn first_attribute(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter().find_map(|k| self.attribute(k))
    }

    fn require(&self, key: &'static str, line: usize) -> Result<&'a str> {
        self.attribute(key).ok_or_else(|| SvError::MissingField {
            line,
            field: key,
            feature: self.ty.to_string(),
        })
    }
}

/// Parse one GFF3 data line.
pub fn parse_row(line: &str, line_num: usize) -> Result<GffRow<'_>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 9 {
        return Err(SvError::Parse {
            line: line_num,
            message: format!("Expected 9 GFF3 columns, got {}", fields.len()),
        });
    }
    let parse_coord = |s: &str, name: &str| -> Result<u64> {
        s.parse().map_err(|_| SvError::Parse {
            line: line_num,
            message: format!("Invalid {} coordinate: '{}'", name, s),
        })
    };
    let start = parse_coord(fields[3], "start")?;
    let end = parse_coord(fields[4], "end")?;
    if start == 0 || start > end {
        return Err(SvError::Parse {
            line: line_num,
            message: format!("Invalid GFF3 interval {}..{}", start, end),
        });
    }

    Ok(GffRow {
        seqid: fields[0],
        ty: fields[2],
        start: start - 1,
        end,
        strand: Strand::parse(fields[6]),
        attributes: fields[8],
    })
}

/// Visit every data line of a GFF3 stream with its line number.
fn for_each_row<R: Read, F>(reader: R, mut visit: F) -> Result<()>
where
    F: FnMut(GffRow<'_>, usize) -> Result<()>,
{
    let mut reader = BufReader::with_capacity(DEFAULT_INPUT_BUFFER, reader);
    let mut buffer = String::with_capacity(DEFAULT_LINE_BUFFER);
    let mut line_num = 0;
    loop {
        buffer.clear();
        if reader.read_line(&mut buffer)? == 0 {
            return Ok(());
        }
        line_num += 1;
        let line = buffer.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with('#') {
            // "##FASTA" ends the feature section
            if line.starts_with("##FASTA") {
                return Ok(());
            }
            continue;
        }
        visit(parse_row(line, line_num)?, line_num)?;
    }
}

fn open<P: AsRef<Path>>(path: P) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    if path.to_string_lossy() == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(File::open(path)?))
    }
}

/// A transcript and its exon spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub id: String,
    /// CDS spans.
    pub coding: Vec<Span>,
    /// Exon and UTR spans.
    pub noncoding: Vec<Span>,
}

/// A gene owning its transcripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub id: String,
    /// Display symbol (`Name`, `gene_name`, else the ID).
    pub name: String,
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub biotype: String,
    pub transcripts: Vec<Transcript>,
}

impl Gene {
    pub fn new(
        id: impl Into<String>,
        chrom: impl Into<String>,
        start: u64,
        end: u64,
        strand: Strand,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            chrom: chrom.into(),
            start,
            end,
            strand,
            biotype: "unknown".to_string(),
            transcripts: Vec::new(),
        }
    }

    pub fn is_protein_coding(&self) -> bool {
        self.biotype == "protein_coding"
    }
}

impl SweepFeature for Gene {
    fn chrom(&self) -> &str {
        &self.chrom
    }
    fn start(&self) -> u64 {
        self.start
    }
    fn end(&self) -> u64 {
        self.end
    }
}

/// Read gene models from a GFF3 file (`-` for stdin).
pub fn read_genes_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Gene>> {
    read_genes(open(path)?)
}

/// Read gene models from a GFF3 stream.
///
/// Genes need an `ID`; transcripts and exon-level rows need a `Parent`.
/// Children may appear before their parents. Rows whose parent is never
/// declared are skipped with a warning.
pub fn read_genes<R: Read>(reader: R) -> Result<Vec<Gene>> {
    let mut genes: Vec<Gene> = Vec::new();
    let mut gene_index: FxHashMap<String, usize> = FxHashMap::default();
    // (transcript id, parent ids)
    let mut transcript_rows: Vec<(String, Vec<String>)> = Vec::new();
    // (is coding, span, parent ids)
    let mut span_rows: Vec<(bool, Span, Vec<String>)> = Vec::new();

    for_each_row(reader, |row, line| {
        if GENE_TYPES.contains(&row.ty) {
            let id = row.require("ID", line)?;
            let mut gene = Gene::new(id, row.seqid, row.start, row.end, row.strand);
            if let Some(name) = row.first_attribute(&["Name", "gene_name"]) {
                gene.name = decode_text(name).into_owned();
            }
            if let Some(biotype) = row.first_attribute(&["biotype", "gene_biotype", "gene_type"]) {
                gene.biotype = decode_text(biotype).into_owned();
            }
            gene_index.insert(id.to_string(), genes.len());
            genes.push(gene);
        } else if row.ty == "CDS" || NONCODING_SPAN_TYPES.contains(&row.ty) {
            let parents = split_parents(row.require("Parent", line)?);
            span_rows.push((row.ty == "CDS", Span::new(row.start, row.end), parents));
        } else if TRANSCRIPT_TYPES.contains(&row.ty) {
            let parents = split_parents(row.require("Parent", line)?);
            let id = row.require("ID", line)?;
            transcript_rows.push((id.to_string(), parents));
        } else if let (Some(id), Some(parent)) = (row.attribute("ID"), row.attribute("Parent")) {
            // Other typed children of a gene are treated as transcripts
            transcript_rows.push((id.to_string(), split_parents(parent)));
        }
        Ok(())
    })?;

    // transcript id -> (gene idx, transcript idx)
    let mut transcript_index: FxHashMap<String, Vec<(usize, usize)>> = FxHashMap::default();
    for (id, parents) in transcript_rows {
        for parent in parents {
            match gene_index.get(&parent) {
                Some(&g) => {
                    let t = genes[g].transcripts.len();
                    genes[g].transcripts.push(Transcript {
                        id: id.clone(),
                        ..Transcript::default()
                    });
                    transcript_index.entry(id.clone()).or_default().push((g, t));
                }
                None => warn!("Skipping transcript {}: parent gene {} not found", id, parent),
            }
        }
    }

    let mut orphans = 0usize;
    for (coding, span, parents) in span_rows {
        for parent in parents {
            let Some(targets) = transcript_index.get(&parent) else {
                orphans += 1;
                continue;
            };
            for &(g, t) in targets {
                let transcript = &mut genes[g].transcripts[t];
                if coding {
                    transcript.coding.push(span);
                } else {
                    transcript.noncoding.push(span);
                }
            }
        }
    }
    if orphans > 0 {
        warn!("Skipped {} exon-level rows with undeclared parent transcripts", orphans);
    }

    info!("Loaded {} genes", genes.len());
    Ok(genes)
}

/// Percent-decode a free-text attribute value (`%2C` to `,`). Values that
/// do not decode to UTF-8 are kept as written.
fn decode_text(value: &str) -> Cow<'_, str> {
    urlencoding::decode(value).unwrap_or(Cow::Borrowed(value))
}

fn split_parents(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Regulatory element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulatoryKind {
    Promoter,
    Enhancer,
}

impl RegulatoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegulatoryKind::Promoter => "promoter",
            RegulatoryKind::Enhancer => "enhancer",
        }
    }
}

/// The gene a regulatory element acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedGene {
    pub symbol: String,
    pub biotype: String,
    pub strand: String,
}

impl LinkedGene {
    pub const NOT_FOUND: &'static str = "not found";

    /// Sentinel recorded when a promoter has no qualifying gene.
    pub fn not_found() -> Self {
        Self {
            symbol: Self::NOT_FOUND.to_string(),
            biotype: Self::NOT_FOUND.to_string(),
            strand: Self::NOT_FOUND.to_string(),
        }
    }

    pub fn from_gene(gene: &Gene) -> Self {
        Self {
            symbol: gene.name.clone(),
            biotype: gene.biotype.clone(),
            strand: gene.strand.to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.biotype != Self::NOT_FOUND
    }
}

/// A promoter or enhancer.
///
/// Enhancers carry their declared gene from the annotation; promoters are
/// linked to the nearest qualifying gene when the sweep admits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegulatoryElement {
    pub id: String,
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub kind: RegulatoryKind,
    pub link: Option<LinkedGene>,
}

impl SweepFeature for RegulatoryElement {
    fn chrom(&self) -> &str {
        &self.chrom
    }
    fn start(&self) -> u64 {
        self.start
    }
    fn end(&self) -> u64 {
        self.end
    }
}

/// Read regulatory elements from a GFF3 file (`-` for stdin).
pub fn read_regulatory_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<RegulatoryElement>> {
    read_regulatory(open(path)?)
}

/// Read regulatory elements from a GFF3 stream.
///
/// Every row must be a `promoter` or an `enhancer`; any other type is a
/// fatal error. Enhancers need a `gene` attribute and may give
/// `gene_biotype` and `gene_strand`.
pub fn read_regulatory<R: Read>(reader: R) -> Result<Vec<RegulatoryElement>> {
    let mut elements = Vec::new();
    for_each_row(reader, |row, line| {
        let kind = match row.ty.to_ascii_lowercase().as_str() {
            "promoter" => RegulatoryKind::Promoter,
            "enhancer" => RegulatoryKind::Enhancer,
            _ => {
                return Err(SvError::UnrecognizedFeatureKind {
                    line,
                    kind: row.ty.to_string(),
                })
            }
        };
        let id = row.require("ID", line)?;
        let link = match kind {
            RegulatoryKind::Enhancer => Some(LinkedGene {
                symbol: decode_text(row.require("gene", line)?).into_owned(),
                biotype: decode_text(row.attribute("gene_biotype").unwrap_or("unknown"))
                    .into_owned(),
                strand: row.attribute("gene_strand").unwrap_or(".").to_string(),
            }),
            RegulatoryKind::Promoter => None,
        };
        elements.push(RegulatoryElement {
            id: decode_text(id).into_owned(),
            chrom: row.seqid.to_string(),
            start: row.start,
            end: row.end,
            kind,
            link,
        });
        Ok(())
    })?;
    info!("Loaded {} regulatory elements", elements.len());
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENES: &str = "##gff-version 3\n\
chr1\t.\tgene\t101\t900\t.\t+\t.\tID=g1;Name=GENE1;biotype=protein_coding\n\
chr1\t.\tCDS\t301\t400\t.\t+\t0\tParent=t1\n\
chr1\t.\tmRNA\t101\t900\t.\t+\t.\tID=t1;Parent=g1\n\
chr1\t.\tthree_prime_UTR\t851\t900\t.\t+\t.\tParent=t1\n\
chr1\t.\tlnc_RNA\t101\t500\t.\t+\t.\tID=t2;Parent=g1\n\
chr1\t.\texon\t101\t150\t.\t+\t.\tParent=t2,t1\n\
chr1\t.\tregion\t1\t5000\t.\t.\t.\tID=chr1\n";

    #[test]
    fn test_read_gene_hierarchy() {
        let genes = read_genes(GENES.as_bytes()).unwrap();
        assert_eq!(genes.len(), 1);
        let gene = &genes[0];
        assert_eq!(gene.name, "GENE1");
        assert_eq!((gene.start, gene.end), (100, 900));
        assert!(gene.is_protein_coding());
        assert_eq!(gene.transcripts.len(), 2);

        let t1 = &gene.transcripts[0];
        assert_eq!(t1.id, "t1");
        assert_eq!(t1.coding, vec![Span::new(300, 400)]);
        assert_eq!(t1.noncoding, vec![Span::new(850, 900), Span::new(100, 150)]);

        let t2 = &gene.transcripts[1];
        assert_eq!(t2.noncoding, vec![Span::new(100, 150)]);
        assert!(t2.coding.is_empty());
    }

    #[test]
    fn test_gene_without_id_is_missing_field() {
        let gff = "chr1\t.\tgene\t101\t900\t.\t+\t.\tName=X\n";
        let err = read_genes(gff.as_bytes()).unwrap_err();
        assert!(matches!(err, SvError::MissingField { field: "ID", line: 1, .. }));
    }

    #[test]
    fn test_exon_without_parent_is_missing_field() {
        let gff = "chr1\t.\texon\t101\t200\t.\t+\t.\tID=e1\n";
        let err = read_genes(gff.as_bytes()).unwrap_err();
        assert!(matches!(err, SvError::MissingField { field: "Parent", .. }));
    }

    #[test]
    fn test_orphan_children_are_skipped() {
        let gff = "chr1\t.\tgene\t101\t900\t.\t-\t.\tID=g1\n\
chr1\t.\texon\t101\t200\t.\t-\t.\tParent=nope\n";
        let genes = read_genes(gff.as_bytes()).unwrap();
        assert_eq!(genes.len(), 1);
        assert!(genes[0].transcripts.is_empty());
        assert_eq!(genes[0].name, "g1");
        assert_eq!(genes[0].biotype, "unknown");
    }

    #[test]
    fn test_read_regulatory_elements() {
        let gff = "chr1\t.\tpromoter\t1001\t2000\t.\t.\t.\tID=p1\n\
chr1\t.\tenhancer\t5001\t5500\t.\t.\t.\tID=e1;gene=GENE9;gene_biotype=lncRNA;gene_strand=-\n";
        let elements = read_regulatory(gff.as_bytes()).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].kind, RegulatoryKind::Promoter);
        assert_eq!((elements[0].start, elements[0].end), (1000, 2000));
        assert!(elements[0].link.is_none());
        let link = elements[1].link.as_ref().unwrap();
        assert_eq!(link.symbol, "GENE9");
        assert_eq!(link.biotype, "lncRNA");
        assert_eq!(link.strand, "-");
    }

    #[test]
    fn test_text_attributes_are_percent_decoded() {
        let genes = read_genes(
            "chr1\t.\tgene\t101\t900\t.\t+\t.\tID=g%2C1;Name=ABC%2C1;biotype=protein_coding\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(genes[0].name, "ABC,1");
        assert_eq!(genes[0].id, "g%2C1");

        let gff = "chr1\t.\tenhancer\t5001\t5500\t.\t.\t.\tID=e%3B1;gene=X%3BY;gene_strand=+\n\
chr1\t.\tpromoter\t6001\t6500\t.\t.\t.\tID=p%ZZ\n";
        let elements = read_regulatory(gff.as_bytes()).unwrap();
        assert_eq!(elements[0].id, "e;1");
        assert_eq!(elements[0].link.as_ref().unwrap().symbol, "X;Y");
        // Malformed escapes pass through
        assert_eq!(elements[1].id, "p%ZZ");
    }

    #[test]
    fn test_unrecognized_regulatory_kind_is_fatal() {
        let gff = "chr1\t.\tpromoter\t1001\t2000\t.\t.\t.\tID=p1\n\
chr1\t.\tsilencer\t3001\t4000\t.\t.\t.\tID=s1\n";
        let err = read_regulatory(gff.as_bytes()).unwrap_err();
        assert!(matches!(err, SvError::UnrecognizedFeatureKind { line: 2, .. }));
    }

    #[test]
    fn test_enhancer_without_gene_is_missing_field() {
        let gff = "chr1\t.\tenhancer\t1001\t2000\t.\t.\t.\tID=e1\n";
        let err = read_regulatory(gff.as_bytes()).unwrap_err();
        assert!(matches!(err, SvError::MissingField { field: "gene", .. }));
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(parse_row("chr1\t.\tgene\t0\t10\t.\t+\t.\tID=g", 1).is_err());
        assert!(parse_row("chr1\t.\tgene\t20\t10\t.\t+\t.\tID=g", 1).is_err());
        assert!(parse_row("chr1\t.\tgene\t10\t20", 1).is_err());
    }
}
