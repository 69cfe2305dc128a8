//! Predicate filtering of structural variant records.
//!
//! Records stream straight through; no ordering is required.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::vcf::{SvType, VcfReader, VcfRecord, VcfWriter};

/// A single record test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// FILTER is `PASS` or missing.
    Pass,
    /// SVTYPE is one of the given types.
    SvType(Vec<SvType>),
    /// SVLEN is defined and at least this long.
    MinLength(u64),
    /// SVLEN is defined and at most this long.
    MaxLength(u64),
    Chrom(Vec<String>),
    HasInfo(String),
}

impl Predicate {
    pub fn matches(&self, record: &VcfRecord) -> bool {
        match self {
            Predicate::Pass => record.filter_passes(),
            Predicate::SvType(types) => record.svtype().is_some_and(|t| types.contains(t)),
            Predicate::MinLength(min) => record.svlen().is_some_and(|len| len >= *min),
            Predicate::MaxLength(max) => record.svlen().is_some_and(|len| len <= *max),
            Predicate::Chrom(chroms) => chroms.iter().any(|c| *c == record.chrom),
            Predicate::HasInfo(key) => record.info.contains(key),
        }
    }
}

/// Filter command configuration.
#[derive(Debug, Clone, Default)]
pub struct FilterCommand {
    pub predicates: Vec<Predicate>,
    /// Keep records matching any predicate instead of all.
    pub any: bool,
    /// Keep records that fail the combined test.
    pub invert: bool,
}

impl FilterCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_any(mut self, any: bool) -> Self {
        self.any = any;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Combined test. With no predicates every record passes.
    pub fn accepts(&self, record: &VcfRecord) -> bool {
        let matched = if self.predicates.is_empty() {
            true
        } else if self.any {
            self.predicates.iter().any(|p| p.matches(record))
        } else {
            self.predicates.iter().all(|p| p.matches(record))
        };
        matched != self.invert
    }

    /// Filter a VCF file (`-` for stdin).
    pub fn run<P: AsRef<Path>, W: Write>(&self, input: P, output: W) -> Result<FilterStats> {
        self.run_reader(VcfReader::from_path(input)?, output)
    }

    pub fn run_reader<R: Read, W: Write>(
        &self,
        reader: VcfReader<R>,
        output: W,
    ) -> Result<FilterStats> {
        let mut writer = VcfWriter::new(output);
        writer.write_header(reader.header())?;

        let mut stats = FilterStats::default();
        for record in reader.records() {
            let record = record?;
            stats.records_read += 1;
            if self.accepts(&record) {
                writer.write_record(&record)?;
                stats.records_written += 1;
            }
        }
        writer.flush()?;

        debug!("Filter kept {} of {} records", stats.records_written, stats.records_read);
        Ok(stats)
    }
}

/// Statistics from a filter run.
#[derive(Debug, Clone, Default)]
pub struct FilterStats {
    pub records_read: usize,
    pub records_written: usize,
}

impl fmt::Display for FilterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Read: {}, Written: {}, Removed: {}",
            self.records_read,
            self.records_written,
            self.records_read - self.records_written
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf::parse_vcf;

    const VCF: &str = "##fileformat=VCFv4.2\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
        chr1\t101\tdel1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500;END=600\n\
        chr1\t201\tins1\tN\t<INS>\t.\tLowQual\tSVTYPE=INS;SVLEN=80\n\
        chr2\t301\tbnd1\tN\tN[chr3:100[\t.\t.\tSVTYPE=BND\n\
        chr2\t401\tinv1\tN\t<INV>\t.\tPASS\tSVTYPE=INV;END=5401;PRECISE\n";

    fn run(cmd: &FilterCommand) -> (FilterStats, Vec<String>) {
        let mut out = Vec::new();
        let stats = cmd
            .run_reader(VcfReader::new(VCF.as_bytes()).unwrap(), &mut out)
            .unwrap();
        let (_, records) = parse_vcf(&String::from_utf8(out).unwrap()).unwrap();
        (stats, records.into_iter().map(|r| r.id).collect())
    }

    #[test]
    fn test_no_predicates_keeps_everything() {
        let (stats, ids) = run(&FilterCommand::new());
        assert_eq!(ids, vec!["del1", "ins1", "bnd1", "inv1"]);
        assert_eq!(stats.records_read, 4);
    }

    #[test]
    fn test_predicates_combine_with_and() {
        let cmd = FilterCommand::new()
            .with_predicate(Predicate::Pass)
            .with_predicate(Predicate::MinLength(1000));
        let (_, ids) = run(&cmd);
        assert_eq!(ids, vec!["inv1"]);
    }

    #[test]
    fn test_any_combines_with_or() {
        let cmd = FilterCommand::new()
            .with_predicate(Predicate::SvType(vec![SvType::Ins]))
            .with_predicate(Predicate::Chrom(vec!["chr2".to_string()]))
            .with_any(true);
        let (_, ids) = run(&cmd);
        assert_eq!(ids, vec!["ins1", "bnd1", "inv1"]);
    }

    #[test]
    fn test_undefined_length_fails_length_bounds() {
        let (_, ids) = run(&FilterCommand::new().with_predicate(Predicate::MaxLength(100)));
        assert_eq!(ids, vec!["ins1"]);
        let (_, ids) = run(&FilterCommand::new().with_predicate(Predicate::MinLength(0)));
        assert!(!ids.contains(&"bnd1".to_string()));
    }

    #[test]
    fn test_invert_and_has_info() {
        let cmd = FilterCommand::new()
            .with_predicate(Predicate::HasInfo("PRECISE".to_string()))
            .with_invert(true);
        let (stats, ids) = run(&cmd);
        assert_eq!(ids, vec!["del1", "ins1", "bnd1"]);
        assert_eq!(stats.to_string(), "Read: 4, Written: 3, Removed: 1");
    }
}
