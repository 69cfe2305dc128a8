//! Per-record zygosity tagging from sample genotypes.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::vcf::{VcfHeader, VcfReader, VcfRecord, VcfWriter};

pub const DEFAULT_HET_FIELD: &str = "HET_SAMPLES";
pub const DEFAULT_HOMALT_FIELD: &str = "HOMALT_SAMPLES";

/// Zygosity of one sample's genotype call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zygosity {
    /// Reference plus at least one called alternate allele.
    HetAlt,
    /// Only called alternate alleles, no reference.
    HomAlt,
    /// Homozygous reference, fully missing, or no genotype.
    Other,
}

impl Zygosity {
    /// Classify a `GT` value such as `0/1`, `1|1` or `./1`.
    pub fn from_genotype(gt: &str) -> Self {
        let mut has_ref = false;
        let mut has_alt = false;
        for allele in gt.split(['/', '|']) {
            match allele {
                "0" => has_ref = true,
                "." | "" => {}
                _ => has_alt = true,
            }
        }
        match (has_ref, has_alt) {
            (true, true) => Zygosity::HetAlt,
            (false, true) => Zygosity::HomAlt,
            _ => Zygosity::Other,
        }
    }
}

/// Tags each record with the samples carrying it heterozygously and
/// homozygously.
#[derive(Debug, Clone)]
pub struct ZygosityCommand {
    pub het_field: String,
    pub homalt_field: String,
}

impl Default for ZygosityCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl ZygosityCommand {
    pub fn new() -> Self {
        Self {
            het_field: DEFAULT_HET_FIELD.to_string(),
            homalt_field: DEFAULT_HOMALT_FIELD.to_string(),
        }
    }

    pub fn with_het_field(mut self, name: impl Into<String>) -> Self {
        self.het_field = name.into();
        self
    }

    pub fn with_homalt_field(mut self, name: impl Into<String>) -> Self {
        self.homalt_field = name.into();
        self
    }

    /// Add the zygosity fields to one record. Existing fields are kept.
    pub fn tag(&self, record: &mut VcfRecord, samples: &[String], stats: &mut ZygosityStats) {
        let mut het: Vec<&str> = Vec::new();
        let mut homalt: Vec<&str> = Vec::new();
        for (name, gt) in samples.iter().zip(record.genotypes()) {
            match gt.map(Zygosity::from_genotype) {
                Some(Zygosity::HetAlt) => het.push(name),
                Some(Zygosity::HomAlt) => homalt.push(name),
                _ => {}
            }
        }
        stats.het_calls += het.len();
        stats.homalt_calls += homalt.len();

        for (field, mut names) in [(&self.het_field, het), (&self.homalt_field, homalt)] {
            if names.is_empty() {
                continue;
            }
            names.sort_unstable();
            record.info.insert_if_absent(field, Some(names.join(",")));
        }
    }

    fn annotate_header(&self, header: &mut VcfHeader) {
        header.add_info(
            &self.het_field,
            ".",
            "String",
            "Samples heterozygous for an alternate allele",
        );
        header.add_info(
            &self.homalt_field,
            ".",
            "String",
            "Samples homozygous for alternate alleles",
        );
    }

    /// Tag a VCF file (`-` for stdin).
    pub fn run<P: AsRef<Path>, W: Write>(&self, input: P, output: W) -> Result<ZygosityStats> {
        self.run_reader(VcfReader::from_path(input)?, output)
    }

    pub fn run_reader<R: Read, W: Write>(
        &self,
        reader: VcfReader<R>,
        output: W,
    ) -> Result<ZygosityStats> {
        let mut header = reader.header().clone();
        self.annotate_header(&mut header);
        let samples = header.samples().to_vec();

        let mut writer = VcfWriter::new(output);
        writer.write_header(&header)?;

        let mut stats = ZygosityStats::default();
        for record in reader.records() {
            let mut record = record?;
            self.tag(&mut record, &samples, &mut stats);
            writer.write_record(&record)?;
            stats.records += 1;
        }
        writer.flush()?;
        Ok(stats)
    }
}

/// Statistics from a zygosity run.
#[derive(Debug, Clone, Default)]
pub struct ZygosityStats {
    pub records: usize,
    pub het_calls: usize,
    pub homalt_calls: usize,
}

impl fmt::Display for ZygosityStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Records: {}, Het-alt calls: {}, Hom-alt calls: {}",
            self.records, self.het_calls, self.homalt_calls
        )
    }
}
