//! Canonical genomic ordering.
//!
//! Every stream in svanno is compared through an [`OrderKey`]:
//! `(chromosome_rank, chromosome_name, position)`. The rank comes from a
//! declared contig order (a `.genome`/`.fai` file or the `##contig` lines
//! of a VCF header). Contigs missing from the declaration, or every contig
//! when nothing is declared, share [`UNRANKED`] so that ordering falls back
//! to name, then position.

use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{Result, SvError};

/// Rank shared by contigs without a declared position.
pub const UNRANKED: u32 = u32::MAX;

/// Total-order key for a genomic position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderKey {
    pub rank: u32,
    pub chrom: String,
    pub pos: u64,
}

impl OrderKey {
    /// A key that sorts below every key built from a real record.
    pub fn min() -> Self {
        Self {
            rank: 0,
            chrom: String::new(),
            pos: 0,
        }
    }

    /// Compare only the chromosome part of two keys.
    #[inline]
    pub fn cmp_chrom(&self, other: &OrderKey) -> Ordering {
        (self.rank, self.chrom.as_str()).cmp(&(other.rank, other.chrom.as_str()))
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chrom.is_empty() {
            write!(f, "<start>")
        } else {
            write!(f, "{}:{}", self.chrom, self.pos)
        }
    }
}

/// Declared contig order. Preserves the order contigs were declared in.
#[derive(Debug, Clone, Default)]
pub struct ContigOrder {
    ranks: FxHashMap<String, u32>,
    names: Vec<String>,
}

impl ContigOrder {
    /// An empty order: every contig is unranked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an order from contig names, first occurrence wins.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut order = Self::new();
        for name in names {
            order.insert(name.into());
        }
        order
    }

    /// Load contig order from a genome file.
    /// Format: tab-delimited, contig name in the first column
    /// (`.genome` and `.fai` files both qualify).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut order = Self::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let name = line.split('\t').next().unwrap_or_default();
            if name.is_empty() {
                return Err(SvError::Parse {
                    line: line_num + 1,
                    message: "Genome file line has an empty contig name".to_string(),
                });
            }
            order.insert(name.to_string());
        }

        Ok(order)
    }

    /// Append a contig if it is not declared yet.
    pub fn insert(&mut self, name: String) {
        if !self.ranks.contains_key(&name) {
            self.ranks.insert(name.clone(), self.names.len() as u32);
            self.names.push(name);
        }
    }

    /// Rank of a contig, or [`UNRANKED`].
    #[inline]
    pub fn rank(&self, chrom: &str) -> u32 {
        self.ranks.get(chrom).copied().unwrap_or(UNRANKED)
    }

    /// Build the canonical key for a position.
    #[inline]
    pub fn key(&self, chrom: &str, pos: u64) -> OrderKey {
        OrderKey {
            rank: self.rank(chrom),
            chrom: chrom.to_string(),
            pos,
        }
    }

    /// Compare two contigs under this order.
    #[inline]
    pub fn cmp_chrom(&self, a: &str, b: &str) -> Ordering {
        (self.rank(a), a).cmp(&(self.rank(b), b))
    }

    /// Declared contig names, in order.
    pub fn contigs(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
