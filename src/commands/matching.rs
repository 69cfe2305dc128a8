//! Windowed matching of structural variants between two sorted call sets.
//!
//! Finds, for every query variant in A, the most similar variant in B
//! whose start lies within `max_pos_diff` of the query start.
//!
//! # Algorithm
//!
//! B is consumed through a [`SlidingWindow`]: for each query the window is
//! moved to `[start - max_pos_diff, start + max_pos_diff)`. Because query
//! starts never decrease, both window bounds only move forward and every B
//! record is read exactly once.
//!
//! # Memory Complexity
//!
//! O(k) where k = max B records within `2 * max_pos_diff` of any position.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use log::debug;

use crate::error::{Result, SvError};
use crate::order::ContigOrder;
use crate::streaming::{SlidingWindow, StreamCursor};
use crate::vcf::{VcfHeader, VcfReader, VcfRecord, VcfWriter};

pub const DEFAULT_MAX_POS_DIFF: u64 = 100;
pub const DEFAULT_MAX_LEN_DIFF: u64 = 100;

/// Which annotation fields to copy from the best match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CopyFields {
    #[default]
    None,
    /// Every field on the match (`*`).
    All,
    Named(Vec<String>),
}

impl CopyFields {
    /// Parse a comma-separated field list; `*` selects every field.
    pub fn parse(spec: &str) -> Self {
        let names: Vec<String> = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if names.iter().any(|n| n == "*") {
            CopyFields::All
        } else if names.is_empty() {
            CopyFields::None
        } else {
            CopyFields::Named(names)
        }
    }

    pub fn is_requested(&self) -> bool {
        *self != CopyFields::None
    }
}

/// Match command configuration.
#[derive(Debug, Clone)]
pub struct MatchCommand {
    pub max_pos_diff: u64,
    pub max_len_diff: u64,
    pub fields: CopyFields,
    /// Emit queries without a match instead of those with one.
    pub invert: bool,
    pub unsorted_a: bool,
    pub unsorted_b: bool,
    /// Contig order override; defaults to the query header's `##contig` lines.
    pub contig_order: Option<ContigOrder>,
}

impl Default for MatchCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchCommand {
    pub fn new() -> Self {
        Self {
            max_pos_diff: DEFAULT_MAX_POS_DIFF,
            max_len_diff: DEFAULT_MAX_LEN_DIFF,
            fields: CopyFields::None,
            invert: false,
            unsorted_a: false,
            unsorted_b: false,
            contig_order: None,
        }
    }

    pub fn with_max_pos_diff(mut self, diff: u64) -> Self {
        self.max_pos_diff = diff;
        self
    }

    pub fn with_max_len_diff(mut self, diff: u64) -> Self {
        self.max_len_diff = diff;
        self
    }

    pub fn with_fields(mut self, fields: CopyFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_unsorted(mut self, unsorted_a: bool, unsorted_b: bool) -> Self {
        self.unsorted_a = unsorted_a;
        self.unsorted_b = unsorted_b;
        self
    }

    pub fn with_contig_order(mut self, order: ContigOrder) -> Self {
        self.contig_order = Some(order);
        self
    }

    /// Length compatibility. An undefined length on either side is
    /// compatible with anything and contributes no difference.
    #[inline]
    fn len_diff(&self, a: &VcfRecord, b: &VcfRecord) -> Option<u64> {
        match (a.svlen(), b.svlen()) {
            (Some(la), Some(lb)) => {
                let diff = la.abs_diff(lb);
                (diff <= self.max_len_diff).then_some(diff)
            }
            _ => Some(0),
        }
    }

    /// Pick the best match for `query` among `candidates`.
    ///
    /// Candidates must share the SV type (INS and DUP are interchangeable)
    /// and be length compatible. The score is `|dlen| + |dstart|`; ties keep
    /// the earliest candidate.
    pub fn select_best<'a, I>(&self, query: &VcfRecord, candidates: I) -> Option<&'a VcfRecord>
    where
        I: IntoIterator<Item = &'a VcfRecord>,
    {
        let query_type = query.svtype()?;
        let mut best: Option<(u64, &'a VcfRecord)> = None;
        for candidate in candidates {
            let Some(candidate_type) = candidate.svtype() else {
                continue;
            };
            let same_class = candidate_type == query_type
                || (candidate_type.is_insertion_like() && query_type.is_insertion_like());
            if !same_class {
                continue;
            }
            let Some(len_diff) = self.len_diff(query, candidate) else {
                continue;
            };
            let score = len_diff + query.start.abs_diff(candidate.start);
            if best.is_none_or(|(best_score, _)| score < best_score) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, record)| record)
    }

    /// Copy the requested fields from `matched` onto `query` without
    /// overwriting anything already present.
    fn copy_fields(&self, query: &mut VcfRecord, matched: &VcfRecord) {
        match &self.fields {
            CopyFields::None => {}
            CopyFields::All => {
                for (key, value) in matched.info.iter() {
                    query.info.insert_if_absent(key, value.map(str::to_string));
                }
            }
            CopyFields::Named(names) => {
                for name in names {
                    if let Some(value) = matched.info.entry(name) {
                        query.info.insert_if_absent(name, value.clone());
                    }
                }
            }
        }
    }

    fn annotate_header(&self, header: &mut VcfHeader, target: &VcfHeader) {
        match &self.fields {
            CopyFields::None => {}
            CopyFields::All => {
                for id in target.info_ids() {
                    header.copy_info_from(target, id);
                }
            }
            CopyFields::Named(names) => {
                for name in names {
                    header.copy_info_from(target, name);
                }
            }
        }
    }

    /// Match query VCF `a` against target VCF `b` (`-` for stdin on one side).
    pub fn run<P: AsRef<Path>, W: Write>(&self, a: P, b: P, output: W) -> Result<MatchStats> {
        let (a, b) = (a.as_ref(), b.as_ref());
        if a.to_string_lossy() == "-" && b.to_string_lossy() == "-" {
            return Err(SvError::InvalidArgument(
                "Only one of -a and -b can read from stdin".to_string(),
            ));
        }
        self.run_readers(VcfReader::from_path(a)?, VcfReader::from_path(b)?, output)
    }

    pub fn run_readers<RA: Read, RB: Read, W: Write>(
        &self,
        query: VcfReader<RA>,
        target: VcfReader<RB>,
        output: W,
    ) -> Result<MatchStats> {
        let order = self.contig_order.clone().unwrap_or_else(|| {
            let declared = query.header().contig_order();
            if declared.is_empty() {
                target.header().contig_order()
            } else {
                declared
            }
        });

        let mut header = query.header().clone();
        self.annotate_header(&mut header, target.header());

        let mut queries = StreamCursor::new(
            query.records(),
            order.clone(),
            !self.unsorted_a,
            "query VCF",
        );
        let mut window = SlidingWindow::new(StreamCursor::new(
            target.records(),
            order,
            !self.unsorted_b,
            "target VCF",
        ));

        let mut writer = VcfWriter::new(output);
        writer.write_header(&header)?;

        let mut stats = MatchStats::default();
        while let Some((_, mut record)) = queries.next()? {
            stats.queries += 1;

            let mut matched = None;
            if record.svtype().is_some() {
                let lo = record.start.saturating_sub(self.max_pos_diff);
                let hi = record.start.saturating_add(self.max_pos_diff);
                window.advance_start(&record.chrom, lo)?;
                window.advance_end(&record.chrom, hi)?;
                matched = self.select_best(&record, window.active());
            }

            let found = matched.is_some();
            if let Some(best) = matched {
                stats.matched += 1;
                self.copy_fields(&mut record, best);
            }

            if self.fields.is_requested() || found != self.invert {
                writer.write_record(&record)?;
                stats.written += 1;
            }
        }
        writer.flush()?;

        // Validate the rest of a sorted target past the last query window
        if !self.unsorted_b {
            let trailing = window.drain()?;
            debug!("Read {} trailing target records", trailing);
        }

        stats.max_active = window.max_active();
        stats.skipped_targets = window.skipped();
        debug!(
            "Match window: max active {}, skipped {}",
            stats.max_active, stats.skipped_targets
        );
        Ok(stats)
    }
}

/// Statistics from a match run.
#[derive(Debug, Clone, Default)]
pub struct MatchStats {
    pub queries: usize,
    pub matched: usize,
    pub written: usize,
    pub max_active: usize,
    /// Target records that fell between query windows.
    pub skipped_targets: usize,
}

impl fmt::Display for MatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queries: {}, Matched: {}, Written: {}, Max active B: {}",
            self.queries, self.matched, self.written, self.max_active
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf::{parse_vcf, Info};

    const HEADER: &str = "##fileformat=VCFv4.2\n\
        ##INFO=<ID=SVTYPE,Number=1,Type=String,Description=\"Type\">\n\
        ##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    fn vcf(lines: &[&str]) -> String {
        let mut s = HEADER.to_string();
        for line in lines {
            s.push_str(line);
            s.push('\n');
        }
        s
    }

    fn run(
        cmd: &MatchCommand,
        a: &str,
        b: &str,
    ) -> Result<(MatchStats, VcfHeader, Vec<VcfRecord>)> {
        let mut out = Vec::new();
        let stats = cmd.run_readers(
            VcfReader::new(a.as_bytes())?,
            VcfReader::new(b.as_bytes())?,
            &mut out,
        )?;
        let (header, records) = parse_vcf(&String::from_utf8(out).unwrap())?;
        Ok((stats, header, records))
    }

    fn sv(chrom: &str, pos: u64, svtype: &str, svlen: u64) -> VcfRecord {
        VcfRecord::new(
            chrom,
            pos,
            "N",
            format!("<{}>", svtype),
            Info::parse(&format!("SVTYPE={};SVLEN={}", svtype, svlen)),
        )
    }

    #[test]
    fn test_best_match_prefers_first_candidate() {
        let a = vcf(&["chr1\t1001\tq1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500"]);
        let b = vcf(&[
            "chr1\t1051\tt1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-480;TAG=first",
            "chr1\t1201\tt2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-520;TAG=second",
        ]);
        let cmd = MatchCommand::new()
            .with_max_len_diff(50)
            .with_fields(CopyFields::parse("TAG"));
        let (stats, _, records) = run(&cmd, &a, &b).unwrap();
        assert_eq!(stats.matched, 1);
        assert_eq!(records[0].info.get("TAG"), Some("first"));
    }

    #[test]
    fn test_score_ties_keep_earliest() {
        let cmd = MatchCommand::new();
        let query = sv("chr1", 1001, "DEL", 500);
        let targets = [sv("chr1", 991, "DEL", 500), sv("chr1", 1011, "DEL", 500)];
        let best = cmd.select_best(&query, &targets).unwrap();
        assert_eq!(best.pos, 991);
    }

    #[test]
    fn test_insertions_and_duplications_interchange() {
        let cmd = MatchCommand::new();
        let ins = sv("chr1", 1001, "INS", 300);
        let dup = sv("chr1", 1001, "DUP", 300);
        let del = sv("chr1", 1001, "DEL", 300);
        assert!(cmd.select_best(&ins, [&dup]).is_some());
        assert!(cmd.select_best(&dup, [&ins]).is_some());
        assert!(cmd.select_best(&del, [&ins, &dup]).is_none());
        assert!(cmd.select_best(&ins, [&del]).is_none());
    }

    #[test]
    fn test_other_svtypes_match_only_themselves() {
        let cmd = MatchCommand::new();
        let tra = sv("chr1", 1001, "TRA", 0);
        let bnd = sv("chr1", 1001, "BND", 0);
        assert_eq!(tra.svtype().map(|t| t.to_string()), Some("TRA".to_string()));
        assert!(cmd.select_best(&tra, [&bnd]).is_none());
        assert!(cmd.select_best(&bnd, [&tra]).is_none());
        assert!(cmd.select_best(&tra, [&sv("chr1", 1011, "TRA", 0)]).is_some());
    }

    #[test]
    fn test_length_limit_and_undefined_length() {
        let cmd = MatchCommand::new().with_max_len_diff(50);
        let query = sv("chr1", 1001, "DEL", 500);
        assert!(cmd.select_best(&query, [&sv("chr1", 1001, "DEL", 600)]).is_none());

        let no_len = VcfRecord::new("chr1", 1001, "N", "<DEL>", Info::parse("SVTYPE=DEL"));
        assert_eq!(no_len.svlen(), None);
        assert!(cmd.select_best(&query, [&no_len]).is_some());
    }

    #[test]
    fn test_streaming_match_emits_matched_queries() {
        let a = vcf(&[
            "chr1\t1001\tq1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
            "chr1\t5001\tq2\tN\t<INS>\t.\tPASS\tSVTYPE=INS;SVLEN=300",
            "chr2\t101\tq3\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-100",
        ]);
        let b = vcf(&[
            "chr1\t1051\tt1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-480",
            "chr1\t1201\tt2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-520",
            "chr1\t5021\tt3\tN\t<DUP>\t.\tPASS\tSVTYPE=DUP;SVLEN=310",
        ]);
        let (stats, _, records) = run(&MatchCommand::new(), &a, &b).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
        assert_eq!(stats.queries, 3);
        assert_eq!(stats.matched, 2);

        let (_, _, records) = run(&MatchCommand::new().with_invert(true), &a, &b).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["q3"]);
    }

    #[test]
    fn test_copy_fields_is_additive() {
        let a = vcf(&[
            "chr1\t1001\tq1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500;AF=0.1",
            "chr1\t9001\tq2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
        ]);
        let b = vcf(&["chr1\t1011\tt1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500;AF=0.5;SOURCE=x"]);

        let cmd = MatchCommand::new().with_fields(CopyFields::parse("AF,SOURCE"));
        let (_, _, records) = run(&cmd, &a, &b).unwrap();
        // With fields requested every query is emitted
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].info.get("AF"), Some("0.1"));
        assert_eq!(records[0].info.get("SOURCE"), Some("x"));
        assert!(!records[1].info.contains("SOURCE"));

        let cmd = MatchCommand::new().with_fields(CopyFields::parse("*"));
        let (_, header, records) = run(&cmd, &a, &b).unwrap();
        assert_eq!(records[1].info.len(), 2);
        assert_eq!(records[0].info.to_string(), "SVTYPE=DEL;SVLEN=-500;AF=0.1;SOURCE=x");
        assert!(header.has_info("AF"));
    }

    #[test]
    fn test_unsorted_query_is_order_violation() {
        let a = vcf(&[
            "chr1\t5001\tq1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
            "chr1\t1001\tq2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
        ]);
        let b = vcf(&[]);
        let err = run(&MatchCommand::new(), &a, &b).unwrap_err();
        assert!(matches!(err, SvError::OrderViolation { .. }));

        let cmd = MatchCommand::new().with_unsorted(true, false).with_invert(true);
        let (_, _, records) = run(&cmd, &a, &b).unwrap();
        assert_eq!(records[0].id, "q2");
    }

    #[test]
    fn test_unsorted_target_is_loaded_and_sorted() {
        let a = vcf(&[
            "chr1\t1001\tq1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
            "chr1\t9001\tq2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
        ]);
        let b = vcf(&[
            "chr1\t9001\tt2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
            "chr1\t1001\tt1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
        ]);
        let err = run(&MatchCommand::new(), &a, &b).unwrap_err();
        assert!(err.to_string().contains("target VCF"));

        let cmd = MatchCommand::new().with_unsorted(false, true);
        let (stats, _, _) = run(&cmd, &a, &b).unwrap();
        assert_eq!(stats.matched, 2);
    }

    #[test]
    fn test_trailing_target_disorder_is_order_violation() {
        let a = vcf(&["chr1\t1001\tq1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500"]);
        let b = vcf(&[
            "chr1\t1001\tt1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
            "chr1\t9001\tt2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
            "chr1\t5001\tt3\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SVLEN=-500",
        ]);
        let err = run(&MatchCommand::new(), &a, &b).unwrap_err();
        assert!(matches!(err, SvError::OrderViolation { .. }));
        assert!(err.to_string().contains("target VCF"));

        let cmd = MatchCommand::new().with_unsorted(false, true);
        let (stats, _, _) = run(&cmd, &a, &b).unwrap();
        assert_eq!(stats.matched, 1);
    }

    #[test]
    fn test_copy_fields_parse() {
        assert_eq!(CopyFields::parse(""), CopyFields::None);
        assert_eq!(CopyFields::parse("AF,*"), CopyFields::All);
        assert_eq!(
            CopyFields::parse("AF, SOURCE"),
            CopyFields::Named(vec!["AF".to_string(), "SOURCE".to_string()])
        );
    }
}
