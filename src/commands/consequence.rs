//! Local consequence annotation of structural variants against gene models
//! or regulatory elements.
//!
//! Variants stream in position order while annotation features are swept
//! through a [`FeatureSweep`]: every feature is admitted once, stays live
//! while a later variant could still overlap it, and is then evicted for
//! good.
//!
//! # Gene mode
//!
//! One consequence per overlapping gene:
//!
//! ```text
//! consequence|gene|transcript|biotype|strand|amino_acid_change|dna_change
//! ```
//!
//! where consequence is `bnd` for breakends, else `cds` if any transcript
//! coding span overlaps, else `utr` if any exon/UTR span overlaps, else
//! `intron`. The transcript is the one that decided the class; the protein
//! and DNA change fields are left empty.
//!
//! # Regulatory mode
//!
//! One consequence per overlapping promoter or enhancer:
//!
//! ```text
//! consequence|gene|reg_elem_id|biotype|svtype|strand
//! ```
//!
//! Enhancers carry their gene from the annotation. Promoters are linked to
//! a gene by [`PromoterLinker`] the moment the sweep admits them.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use log::debug;

use crate::config;
use crate::error::Result;
use crate::gff::{
    read_genes_from_path, read_regulatory_from_path, Gene, RegulatoryElement, RegulatoryKind,
};
use crate::order::ContigOrder;
use crate::promoter::{link_label, GeneQueue, PromoterLinker};
use crate::streaming::{FeatureSweep, StreamCursor};
use crate::vcf::{SvType, VcfHeader, VcfReader, VcfRecord, VcfWriter};

pub const DEFAULT_CONSEQUENCE_FIELD: &str = "SVCSQ";

/// Consequence of a variant on one gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneConsequence {
    Bnd,
    Cds,
    Utr,
    Intron,
}

impl GeneConsequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneConsequence::Bnd => "bnd",
            GeneConsequence::Cds => "cds",
            GeneConsequence::Utr => "utr",
            GeneConsequence::Intron => "intron",
        }
    }
}

impl fmt::Display for GeneConsequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a variant spanning `[start, stop)` against an overlapping gene.
///
/// Returns the consequence and the transcript that decided it, if any.
pub fn classify_gene<'g>(
    gene: &'g Gene,
    svtype: &SvType,
    start: u64,
    stop: u64,
) -> (GeneConsequence, Option<&'g str>) {
    let first_transcript = gene.transcripts.first().map(|t| t.id.as_str());
    if *svtype == SvType::Bnd {
        return (GeneConsequence::Bnd, first_transcript);
    }
    if let Some(t) = gene
        .transcripts
        .iter()
        .find(|t| t.coding.iter().any(|s| s.overlaps(start, stop)))
    {
        return (GeneConsequence::Cds, Some(&t.id));
    }
    if let Some(t) = gene
        .transcripts
        .iter()
        .find(|t| t.noncoding.iter().any(|s| s.overlaps(start, stop)))
    {
        return (GeneConsequence::Utr, Some(&t.id));
    }
    (GeneConsequence::Intron, first_transcript)
}

/// Per-variant consequence producer over one kind of annotation feature.
trait Annotator {
    /// Move the sweep to the variant and describe every overlapping feature.
    fn consequences(&mut self, record: &VcfRecord, svtype: &SvType, stop: u64) -> Vec<String>;

    fn max_live(&self) -> usize;

    fn description(&self) -> &'static str;
}

struct GeneAnnotator {
    sweep: FeatureSweep<Gene>,
}

impl Annotator for GeneAnnotator {
    fn consequences(&mut self, record: &VcfRecord, svtype: &SvType, stop: u64) -> Vec<String> {
        let start = record.start;
        self.sweep.advance(&record.chrom, start, stop, |_| {});
        self.sweep
            .overlapping(&record.chrom, start, stop)
            .into_iter()
            .map(|gene| {
                let (csq, transcript) = classify_gene(gene, svtype, start, stop);
                format!(
                    "{}|{}|{}|{}|{}||",
                    csq,
                    gene.name,
                    transcript.unwrap_or(""),
                    gene.biotype,
                    gene.strand
                )
            })
            .collect()
    }

    fn max_live(&self) -> usize {
        self.sweep.max_live()
    }

    fn description(&self) -> &'static str {
        "Gene consequence: consequence|gene|transcript|biotype|strand|amino_acid_change|dna_change"
    }
}

struct RegulatoryAnnotator {
    sweep: FeatureSweep<RegulatoryElement>,
    genes: GeneQueue,
    linker: PromoterLinker,
}

impl Annotator for RegulatoryAnnotator {
    fn consequences(&mut self, record: &VcfRecord, svtype: &SvType, stop: u64) -> Vec<String> {
        let Self {
            sweep,
            genes,
            linker,
        } = self;
        let start = record.start;

        sweep.advance(&record.chrom, start, stop, |element| {
            if element.kind == RegulatoryKind::Promoter && element.link.is_none() {
                let link = linker.link(genes, element);
                element.link = Some(link);
            }
        });

        sweep
            .overlapping(&record.chrom, start, stop)
            .into_iter()
            .filter_map(|element| {
                let link = element.link.as_ref()?;
                Some(format!(
                    "{}|{}|{}|{}|{}|{}",
                    link_label(link),
                    link.symbol,
                    element.id,
                    link.biotype,
                    svtype,
                    link.strand
                ))
            })
            .collect()
    }

    fn max_live(&self) -> usize {
        self.sweep.max_live()
    }

    fn description(&self) -> &'static str {
        "Regulatory consequence: consequence|gene|reg_elem_id|biotype|svtype|strand"
    }
}

/// Annotation features for one run.
#[derive(Debug, Clone)]
pub enum Features {
    Genes(Vec<Gene>),
    /// Regulatory elements plus the gene models promoters link to.
    Regulatory {
        elements: Vec<RegulatoryElement>,
        genes: Vec<Gene>,
    },
}

impl Features {
    /// Load gene models, and regulatory elements when a path is given.
    pub fn load<P: AsRef<Path>>(genes: P, regulatory: Option<P>) -> Result<Self> {
        let genes = read_genes_from_path(genes)?;
        match regulatory {
            Some(path) => Ok(Features::Regulatory {
                elements: read_regulatory_from_path(path)?,
                genes,
            }),
            None => Ok(Features::Genes(genes)),
        }
    }

    fn into_annotator(self, order: &ContigOrder) -> Box<dyn Annotator> {
        match self {
            Features::Genes(genes) => Box::new(GeneAnnotator {
                sweep: FeatureSweep::new(genes, order.clone()),
            }),
            Features::Regulatory { elements, genes } => Box::new(RegulatoryAnnotator {
                sweep: FeatureSweep::new(elements, order.clone()),
                genes: GeneQueue::new(genes, order),
                linker: PromoterLinker::new(),
            }),
        }
    }
}

/// Consequence command configuration.
#[derive(Debug, Clone)]
pub struct ConsequenceCommand {
    /// INFO field receiving the consequences.
    pub field: String,
    /// Drop variants that end up without a consequence.
    pub require_csq: bool,
    /// Load and sort the variants in memory instead of streaming them.
    pub unsorted: bool,
    /// Contig order override; defaults to the VCF header's `##contig` lines.
    pub contig_order: Option<ContigOrder>,
}

impl Default for ConsequenceCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsequenceCommand {
    pub fn new() -> Self {
        Self {
            field: DEFAULT_CONSEQUENCE_FIELD.to_string(),
            require_csq: false,
            unsorted: false,
            contig_order: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_require_csq(mut self, require: bool) -> Self {
        self.require_csq = require;
        self
    }

    pub fn with_unsorted(mut self, unsorted: bool) -> Self {
        self.unsorted = unsorted;
        self
    }

    pub fn with_contig_order(mut self, order: ContigOrder) -> Self {
        self.contig_order = Some(order);
        self
    }

    /// Annotate a VCF file (`-` for stdin).
    pub fn run<P: AsRef<Path>, W: Write>(
        &self,
        input: P,
        features: Features,
        output: W,
    ) -> Result<ConsequenceStats> {
        self.run_reader(VcfReader::from_path(input)?, features, output)
    }

    pub fn run_reader<R: Read, W: Write>(
        &self,
        reader: VcfReader<R>,
        features: Features,
        output: W,
    ) -> Result<ConsequenceStats> {
        let order = self
            .contig_order
            .clone()
            .unwrap_or_else(|| reader.header().contig_order());
        let mut annotator = features.into_annotator(&order);

        let mut header: VcfHeader = reader.header().clone();
        header.add_info(&self.field, ".", "String", annotator.description());

        let mut variants =
            StreamCursor::new(reader.records(), order, !self.unsorted, "variant VCF");
        let mut writer = VcfWriter::new(output);
        writer.write_header(&header)?;

        let mut stats = ConsequenceStats::default();
        while let Some((_, mut record)) = variants.next()? {
            stats.variants += 1;

            if let Some(svtype) = record.svtype().cloned() {
                let stop = config::normalize_stop(record.start, record.stop);
                let consequences = annotator.consequences(&record, &svtype, stop);
                stats.consequences += consequences.len();
                if !consequences.is_empty()
                    && record.info.insert_if_absent(&self.field, Some(consequences.join(",")))
                {
                    stats.annotated += 1;
                }
            }

            if self.require_csq && !record.info.contains(&self.field) {
                stats.dropped += 1;
                continue;
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;

        stats.max_live_features = annotator.max_live();
        debug!("Consequence sweep: max live features {}", stats.max_live_features);
        Ok(stats)
    }
}

/// Statistics from a consequence run.
#[derive(Debug, Clone, Default)]
pub struct ConsequenceStats {
    pub variants: usize,
    /// Variants that received the consequence field.
    pub annotated: usize,
    pub consequences: usize,
    /// Variants removed by `--require-csq`.
    pub dropped: usize,
    pub max_live_features: usize,
}

impl fmt::Display for ConsequenceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Variants: {}, Annotated: {}, Consequences: {}, Dropped: {}, Max live features: {}",
            self.variants,
            self.annotated,
            self.consequences,
            self.dropped,
            self.max_live_features
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gff::{LinkedGene, Transcript};
    use crate::interval::{Span, Strand};
    use crate::vcf::parse_vcf;
    use serial_test::serial;

    const HEADER: &str = "##fileformat=VCFv4.2\n\
        ##contig=<ID=chr1,length=100000>\n\
        ##contig=<ID=chr2,length=100000>\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    fn vcf(lines: &[&str]) -> String {
        let mut s = HEADER.to_string();
        for line in lines {
            s.push_str(line);
            s.push('\n');
        }
        s
    }

    /// Gene chr1:100-900 with CDS 300-400 and UTR 850-900.
    fn gene_model() -> Gene {
        let mut gene = Gene::new("gene1", "chr1", 100, 900, Strand::Plus);
        gene.name = "ABC1".to_string();
        gene.biotype = "protein_coding".to_string();
        gene.transcripts.push(Transcript {
            id: "tx1".to_string(),
            coding: vec![Span::new(300, 400)],
            noncoding: vec![Span::new(850, 900)],
        });
        gene
    }

    fn run(
        cmd: &ConsequenceCommand,
        input: &str,
        features: Features,
    ) -> (ConsequenceStats, Vec<VcfRecord>) {
        let mut out = Vec::new();
        let stats = cmd
            .run_reader(VcfReader::new(input.as_bytes()).unwrap(), features, &mut out)
            .unwrap();
        let (_, records) = parse_vcf(&String::from_utf8(out).unwrap()).unwrap();
        (stats, records)
    }

    #[test]
    #[serial]
    fn test_gene_consequence_classes() {
        let input = vcf(&[
            "chr1\t351\tcds\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=380",
            "chr1\t501\tbnd\tN\tN]chr2:100]\t.\tPASS\tSVTYPE=BND",
            "chr1\t501\tintron\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=600",
            "chr1\t861\tutr\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=870",
            "chr1\t2001\tnone\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=2100",
        ]);
        let (stats, records) = run(
            &ConsequenceCommand::new(),
            &input,
            Features::Genes(vec![gene_model()]),
        );

        let csq: Vec<Option<&str>> = records.iter().map(|r| r.info.get("SVCSQ")).collect();
        assert_eq!(
            csq,
            vec![
                Some("cds|ABC1|tx1|protein_coding|+||"),
                Some("bnd|ABC1|tx1|protein_coding|+||"),
                Some("intron|ABC1|tx1|protein_coding|+||"),
                Some("utr|ABC1|tx1|protein_coding|+||"),
                None,
            ]
        );
        assert_eq!(stats.variants, 5);
        assert_eq!(stats.annotated, 4);
    }

    #[test]
    #[serial]
    fn test_strict_breakend_overlaps_nothing() {
        config::set_strict_intervals(true);
        let input = vcf(&["chr1\t501\tbnd\tN\tN]chr2:100]\t.\tPASS\tSVTYPE=BND"]);
        let (_, records) = run(
            &ConsequenceCommand::new(),
            &input,
            Features::Genes(vec![gene_model()]),
        );
        config::set_strict_intervals(false);
        assert!(records[0].info.get("SVCSQ").is_none());
    }

    #[test]
    #[serial]
    fn test_multiple_genes_are_comma_joined() {
        let mut other = Gene::new("gene2", "chr1", 500, 700, Strand::Minus);
        other.biotype = "lncRNA".to_string();
        let input = vcf(&["chr1\t551\tv\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=560"]);
        let (stats, records) = run(
            &ConsequenceCommand::new(),
            &input,
            Features::Genes(vec![other, gene_model()]),
        );
        assert_eq!(
            records[0].info.get("SVCSQ"),
            Some("intron|ABC1|tx1|protein_coding|+||,intron|gene2||lncRNA|-||")
        );
        assert_eq!(stats.consequences, 2);
    }

    #[test]
    #[serial]
    fn test_rerun_is_additive_only() {
        let input = vcf(&[
            "chr1\t351\tv1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=380",
            "chr1\t2001\tv2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=2100",
        ]);
        let cmd = ConsequenceCommand::new();
        let mut first = Vec::new();
        cmd.run_reader(
            VcfReader::new(input.as_bytes()).unwrap(),
            Features::Genes(vec![gene_model()]),
            &mut first,
        )
        .unwrap();

        let mut second = Vec::new();
        let stats = cmd
            .run_reader(
                VcfReader::new(first.as_slice()).unwrap(),
                Features::Genes(vec![gene_model()]),
                &mut second,
            )
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(stats.annotated, 0);
    }

    #[test]
    #[serial]
    fn test_require_csq_drops_unannotated() {
        let input = vcf(&[
            "chr1\t351\tv1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=380",
            "chr1\t401\tnotype\tA\tT\t.\tPASS\t.",
            "chr1\t2001\tv2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=2100",
        ]);
        let cmd = ConsequenceCommand::new().with_require_csq(true);
        let (stats, records) = run(&cmd, &input, Features::Genes(vec![gene_model()]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "v1");
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    #[serial]
    fn test_unsorted_variants() {
        let input = vcf(&[
            "chr1\t861\tutr\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=870",
            "chr1\t351\tcds\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=380",
        ]);
        let result = ConsequenceCommand::new().run_reader(
            VcfReader::new(input.as_bytes()).unwrap(),
            Features::Genes(vec![gene_model()]),
            Vec::new(),
        );
        assert!(matches!(result, Err(crate::error::SvError::OrderViolation { .. })));

        let cmd = ConsequenceCommand::new().with_unsorted(true);
        let (_, records) = run(&cmd, &input, Features::Genes(vec![gene_model()]));
        assert_eq!(records[0].id, "cds");
        assert_eq!(records[1].info.get("SVCSQ"), Some("utr|ABC1|tx1|protein_coding|+||"));
    }

    fn promoter(id: &str, start: u64, end: u64) -> RegulatoryElement {
        RegulatoryElement {
            id: id.to_string(),
            chrom: "chr1".to_string(),
            start,
            end,
            kind: RegulatoryKind::Promoter,
            link: None,
        }
    }

    #[test]
    #[serial]
    fn test_regulatory_consequences() {
        let mut target = Gene::new("g1", "chr1", 4000, 9000, Strand::Plus);
        target.name = "TGT".to_string();
        target.biotype = "protein_coding".to_string();

        let enhancer = RegulatoryElement {
            id: "enh1".to_string(),
            chrom: "chr1".to_string(),
            start: 20000,
            end: 21000,
            kind: RegulatoryKind::Enhancer,
            link: Some(LinkedGene {
                symbol: "FAR".to_string(),
                biotype: "lncRNA".to_string(),
                strand: "-".to_string(),
            }),
        };

        let input = vcf(&[
            "chr1\t1501\tv1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=1600",
            "chr1\t10001\tv2\tN\t<INV>\t.\tPASS\tSVTYPE=INV;END=10100",
            "chr1\t20501\tv3\tN\t<DUP>\t.\tPASS\tSVTYPE=DUP;END=20600",
        ]);
        let features = Features::Regulatory {
            elements: vec![
                promoter("p1", 1000, 2000),
                promoter("p2", 10000, 10500),
                enhancer,
            ],
            genes: vec![target],
        };
        let (_, records) = run(&ConsequenceCommand::new(), &input, features);

        assert_eq!(
            records[0].info.get("SVCSQ"),
            Some("protein_coding_gene|TGT|p1|protein_coding|DEL|+")
        );
        assert_eq!(
            records[1].info.get("SVCSQ"),
            Some("linked_gene_not_found|not found|p2|not found|INV|not found")
        );
        assert_eq!(
            records[2].info.get("SVCSQ"),
            Some("non_protein_coding|FAR|enh1|lncRNA|DUP|-")
        );
    }

    #[test]
    fn test_classify_without_transcripts() {
        let gene = Gene::new("g", "chr1", 0, 100, Strand::Unknown);
        assert_eq!(
            classify_gene(&gene, &SvType::Del, 10, 20),
            (GeneConsequence::Intron, None)
        );
        assert_eq!(
            classify_gene(&gene, &SvType::Bnd, 10, 11),
            (GeneConsequence::Bnd, None)
        );
    }
}
