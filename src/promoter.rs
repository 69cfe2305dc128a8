//! Promoter-to-gene linking over a shared, destructively consumed queue.
//!
//! Promoters are linked in increasing position order. Each scan resumes
//! where the previous one stopped: genes are only ever dropped from the
//! front, so a promoter that sits before an already consumed gene can
//! never see that gene again. Input promoters must therefore be sorted.

use std::collections::VecDeque;

use log::debug;

use crate::gff::{Gene, LinkedGene, RegulatoryElement};
use crate::interval::Strand;
use crate::order::ContigOrder;

/// Exclusive distance bound between a promoter and its gene.
pub const PROMOTER_SEARCH_DISTANCE: u64 = 5000;

/// Genes ordered by `(chromosome, start)`, consumed from the front.
#[derive(Debug, Default)]
pub struct GeneQueue {
    genes: VecDeque<Gene>,
    discarded: usize,
    requeued: usize,
}

impl GeneQueue {
    /// Build a queue, stably sorting genes by `(chromosome, start)`.
    pub fn new(mut genes: Vec<Gene>, order: &ContigOrder) -> Self {
        genes.sort_by_cached_key(|g| order.key(&g.chrom, g.start));
        Self {
            genes: genes.into(),
            discarded: 0,
            requeued: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn front(&self) -> Option<&Gene> {
        self.genes.front()
    }

    /// Genes dropped without linking.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Times a gene was put back after overshooting a promoter.
    pub fn requeued(&self) -> usize {
        self.requeued
    }
}

/// Links promoters to the nearest downstream gene.
#[derive(Debug, Clone)]
pub struct PromoterLinker {
    pub max_distance: u64,
}

impl Default for PromoterLinker {
    fn default() -> Self {
        Self::new()
    }
}

impl PromoterLinker {
    pub fn new() -> Self {
        Self {
            max_distance: PROMOTER_SEARCH_DISTANCE,
        }
    }

    pub fn with_max_distance(mut self, max_distance: u64) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Does `gene` qualify as the target of `promoter`?
    ///
    /// Forward genes must start within `(0, max_distance)` after the
    /// promoter start; reverse genes must end within `(0, max_distance)`
    /// before the promoter end.
    #[inline]
    pub fn qualifies(&self, promoter: &RegulatoryElement, gene: &Gene) -> bool {
        let within = |d: i128| d > 0 && d < self.max_distance as i128;
        match gene.strand {
            Strand::Plus => within(gene.start as i128 - promoter.start as i128),
            Strand::Minus => within(promoter.end as i128 - gene.end as i128),
            Strand::Unknown => false,
        }
    }

    /// Scan the queue for the promoter's gene.
    ///
    /// Genes on another chromosome and non-qualifying genes are discarded.
    /// A qualifying gene is consumed and returned. A gene starting past the
    /// promoter end without qualifying stops the scan: it is put back at
    /// the front and the "not found" sentinel is returned.
    pub fn link(&self, queue: &mut GeneQueue, promoter: &RegulatoryElement) -> LinkedGene {
        while let Some(gene) = queue.genes.pop_front() {
            if gene.chrom != promoter.chrom {
                queue.discarded += 1;
                continue;
            }
            if self.qualifies(promoter, &gene) {
                return LinkedGene::from_gene(&gene);
            }
            if gene.start > promoter.end {
                debug!(
                    "No gene for promoter {}; requeueing {} at {}",
                    promoter.id, gene.id, gene.start
                );
                queue.genes.push_front(gene);
                queue.requeued += 1;
                return LinkedGene::not_found();
            }
            queue.discarded += 1;
        }
        LinkedGene::not_found()
    }
}

/// Consequence label derived from a linked gene's biotype.
pub fn link_label(link: &LinkedGene) -> &'static str {
    if !link.is_found() {
        "linked_gene_not_found"
    } else if link.biotype == "protein_coding" {
        "protein_coding_gene"
    } else {
        "non_protein_coding"
    }
}
