//! Sweep-line live set of annotation features.
//!
//! Features wait in a FIFO queue ordered by `(chromosome, start)` and are
//! admitted to a min-heap keyed by `(chromosome, end, serial)` as soon as
//! they could overlap the current variant. Variants arrive with
//! non-decreasing start, so a feature whose end precedes the current
//! variant start can never overlap again and is evicted for good.
//!
//! The serial is a monotonically increasing admission counter: features
//! sharing an end coordinate are evicted in admission order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use log::debug;
use rustc_hash::FxHashMap;

use crate::order::{ContigOrder, OrderKey};

/// A genomic feature that can take part in a sweep.
pub trait SweepFeature {
    fn chrom(&self) -> &str;
    /// 0-based start.
    fn start(&self) -> u64;
    /// 0-based exclusive end.
    fn end(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    end: OrderKey,
    serial: u64,
}

/// Heap-ordered sweep over a sorted feature queue.
pub struct FeatureSweep<F> {
    order: ContigOrder,
    queue: VecDeque<F>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    live: FxHashMap<u64, F>,
    next_serial: u64,
    max_live: usize,
}

impl<F: SweepFeature> FeatureSweep<F> {
    /// Build a sweep; features are stably sorted by `(chromosome, start)`.
    pub fn new(mut features: Vec<F>, order: ContigOrder) -> Self {
        features.sort_by_cached_key(|f| order.key(f.chrom(), f.start()));
        debug!("Feature sweep queued {} features", features.len());
        Self {
            order,
            queue: features.into(),
            heap: BinaryHeap::new(),
            live: FxHashMap::default(),
            next_serial: 0,
            max_live: 0,
        }
    }

    /// Move the sweep line to a variant spanning `[start, stop)`.
    ///
    /// Admits every queued feature with `(chrom, start) <= (chrom, stop)`,
    /// calling `on_admit` once per feature in admission order, then evicts
    /// every live feature whose `(chrom, end)` precedes `(chrom, start)`.
    pub fn advance<A>(&mut self, chrom: &str, start: u64, stop: u64, mut on_admit: A)
    where
        A: FnMut(&mut F),
    {
        let admit_limit = self.order.key(chrom, stop);
        while let Some(front) = self.queue.front() {
            if self.order.key(front.chrom(), front.start()) > admit_limit {
                break;
            }
            let Some(mut feature) = self.queue.pop_front() else {
                break;
            };
            on_admit(&mut feature);

            let serial = self.next_serial;
            self.next_serial += 1;
            self.heap.push(Reverse(HeapEntry {
                end: self.order.key(feature.chrom(), feature.end()),
                serial,
            }));
            self.live.insert(serial, feature);
        }
        self.max_live = self.max_live.max(self.live.len());

        let evict_before = self.order.key(chrom, start);
        while let Some(Reverse(top)) = self.heap.peek() {
            if top.end >= evict_before {
                break;
            }
            let serial = top.serial;
            self.heap.pop();
            self.live.remove(&serial);
        }
    }

    /// Live features overlapping `[start, stop)` on `chrom`, in admission order.
    pub fn overlapping(&self, chrom: &str, start: u64, stop: u64) -> Vec<&F> {
        let mut hits: Vec<(u64, &F)> = self
            .live
            .iter()
            .filter(|(_, f)| {
                f.chrom() == chrom && stop.min(f.end()) > start.max(f.start())
            })
            .map(|(serial, f)| (*serial, f))
            .collect();
        hits.sort_unstable_by_key(|(serial, _)| *serial);
        hits.into_iter().map(|(_, f)| f).collect()
    }

    /// Number of features currently live.
    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    /// Number of features not yet admitted.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn max_live(&self) -> usize {
        self.max_live
    }
}
