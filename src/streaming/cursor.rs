//! Ordered record cursor with single-record pushback.

use std::vec;

use log::info;

use crate::error::Result;
use crate::order::{ContigOrder, OrderKey};
use crate::streaming::validation::OrderValidator;
use crate::streaming::Positioned;

/// Where the cursor pulls records from.
enum Source<R, I> {
    /// Declared sorted: pulled lazily and validated inline.
    Streaming { iter: I, validator: OrderValidator },
    /// Declared unsorted, not yet loaded.
    Pending(I),
    /// Declared unsorted: fully loaded and stably sorted.
    Loaded(vec::IntoIter<(OrderKey, R)>),
}

/// Wraps an ordered record source, exposing records in ascending
/// [`OrderKey`] order with one level of pushback.
///
/// A source declared sorted is validated as it streams; a record whose key
/// precedes its predecessor fails with an order violation. A source
/// declared unsorted is loaded into memory and stably sorted (ties keep
/// read order) before the first record is returned.
pub struct StreamCursor<R, I> {
    order: ContigOrder,
    source: Source<R, I>,
    pushed_back: Option<(OrderKey, R)>,
}

impl<R, I> StreamCursor<R, I>
where
    R: Positioned,
    I: Iterator<Item = Result<R>>,
{
    /// Cursor over a source whose records are already in canonical order.
    pub fn sorted(iter: I, order: ContigOrder, context: impl Into<String>) -> Self {
        Self {
            order,
            source: Source::Streaming {
                iter,
                validator: OrderValidator::new(context),
            },
            pushed_back: None,
        }
    }

    /// Cursor over a source in arbitrary order (in-memory sort fallback).
    pub fn unsorted(iter: I, order: ContigOrder) -> Self {
        Self {
            order,
            source: Source::Pending(iter),
            pushed_back: None,
        }
    }

    /// Build a cursor from a declared-sorted flag.
    pub fn new(iter: I, order: ContigOrder, sorted: bool, context: impl Into<String>) -> Self {
        if sorted {
            Self::sorted(iter, order, context)
        } else {
            Self::unsorted(iter, order)
        }
    }

    /// Canonical key of a record. Pure; does not consume anything.
    #[inline]
    pub fn order_key(&self, record: &R) -> OrderKey {
        self.order.key(record.chrom(), record.position())
    }

    pub fn contig_order(&self) -> &ContigOrder {
        &self.order
    }

    /// Return the next record with its key, or `None` at end of stream.
    pub fn next(&mut self) -> Result<Option<(OrderKey, R)>> {
        if let Some(item) = self.pushed_back.take() {
            return Ok(Some(item));
        }

        if let Source::Pending(_) = self.source {
            self.load_all()?;
        }

        match &mut self.source {
            Source::Streaming { iter, validator } => match iter.next() {
                Some(record) => {
                    let record = record?;
                    let key = self.order.key(record.chrom(), record.position());
                    validator.validate(&key)?;
                    Ok(Some((key, record)))
                }
                None => Ok(None),
            },
            Source::Loaded(iter) => Ok(iter.next()),
            Source::Pending(_) => Ok(None),
        }
    }

    /// Hand back the record just returned by [`next`](Self::next) so the
    /// following call redelivers it.
    ///
    /// Supports exactly one level of lookahead.
    pub fn push_back(&mut self, item: (OrderKey, R)) {
        debug_assert!(
            self.pushed_back.is_none(),
            "push_back called twice without an intervening next"
        );
        self.pushed_back = Some(item);
    }

    fn load_all(&mut self) -> Result<()> {
        let empty = Source::Loaded(Vec::new().into_iter());
        let Source::Pending(iter) = std::mem::replace(&mut self.source, empty) else {
            return Ok(());
        };

        let mut loaded = Vec::new();
        for record in iter {
            let record = record?;
            loaded.push((self.order.key(record.chrom(), record.position()), record));
        }
        // Stable: equal keys keep read order
        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        info!("Sorted {} records in memory", loaded.len());

        self.source = Source::Loaded(loaded.into_iter());
        Ok(())
    }
}
