//! Forward-only sliding window over an ordered record stream.
//!
//! The window exposes the records whose key lies in
//! `[window_start, window_end)`. Both bounds only move forward, so records
//! enter at the back (when the end advances) and leave from the front
//! (when the start advances). Nothing is ever re-sorted or re-read.
//!
//! # Memory Complexity
//!
//! O(k) where k = max number of records inside the window at any time.

use log::trace;

use crate::error::{Result, SvError};
use crate::order::OrderKey;
use crate::streaming::active_set::ActiveSet;
use crate::streaming::cursor::StreamCursor;
use crate::streaming::Positioned;

/// Sliding `[start, end)` window consuming a [`StreamCursor`].
pub struct SlidingWindow<R, I> {
    cursor: StreamCursor<R, I>,
    window_start: OrderKey,
    window_end: OrderKey,
    active: ActiveSet<(OrderKey, R)>,
    exhausted: bool,
    /// Records that were already behind the window when read.
    skipped: usize,
}

impl<R, I> SlidingWindow<R, I>
where
    R: Positioned,
    I: Iterator<Item = Result<R>>,
{
    /// Create an empty window positioned below every real key.
    pub fn new(cursor: StreamCursor<R, I>) -> Self {
        Self {
            cursor,
            window_start: OrderKey::min(),
            window_end: OrderKey::min(),
            active: ActiveSet::new(),
            exhausted: false,
            skipped: 0,
        }
    }

    /// Move the window end forward to `(chrom, pos)` and pull every record
    /// that now falls inside the window.
    ///
    /// Fails with an order violation, leaving the window untouched, if the
    /// new end precedes the current one.
    pub fn advance_end(&mut self, chrom: &str, pos: u64) -> Result<()> {
        let new_end = self.cursor.contig_order().key(chrom, pos);
        if new_end < self.window_end {
            return Err(SvError::OrderViolation {
                context: "window end".to_string(),
                previous: self.window_end.to_string(),
                attempted: new_end.to_string(),
            });
        }
        self.window_end = new_end;

        while !self.exhausted {
            let Some((key, record)) = self.cursor.next()? else {
                self.exhausted = true;
                break;
            };
            if key >= self.window_end {
                // Belongs to a future window
                self.cursor.push_back((key, record));
                break;
            }
            if key >= self.window_start {
                self.active.push((key, record));
            } else {
                self.skipped += 1;
            }
        }
        Ok(())
    }

    /// Move the window start forward to `(chrom, pos)` and evict every
    /// active record that now precedes it.
    ///
    /// Fails with an order violation, leaving the window untouched, if the
    /// new start precedes the current one.
    pub fn advance_start(&mut self, chrom: &str, pos: u64) -> Result<()> {
        let new_start = self.cursor.contig_order().key(chrom, pos);
        if new_start < self.window_start {
            return Err(SvError::OrderViolation {
                context: "window start".to_string(),
                previous: self.window_start.to_string(),
                attempted: new_start.to_string(),
            });
        }
        self.window_start = new_start;

        // Records arrive in key order, so eviction is always from the front
        let evicted = self
            .active
            .advance_while(|(key, _)| *key < self.window_start);
        if evicted > 0 {
            trace!("Evicted {} records before {}", evicted, self.window_start);
        }
        Ok(())
    }

    /// Read the rest of the stream without admitting anything, so a sorted
    /// source is still validated to its end.
    ///
    /// Returns the number of records read.
    pub fn drain(&mut self) -> Result<usize> {
        let mut drained = 0;
        while !self.exhausted {
            if self.cursor.next()?.is_none() {
                self.exhausted = true;
            } else {
                drained += 1;
            }
        }
        Ok(drained)
    }

    /// Active records in key order.
    pub fn active(&self) -> impl Iterator<Item = &R> {
        self.active.iter().map(|(_, record)| record)
    }

    /// Active records with their keys, in key order.
    pub fn active_keyed(&self) -> impl Iterator<Item = (&OrderKey, &R)> {
        self.active.iter().map(|(key, record)| (key, record))
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn window_start(&self) -> &OrderKey {
        &self.window_start
    }

    pub fn window_end(&self) -> &OrderKey {
        &self.window_end
    }

    /// True once the underlying stream has no more records.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Largest active set observed.
    pub fn max_active(&self) -> usize {
        self.active.max_active()
    }

    /// Records dropped because they preceded the window when read.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
