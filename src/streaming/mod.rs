//! Position-ordered streaming machinery shared by all svanno commands.
//!
//! - [`StreamCursor`]: ordered pull with single-record pushback
//! - [`SlidingWindow`]: forward-only `[start, end)` window over a cursor
//! - [`FeatureSweep`]: heap-ordered live set of annotation features
//! - [`OrderValidator`]: inline sort-order check for declared-sorted input
//!
//! Windowing components keep O(k) memory where k = max records active at
//! any position.

pub mod active_set;
pub mod buffers;
pub mod cursor;
pub mod sweep;
pub mod validation;
pub mod window;

pub use active_set::ActiveSet;
pub use cursor::StreamCursor;
pub use sweep::{FeatureSweep, SweepFeature};
pub use validation::OrderValidator;
pub use window::SlidingWindow;

/// A record with a canonical position: its chromosome and 0-based start.
pub trait Positioned {
    fn chrom(&self) -> &str;
    fn position(&self) -> u64;
}
