// Clippy allows for the whole crate
#![allow(clippy::should_implement_trait)]
#![allow(clippy::type_complexity)]

//! svanno: streaming structural-variant annotation
//!
//! Position-ordered processing of structural variant calls in a single
//! forward pass.
//!
//! # Features
//!
//! - **Windowed matching**: find the most similar variant in a second call set
//! - **Sweep-line annotation**: gene and regulatory-element consequences
//! - **Streaming I/O**: memory bounded by the active window, not the input
//!
//! # Example
//!
//! ```rust,no_run
//! use svanno::commands::{ConsequenceCommand, Features};
//!
//! let features = Features::load("genes.gff3", None).unwrap();
//! let stats = ConsequenceCommand::new()
//!     .run("calls.vcf", features, std::io::stdout())
//!     .unwrap();
//! eprintln!("{}", stats);
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod gff;
pub mod interval;
pub mod order;
pub mod promoter;
pub mod streaming;
pub mod vcf;

// Re-export commonly used types
pub use error::{Result, SvError};
pub use order::{ContigOrder, OrderKey};
pub use vcf::{SvType, VcfReader, VcfRecord, VcfWriter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{
        ConsequenceCommand, Features, FilterCommand, MatchCommand, Predicate, ZygosityCommand,
    };
    pub use crate::error::{Result, SvError};
    pub use crate::gff::{Gene, RegulatoryElement};
    pub use crate::order::{ContigOrder, OrderKey};
    pub use crate::streaming::{FeatureSweep, SlidingWindow, StreamCursor};
    pub use crate::vcf::{SvType, VcfReader, VcfRecord, VcfWriter};
}
