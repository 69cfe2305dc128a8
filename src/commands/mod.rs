//! Command implementations for svanno.

pub mod consequence;
pub mod filter;
pub mod matching;
pub mod zygosity;

pub use consequence::{
    classify_gene, ConsequenceCommand, ConsequenceStats, Features, GeneConsequence,
};
pub use filter::{FilterCommand, FilterStats, Predicate};
pub use matching::{CopyFields, MatchCommand, MatchStats};
pub use zygosity::{Zygosity, ZygosityCommand, ZygosityStats};
