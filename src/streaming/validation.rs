//! Sort validation for streaming operations.
//!
//! Streaming algorithms require input in canonical [`OrderKey`] order.
//! Instead of reading a file twice, the validator checks each key as the
//! record is pulled and fails on the first one that moves backwards.

use crate::error::{Result, SvError};
use crate::order::OrderKey;

/// Inline order validator for use within streaming loops.
///
/// Validates that keys are non-decreasing. Because the chromosome rank
/// and name lead the key, this also requires records for a chromosome to
/// be contiguous and chromosomes to follow the declared contig order.
#[derive(Debug)]
pub struct OrderValidator {
    context: String,
    prev: Option<OrderKey>,
    record_count: usize,
}

impl OrderValidator {
    /// Create a validator whose errors name `context` (e.g. a file path).
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            prev: None,
            record_count: 0,
        }
    }

    /// Validate that the given key does not precede the previous one.
    #[inline]
    pub fn validate(&mut self, key: &OrderKey) -> Result<()> {
        self.record_count += 1;

        if let Some(prev) = &self.prev {
            if key < prev {
                return Err(SvError::OrderViolation {
                    context: format!(
                        "{} at record {} (input not sorted; declare it unsorted to sort in memory)",
                        self.context, self.record_count
                    ),
                    previous: prev.to_string(),
                    attempted: key.to_string(),
                });
            }
        }

        self.prev = Some(key.clone());
        Ok(())
    }

    /// Get the number of records validated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::ContigOrder;

    #[test]
    fn test_sorted_keys_pass() {
        let order = ContigOrder::new();
        let mut validator = OrderValidator::new("a.vcf");
        assert!(validator.validate(&order.key("chr1", 100)).is_ok());
        assert!(validator.validate(&order.key("chr1", 100)).is_ok());
        assert!(validator.validate(&order.key("chr1", 200)).is_ok());
        assert!(validator.validate(&order.key("chr2", 100)).is_ok());
        assert_eq!(validator.record_count(), 4);
    }

    #[test]
    fn test_backwards_position_fails() {
        let order = ContigOrder::new();
        let mut validator = OrderValidator::new("a.vcf");
        assert!(validator.validate(&order.key("chr1", 200)).is_ok());
        let err = validator.validate(&order.key("chr1", 100)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("chr1:200"));
        assert!(msg.contains("chr1:100"));
        assert!(msg.contains("a.vcf"));
    }

    #[test]
    fn test_interleaved_chromosomes_fail() {
        let order = ContigOrder::new();
        let mut validator = OrderValidator::new("a.vcf");
        assert!(validator.validate(&order.key("chr1", 100)).is_ok());
        assert!(validator.validate(&order.key("chr2", 100)).is_ok());
        assert!(validator.validate(&order.key("chr1", 300)).is_err());
    }

    #[test]
    fn test_declared_order_is_enforced() {
        let order = ContigOrder::from_names(["chr2", "chr1"]);
        let mut validator = OrderValidator::new("a.vcf");
        assert!(validator.validate(&order.key("chr2", 100)).is_ok());
        assert!(validator.validate(&order.key("chr1", 100)).is_ok());

        let mut validator = OrderValidator::new("b.vcf");
        assert!(validator.validate(&order.key("chr1", 100)).is_ok());
        assert!(validator.validate(&order.key("chr2", 100)).is_err());
    }
}
