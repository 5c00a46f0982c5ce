//! Finding fingerprint for deduplication.
//!
//! Two findings are duplicates when the same rule fired on the same operation of
//! the same function. Title, description and evidence do not take part.

use crate::core::Finding;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FindingFingerprint {
    rule_id: String,
    function_signature: String,
    operation_index: usize,
}

impl FindingFingerprint {
    pub fn from_finding(finding: &Finding) -> Self {
        Self {
            rule_id: finding.rule_id.clone(),
            function_signature: finding.function_signature.clone(),
            operation_index: finding.operation_index,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeduplicationStats {
    pub original_count: usize,
    pub deduped_count: usize,
    pub removed_count: usize,
}

impl DeduplicationStats {
    pub fn reduction_percentage(&self) -> f64 {
        if self.original_count == 0 {
            0.0
        } else {
            (self.removed_count as f64 / self.original_count as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;

    #[test]
    fn test_same_site_same_rule_collapses() {
        let a = Finding::new("arbitrary-external-call", Severity::High, "execute", "execute(address)", 1)
            .with_title("first");
        let b = Finding::new("arbitrary-external-call", Severity::High, "execute", "execute(address)", 1)
            .with_title("second");
        assert_eq!(FindingFingerprint::from_finding(&a), FindingFingerprint::from_finding(&b));
    }

    #[test]
    fn test_different_operation_or_overload_is_distinct() {
        let a = Finding::new("r", Severity::High, "execute", "execute(address)", 1);
        let b = Finding::new("r", Severity::High, "execute", "execute(address)", 2);
        let c = Finding::new("r", Severity::High, "execute", "execute(address,bytes)", 1);

        let fa = FindingFingerprint::from_finding(&a);
        assert_ne!(fa, FindingFingerprint::from_finding(&b));
        assert_ne!(fa, FindingFingerprint::from_finding(&c));
    }

    #[test]
    fn test_reduction_percentage() {
        let stats = DeduplicationStats {
            original_count: 4,
            deduped_count: 3,
            removed_count: 1,
        };
        assert!((stats.reduction_percentage() - 25.0).abs() < f64::EPSILON);
        assert_eq!(DeduplicationStats::default().reduction_percentage(), 0.0);
    }
}
