use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust attached to a value.
///
/// Ordered by trust, so the join of two labels is the less trusted one:
///
/// ```text
///   Trusted
///      |
///   Unknown
///      |
///   CallerControlled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaintLabel {
    Trusted,
    Unknown,
    CallerControlled,
}

impl TaintLabel {
    fn trust(&self) -> u8 {
        match self {
            Self::Trusted => 2,
            Self::Unknown => 1,
            Self::CallerControlled => 0,
        }
    }

    pub fn least_trusted(self, other: TaintLabel) -> TaintLabel {
        if other.trust() < self.trust() {
            other
        } else {
            self
        }
    }

    /// Join over many labels. No inputs means nothing untrusted flowed in.
    pub fn join_all(labels: impl IntoIterator<Item = TaintLabel>) -> TaintLabel {
        labels
            .into_iter()
            .fold(TaintLabel::Trusted, TaintLabel::least_trusted)
    }

    pub fn is_caller_controlled(&self) -> bool {
        matches!(self, Self::CallerControlled)
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted)
    }
}

impl fmt::Display for TaintLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trusted => write!(f, "Trusted"),
            Self::Unknown => write!(f, "Unknown"),
            Self::CallerControlled => write!(f, "CallerControlled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_picks_least_trusted() {
        use TaintLabel::*;
        assert_eq!(Trusted.least_trusted(Unknown), Unknown);
        assert_eq!(Unknown.least_trusted(CallerControlled), CallerControlled);
        assert_eq!(CallerControlled.least_trusted(Trusted), CallerControlled);
        assert_eq!(TaintLabel::join_all([Trusted, Unknown, Trusted]), Unknown);
        assert_eq!(TaintLabel::join_all([]), Trusted);
    }
}
