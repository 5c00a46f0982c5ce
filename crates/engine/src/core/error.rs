//! Fatal error taxonomy for an analysis run.
//!
//! Structural problems with the input abort the run before any rule is evaluated,
//! so a caller never sees a partial report for a broken model. Rule predicate
//! failures are not represented here: they surface as
//! [`Diagnostic`](crate::core::Diagnostic) entries on an otherwise complete report.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("malformed model at {path}: {reason}")]
    MalformedModel { path: String, reason: String },

    #[error("model too large: {size} operations exceeds the ceiling of {ceiling}")]
    ModelTooLarge { size: usize, ceiling: usize },

    #[error("failed to parse model document: {0}")]
    Parse(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedModel {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Errors caused by the input document rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedModel { .. } | Self::ModelTooLarge { .. } | Self::Parse(_)
        )
    }
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_path() {
        let err = AnalysisError::malformed("functions[0].operations[1]", "undeclared parameter 'x'");
        assert_eq!(
            err.to_string(),
            "malformed model at functions[0].operations[1]: undeclared parameter 'x'"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_io_is_not_input_error() {
        let err = AnalysisError::Io {
            path: PathBuf::from("missing.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(!err.is_input_error());
    }
}
