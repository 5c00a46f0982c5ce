//! Core abstractions shared by the loader, the rules and the engine.
//!
//! The `Rule` trait defines the interface every detector implements and `SinkSite`
//! is the read-only view a rule gets of one operation. Findings, diagnostics and
//! their fingerprints are plain serializable values, so a report can be rebuilt
//! byte for byte from the same input.

pub mod config;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod result;
pub mod rule;
pub mod severity;

pub use config::AnalysisConfig;
pub use context::SinkSite;
pub use error::{AnalysisError, AnalysisResult};
pub use fingerprint::{DeduplicationStats, FindingFingerprint};
pub use result::{Diagnostic, Finding};
pub use rule::{Rule, RuleMatch};
pub use severity::Severity;
