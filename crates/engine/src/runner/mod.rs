//! Rule execution and orchestration
//!
//! The registry holds the available rules; the engine walks every operation of
//! every analyzed function, hands each one to the rules that inspect its kind, and
//! collects findings and diagnostics. Adding a rule needs no change here.

pub mod engine;
pub mod registry;

pub use engine::{RuleEngine, RuleRun};
pub use registry::{RuleInfo, RuleRegistry};
