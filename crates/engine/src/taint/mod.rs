//! Taint tracking: which values an untrusted caller can steer.

pub mod context;
pub mod label;
pub mod tracker;

pub use context::{Constraint, FactSource, TaintContext, TaintEvent, TaintFact};
pub use label::TaintLabel;
pub use tracker::{
    call_target_unconstrained, FunctionTaint, TaintTracker, TaintedModel, TrackedOperation,
};
