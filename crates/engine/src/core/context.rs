use crate::model::{ContractModel, FunctionModel, Operation, ValueRef};
use crate::signature::ReplayAssessment;
use crate::taint::{FunctionTaint, TaintContext, TaintFact, TaintLabel};
use std::collections::BTreeSet;

/// One operation as a rule sees it: where it sits, and the taint state it ran in.
#[derive(Debug, Clone, Copy)]
pub struct SinkSite<'a> {
    pub contract: &'a ContractModel,
    pub function: &'a FunctionModel,
    pub signature: &'a str,
    pub index: usize,
    pub operation: &'a Operation,
    /// Taint state immediately before the operation.
    pub taint: &'a TaintContext,
    pub function_taint: &'a FunctionTaint,
    pub replay: Option<&'a ReplayAssessment>,
    /// The function sits behind a privileged guard.
    pub access_restricted: bool,
}

impl<'a> SinkSite<'a> {
    pub fn fact(&self, value: &ValueRef) -> TaintFact {
        self.taint.fact(value)
    }

    pub fn label(&self, value: &ValueRef) -> TaintLabel {
        self.taint.label(value)
    }

    /// Earlier operations that shaped `values`, followed by this operation.
    pub fn path_for(&self, values: &[&ValueRef]) -> Vec<usize> {
        let mut path: BTreeSet<usize> = values
            .iter()
            .flat_map(|value| self.fact(value).origins)
            .filter(|origin| *origin < self.index)
            .collect();
        path.insert(self.index);
        path.into_iter().collect()
    }

    /// A one-line account of how `value` got its label, for finding evidence.
    pub fn explain(&self, role: &str, value: &ValueRef) -> String {
        let fact = self.fact(value);
        let mut line = format!("{} `{}` is {} ({})", role, value, fact.label, fact.source);
        if fact.caller_observable {
            line.push_str(", observable by the caller");
        }
        line
    }

    pub fn function_name(&self) -> &str {
        &self.function.name
    }
}
