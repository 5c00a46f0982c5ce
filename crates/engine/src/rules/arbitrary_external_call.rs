//! External calls to a target the caller picks.

use crate::core::{RuleMatch, Severity, SinkSite};
use crate::model::{Operation, OperationKind};
use crate::taint::call_target_unconstrained;
use anyhow::{bail, Result};

pub struct ArbitraryExternalCallRule;

impl ArbitraryExternalCallRule {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
        let Operation::ExternalCall {
            target,
            args,
            target_is_caller_controlled,
            ..
        } = site.operation
        else {
            bail!("expected an external call, got {}", site.operation.kind());
        };

        if !call_target_unconstrained(site.operation, site.taint) {
            return Ok(None);
        }

        let target_evidence = match target_is_caller_controlled {
            Some(true) => format!("target `{}` is marked caller-controlled in the model", target),
            _ => site.explain("target", target),
        };

        let mut values = vec![target];
        values.extend(args.iter());

        Ok(Some(
            RuleMatch::new(
                format!("Arbitrary external call in '{}'", site.function_name()),
                format!(
                    "Function '{}' calls `{}`, an address the caller chooses, and the target is \
                     not restricted to an allow-list. The caller can make the contract call any \
                     contract with its own identity, for example a token's `approve`, and drain \
                     what the contract holds.",
                    site.function_name(),
                    target
                ),
            )
            .with_evidence(target_evidence)
            .with_evidence(format!("{} argument(s) forwarded", args.len()))
            .with_path(site.path_for(&values)),
        ))
    }
}

impl Default for ArbitraryExternalCallRule {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_rule!(
    ArbitraryExternalCallRule,
    id: "arbitrary-external-call",
    name: "Unbounded arbitrary call",
    severity: Severity::High,
    inspects: [OperationKind::ExternalCall],
    remediation: "Restrict call targets to an allow-list of known contracts, or drop the \
                  caller-supplied target entirely.",
    description: "Detects external calls whose target address is caller-controlled",
    skips_restricted: true
);
