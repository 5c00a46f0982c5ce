//! Return bombs: untrusted callees handed all gas and an uncapped return buffer.

use crate::core::{RuleMatch, Severity, SinkSite};
use crate::model::{Operation, OperationKind, ReturnDataHandling};
use anyhow::{bail, Result};

pub struct UnboundedReturnDataRule;

impl UnboundedReturnDataRule {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
        let Operation::ExternalCall {
            target,
            target_is_caller_controlled,
            gas_limit,
            return_data,
            ..
        } = site.operation
        else {
            bail!("expected an external call, got {}", site.operation.kind());
        };

        if gas_limit.is_some() || *return_data != ReturnDataHandling::Copied {
            return Ok(None);
        }
        // the model's flag overrides the tracked label, as for arbitrary calls
        let untrusted = match target_is_caller_controlled {
            Some(flag) => *flag,
            None => !site.label(target).is_trusted(),
        };
        if !untrusted {
            return Ok(None);
        }

        Ok(Some(
            RuleMatch::new(
                format!("Unbounded return data in '{}'", site.function_name()),
                format!(
                    "Function '{}' calls `{}` forwarding all remaining gas and copies whatever \
                     it returns into memory. A malicious callee can return a huge payload and \
                     make the call run out of gas after it succeeds, blocking this function.",
                    site.function_name(),
                    target
                ),
            )
            .with_evidence(match target_is_caller_controlled {
                Some(true) => format!("target `{}` is declared caller-controlled", target),
                _ => site.explain("target", target),
            })
            .with_evidence("no gas limit; return data copied in full")
            .with_path(site.path_for(&[target])),
        ))
    }
}

impl Default for UnboundedReturnDataRule {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_rule!(
    UnboundedReturnDataRule,
    id: "unbounded-return-data",
    name: "Unbounded return-data forwarding",
    severity: Severity::Medium,
    inspects: [OperationKind::ExternalCall],
    remediation: "Cap the gas forwarded to untrusted callees and copy at most a fixed number of \
                  return bytes (for example with an assembly call or ExcessivelySafeCall).",
    description: "Detects external calls to untrusted targets with uncapped gas and return data"
);
