//! Token transfers that pull from an account the caller names.
//!
//! `transferFrom(from, to, amount)` with a caller-supplied `from` lets anyone spend
//! the allowance another user granted the contract. The transfer is safe once
//! `from` has been checked equal to `msg.sender` (or another trusted value).

use crate::core::{RuleMatch, Severity, SinkSite};
use crate::model::{Operation, OperationKind};
use anyhow::{bail, Result};

pub struct UnrestrictedSourceRule;

impl UnrestrictedSourceRule {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
        let Operation::TokenTransfer {
            from,
            to,
            explicit_source,
            ..
        } = site.operation
        else {
            bail!("expected a token transfer, got {}", site.operation.kind());
        };

        if !explicit_source {
            return Ok(None);
        }

        let fact = site.fact(from);
        if !fact.label.is_caller_controlled() || fact.equals_trusted() {
            return Ok(None);
        }

        Ok(Some(
            RuleMatch::new(
                format!("Caller-controlled transfer source in '{}'", site.function_name()),
                format!(
                    "Function '{}' transfers tokens out of `{}`, which the caller chooses and which \
                     is never checked against the transaction's sender. Any account that approved \
                     this contract can be drained into `{}`.",
                    site.function_name(),
                    from,
                    to
                ),
            )
            .with_evidence(site.explain("source", from))
            .with_evidence(site.explain("destination", to))
            .with_path(site.path_for(&[from])),
        ))
    }
}

impl Default for UnrestrictedSourceRule {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_rule!(
    UnrestrictedSourceRule,
    id: "unrestricted-source",
    name: "Unrestricted transfer source",
    severity: Severity::High,
    inspects: [OperationKind::TokenTransfer],
    remediation: "Transfer from `msg.sender` instead of a caller-supplied account, or require \
                  `from == msg.sender` before the transfer.",
    description: "Detects token transfers whose source account is chosen by the caller",
    skips_restricted: true
);
