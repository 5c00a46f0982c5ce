//! Transfers into a privileged holding account from a source the caller picks.
//!
//! If the caller can name the vault itself as the source, the vault pays itself
//! and the contract credits the caller for a deposit that never happened.

use crate::core::{RuleMatch, Severity, SinkSite};
use crate::model::{Operation, OperationKind};
use anyhow::{bail, Result};

pub struct SelfReferentialTransferRule;

impl SelfReferentialTransferRule {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
        let (from, to) = match site.operation {
            Operation::TokenTransfer {
                explicit_source: false,
                ..
            } => return Ok(None),
            Operation::TokenTransfer { from, to, .. } => (from, to),
            Operation::ExternalCall { moves: None, .. } => return Ok(None),
            Operation::ExternalCall {
                moves: Some(flow), ..
            } => (&flow.from, &flow.to),
            other => bail!("expected an asset transfer, got {}", other.kind()),
        };

        if !site.contract.is_privileged_account(to) {
            return Ok(None);
        }

        let source = site.fact(from);
        if !source.label.is_caller_controlled() {
            return Ok(None);
        }
        if source.is_distinct_from(to) || site.fact(to).is_distinct_from(from) {
            return Ok(None);
        }

        Ok(Some(
            RuleMatch::new(
                format!("Privileged account can pay itself in '{}'", site.function_name()),
                format!(
                    "Function '{}' moves assets into the privileged account `{}` from `{}`, \
                     which the caller chooses. Nothing stops the caller naming `{}` as the \
                     source, so the account transfers to itself and the function's side \
                     effects fire without any value arriving.",
                    site.function_name(),
                    to,
                    from,
                    to
                ),
            )
            .with_evidence(site.explain("source", from))
            .with_evidence(format!("destination `{}` is a privileged holding account", to))
            .with_path(site.path_for(&[from, to])),
        ))
    }
}

impl Default for SelfReferentialTransferRule {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_rule!(
    SelfReferentialTransferRule,
    id: "self-referential-transfer",
    name: "Self-referential privileged transfer",
    severity: Severity::High,
    inspects: [OperationKind::TokenTransfer, OperationKind::ExternalCall],
    remediation: "Require the source to differ from the privileged destination \
                  (`require(from != vault)`), or take the source from `msg.sender`.",
    description: "Detects transfers where a privileged account can be both source and destination",
    skips_restricted: true
);
