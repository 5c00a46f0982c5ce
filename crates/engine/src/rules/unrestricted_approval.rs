//! Approvals granted to a spender the caller picks.

use crate::core::{RuleMatch, Severity, SinkSite};
use crate::model::{Operation, OperationKind};
use anyhow::{bail, Result};

pub struct UnrestrictedApprovalRule;

impl UnrestrictedApprovalRule {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
        let Operation::ApprovalGrant { spender, amount } = site.operation else {
            bail!("expected an approval grant, got {}", site.operation.kind());
        };

        let fact = site.fact(spender);
        if !fact.label.is_caller_controlled() || fact.is_allow_listed() {
            return Ok(None);
        }

        Ok(Some(
            RuleMatch::new(
                format!("Caller-chosen spender approved in '{}'", site.function_name()),
                format!(
                    "Function '{}' approves `{}` to spend `{}` of the contract's tokens, and \
                     the caller decides who `{}` is. The caller can approve an address they \
                     control and pull the contract's balance.",
                    site.function_name(),
                    spender,
                    amount,
                    spender
                ),
            )
            .with_evidence(site.explain("spender", spender))
            .with_evidence(site.explain("amount", amount))
            .with_path(site.path_for(&[spender, amount])),
        ))
    }
}

impl Default for UnrestrictedApprovalRule {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_rule!(
    UnrestrictedApprovalRule,
    id: "unrestricted-approval",
    name: "Unrestricted approval grant",
    severity: Severity::High,
    inspects: [OperationKind::ApprovalGrant],
    remediation: "Only approve fixed, trusted spenders, or restrict the spender to an allow-list.",
    description: "Detects token approvals whose spender is caller-controlled",
    skips_restricted: true
);
