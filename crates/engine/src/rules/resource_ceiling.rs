//! Hard caps on shared resources that nothing ever frees.
//!
//! A write that enforces `count <= MAX` on a shared slot is a denial of service
//! waiting to happen when no function in the contract decrements, consumes or
//! deletes that slot: once the cap is reached it stays reached.

use crate::core::{RuleMatch, Severity, SinkSite};
use crate::model::{Operation, OperationKind};
use anyhow::{bail, Result};

pub struct ResourceCeilingRule;

impl ResourceCeilingRule {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
        let Operation::StateWrite {
            slot,
            effect,
            ceiling,
            ..
        } = site.operation
        else {
            bail!("expected a state write, got {}", site.operation.kind());
        };

        let Some(ceiling) = ceiling else {
            return Ok(None);
        };
        if effect.releases() {
            return Ok(None);
        }
        let Some(root) = slot.slot_root() else {
            bail!("state write target `{}` is not a storage slot", slot);
        };

        let release = site.contract.state_writes().find(|(_, _, op)| {
            matches!(op, Operation::StateWrite { slot: other, effect, .. }
                if effect.releases() && other.slot_root().as_ref() == Some(&root))
        });
        if release.is_some() {
            return Ok(None);
        }

        Ok(Some(
            RuleMatch::new(
                format!("Capped resource `{}` is never released", root),
                format!(
                    "Function '{}' grows `{}` up to the ceiling `{}`, but no function in the \
                     contract ever decrements, consumes or deletes `{}`. Once the ceiling is \
                     reached every later call reverts and the resource is locked for good.",
                    site.function_name(),
                    slot,
                    ceiling,
                    root
                ),
            )
            .with_evidence(format!("`{}` written with effect {:?} under ceiling `{}`", slot, effect, ceiling))
            .with_evidence(format!(
                "no release of `{}` in any of {} function(s)",
                root,
                site.contract.function_count()
            ))
            .with_path(vec![site.index]),
        ))
    }
}

impl Default for ResourceCeilingRule {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_rule!(
    ResourceCeilingRule,
    id: "resource-ceiling-without-release",
    name: "Hard resource ceiling without release path",
    severity: Severity::Medium,
    inspects: [OperationKind::StateWrite],
    remediation: "Add a path that decrements or clears the capped counter when the resource is \
                  freed, or make the ceiling adjustable by governance.",
    description: "Detects capped state counters that no function ever decrements"
);
