//! Low-level `create` whose result is stored unchecked.
//!
//! `create`/`create2` in assembly return the zero address on failure instead of
//! reverting. Storing that result without a zero check records a token or pool
//! that does not exist.

use crate::core::{RuleMatch, Severity, SinkSite};
use crate::model::{Operation, OperationKind, ValueRef};
use anyhow::{bail, Result};

pub struct UnvalidatedDeploymentRule;

impl UnvalidatedDeploymentRule {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
        let Operation::ContractCreation { low_level, .. } = site.operation else {
            bail!("expected a contract creation, got {}", site.operation.kind());
        };
        if !low_level {
            return Ok(None);
        }

        let deployed = ValueRef::Result(site.index);
        let unchecked_store = site
            .function
            .operations
            .iter()
            .enumerate()
            .skip(site.index + 1)
            .find_map(|(index, op)| match op {
                Operation::StateWrite {
                    slot,
                    value: Some(value),
                    ..
                } if value.mentions(&deployed) => {
                    let before = site.function_taint.before(index)?;
                    (!before.fact(&deployed).is_non_zero()).then_some((index, slot))
                }
                _ => None,
            });

        let Some((store, slot)) = unchecked_store else {
            return Ok(None);
        };

        Ok(Some(
            RuleMatch::new(
                format!("Unchecked deployment result in '{}'", site.function_name()),
                format!(
                    "Function '{}' deploys a contract with low-level create and stores the \
                     returned address in `{}` at operation {} without checking it is non-zero. \
                     A failed deployment is recorded as if it succeeded.",
                    site.function_name(),
                    slot,
                    store
                ),
            )
            .with_evidence(format!("`{}` created at operation {}", deployed, site.index))
            .with_evidence(format!("stored into `{}` at operation {}", slot, store))
            .with_path(vec![site.index, store]),
        ))
    }
}

impl Default for UnvalidatedDeploymentRule {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_rule!(
    UnvalidatedDeploymentRule,
    id: "unvalidated-deployment",
    name: "Unvalidated deployment result",
    severity: Severity::High,
    inspects: [OperationKind::ContractCreation],
    remediation: "Check `deployed != address(0)` after `create`/`create2` and revert on failure, \
                  or deploy with `new` which reverts by itself.",
    description: "Detects low-level contract creation whose result is stored without a zero check"
);
