//! Signed messages that can be submitted more than once.

use crate::core::{RuleMatch, Severity, SinkSite};
use crate::model::{Operation, OperationKind};
use crate::signature::ReplayVerdict;
use anyhow::{anyhow, bail, Result};

pub struct MissingReplayNonceRule;

impl MissingReplayNonceRule {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
        let Operation::SignatureCheck { signer, .. } = site.operation else {
            bail!("expected a signature check, got {}", site.operation.kind());
        };
        let assessment = site
            .replay
            .ok_or_else(|| anyhow!("no replay assessment for operation {}", site.index))?;

        if !assessment.is_replayable() {
            return Ok(None);
        }

        let description = match &assessment.verdict {
            ReplayVerdict::Unconsumed { field } => format!(
                "Function '{}' accepts a signature from `{}` whose message carries `{}`, but \
                 no state write consumes it. The same signed message verifies again on every \
                 call, so it can be replayed until the signer's funds are gone.",
                site.function_name(),
                signer,
                field
            ),
            _ => format!(
                "Function '{}' accepts a signature from `{}` whose message has no nonce, \
                 consumed-once marker or expiry. Anyone who has seen one valid signature can \
                 submit it again.",
                site.function_name(),
                signer
            ),
        };

        let mut m = RuleMatch::new(
            format!("Replayable signature in '{}'", site.function_name()),
            description,
        )
        .with_evidence(format!("verdict: {}", assessment.verdict));

        for field in assessment.replay_fields() {
            m = m.with_evidence(format!(
                "field `{}` classified {:?}{}",
                field.value,
                field.role,
                if field.inferred { " (from its name)" } else { "" }
            ));
        }

        let operands = site.operation.operands();
        Ok(Some(m.with_path(site.path_for(&operands))))
    }
}

impl Default for MissingReplayNonceRule {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_rule!(
    MissingReplayNonceRule,
    id: "missing-replay-nonce",
    name: "Missing replay nonce",
    severity: Severity::High,
    inspects: [OperationKind::SignatureCheck],
    remediation: "Include a per-signer nonce in the signed message and increment it in the same \
                  function, or mark each message hash as used after verification.",
    description: "Detects signature checks without nonce, consumed marker or expiry"
);
