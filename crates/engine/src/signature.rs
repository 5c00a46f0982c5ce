//! Replay analysis for signed-message verification.
//!
//! A signature is only safe to accept once if the signed message binds something
//! that stops it being accepted twice: an expiry checked at verification time, or a
//! nonce / used-marker that the function consumes. The analyzer classifies every
//! message field and looks for the consuming state write on the function's
//! operation sequence. A missing write is recorded as part of the assessment.

use crate::model::{
    CheckKind, ContractModel, FieldRole, FunctionModel, MessageField, Operation, ValueRef,
    WriteEffect,
};
use crate::taint::{FunctionTaint, TaintedModel};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayField {
    pub value: ValueRef,
    pub role: FieldRole,
    /// Role came from the field name rather than the model.
    pub inferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayVerdict {
    /// Bound to an expiry that a `notExpired` check compares to the block clock.
    Expires { field: ValueRef },
    /// A nonce or marker that a later write consumes.
    Consumed { field: ValueRef, write: usize },
    /// Nonce or marker present, but nothing consumes it.
    Unconsumed { field: ValueRef },
    /// Nothing in the message distinguishes one request from the next.
    MissingField,
}

impl fmt::Display for ReplayVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expires { field } => write!(f, "bound to expiry '{}'", field),
            Self::Consumed { field, write } => {
                write!(f, "'{}' consumed by operation {}", field, write)
            }
            Self::Unconsumed { field } => write!(
                f,
                "'{}' is signed but never consumed by a state write",
                field
            ),
            Self::MissingField => write!(
                f,
                "signed message has no nonce, consumed-once marker or expiry"
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayAssessment {
    pub check_index: usize,
    pub fields: Vec<ReplayField>,
    pub verdict: ReplayVerdict,
    /// Some operand of the check can be chosen by the caller.
    pub caller_controlled: bool,
}

impl ReplayAssessment {
    pub fn is_protected(&self) -> bool {
        matches!(
            self.verdict,
            ReplayVerdict::Expires { .. } | ReplayVerdict::Consumed { .. }
        )
    }

    pub fn is_replayable(&self) -> bool {
        self.caller_controlled && !self.is_protected()
    }

    pub fn replay_fields(&self) -> impl Iterator<Item = &ReplayField> {
        self.fields.iter().filter(|f| f.role != FieldRole::Payload)
    }
}

/// Assessments for every signature check of a contract.
#[derive(Debug, Clone, Default)]
pub struct ContractReplay {
    by_function: BTreeMap<String, BTreeMap<usize, ReplayAssessment>>,
}

impl ContractReplay {
    pub fn get(&self, signature: &str, index: usize) -> Option<&ReplayAssessment> {
        self.by_function.get(signature)?.get(&index)
    }

    pub fn len(&self) -> usize {
        self.by_function.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct SignatureAnalyzer;

impl SignatureAnalyzer {
    pub fn assess_contract(model: &ContractModel, tainted: &TaintedModel) -> ContractReplay {
        let by_function = model
            .functions()
            .filter_map(|(signature, function)| {
                let taint = tainted.function(signature)?;
                let checks = Self::assess_function(function, taint);
                (!checks.is_empty()).then(|| (signature.clone(), checks))
            })
            .collect();
        ContractReplay { by_function }
    }

    /// Every signature check of `function`, keyed by operation index.
    pub fn assess_function(
        function: &FunctionModel,
        taint: &FunctionTaint,
    ) -> BTreeMap<usize, ReplayAssessment> {
        function
            .operations
            .iter()
            .enumerate()
            .filter_map(|(index, _)| Self::assess(function, taint, index))
            .map(|assessment| (assessment.check_index, assessment))
            .collect()
    }

    pub fn assess(
        function: &FunctionModel,
        taint: &FunctionTaint,
        index: usize,
    ) -> Option<ReplayAssessment> {
        let Some(Operation::SignatureCheck { message, .. }) = function.operation(index) else {
            return None;
        };

        let fields: Vec<ReplayField> = message.iter().map(Self::classify).collect();
        let verdict = Self::verdict(function, &fields);
        let caller_controlled = taint
            .step(index)
            .map(|step| {
                step.operand_labels
                    .iter()
                    .any(|(_, label)| label.is_caller_controlled())
            })
            .unwrap_or(false);

        debug!(
            function = %function.name,
            index,
            verdict = %verdict,
            caller_controlled,
            "assessed signature check"
        );

        Some(ReplayAssessment {
            check_index: index,
            fields,
            verdict,
            caller_controlled,
        })
    }

    pub fn classify(field: &MessageField) -> ReplayField {
        match field.role {
            Some(role) => ReplayField {
                value: field.value.clone(),
                role,
                inferred: false,
            },
            None => ReplayField {
                value: field.value.clone(),
                role: infer_role(&field.value),
                inferred: true,
            },
        }
    }

    fn verdict(function: &FunctionModel, fields: &[ReplayField]) -> ReplayVerdict {
        if let Some(expiry) = fields
            .iter()
            .find(|f| f.role == FieldRole::Expiry && expiry_enforced(function, &f.value))
        {
            return ReplayVerdict::Expires {
                field: expiry.value.clone(),
            };
        }

        let consumable: Vec<&ReplayField> = fields
            .iter()
            .filter(|f| matches!(f.role, FieldRole::Nonce | FieldRole::ConsumedMarker))
            .collect();

        for field in &consumable {
            if let Some(write) = consumption(function, field) {
                return ReplayVerdict::Consumed {
                    field: field.value.clone(),
                    write,
                };
            }
        }

        match consumable.first() {
            Some(field) => ReplayVerdict::Unconsumed {
                field: field.value.clone(),
            },
            None => ReplayVerdict::MissingField,
        }
    }
}

fn infer_role(value: &ValueRef) -> FieldRole {
    let name = match value {
        ValueRef::Param(name) => name.as_str(),
        ValueRef::State { slot, .. } => slot.as_str(),
        _ => return FieldRole::Payload,
    };
    let name = name.to_ascii_lowercase();

    if name.starts_with("nonce") || name.ends_with("nonce") {
        FieldRole::Nonce
    } else if ["deadline", "expiry", "expiration", "expires", "validuntil"]
        .iter()
        .any(|k| name.contains(k))
    {
        FieldRole::Expiry
    } else if ["used", "executed", "claimed", "consumed"]
        .iter()
        .any(|k| name.starts_with(k))
    {
        FieldRole::ConsumedMarker
    } else {
        FieldRole::Payload
    }
}

/// A signed expiry only protects when the function compares it to the block clock.
fn expiry_enforced(function: &FunctionModel, field: &ValueRef) -> bool {
    function.operations.iter().any(|operation| {
        matches!(
            operation,
            Operation::Require {
                check: CheckKind::NotExpired,
                left,
                ..
            } if left == field
        )
    })
}

/// Storage slots a field is tied to: its own slot, or slots it was checked equal to.
fn bound_slots(function: &FunctionModel, field: &ValueRef) -> BTreeSet<ValueRef> {
    let mut slots: BTreeSet<ValueRef> = field.slot_root().into_iter().collect();
    for operation in &function.operations {
        if let Operation::Require {
            check: CheckKind::Eq,
            left,
            right: Some(right),
        } = operation
        {
            let other = if left == field {
                right
            } else if right == field {
                left
            } else {
                continue;
            };
            slots.extend(other.slot_root());
        }
    }
    slots
}

/// Index of the first state write that uses up `field`.
fn consumption(function: &FunctionModel, field: &ReplayField) -> Option<usize> {
    let bound = bound_slots(function, &field.value);

    function
        .operations
        .iter()
        .enumerate()
        .find_map(|(index, operation)| {
            let Operation::StateWrite { slot, effect, .. } = operation else {
                return None;
            };
            let keyed = slot != &field.value && slot.mentions(&field.value);
            let on_bound_slot = slot.slot_root().is_some_and(|root| bound.contains(&root));

            let consumes = match effect {
                WriteEffect::Consume | WriteEffect::Increment => keyed || on_bound_slot,
                WriteEffect::Set => {
                    keyed || (on_bound_slot && field.role == FieldRole::ConsumedMarker)
                }
                WriteEffect::Decrement | WriteEffect::Delete => false,
            };
            consumes.then_some(index)
        })
}
