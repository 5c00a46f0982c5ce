//! Immutable taint state threaded through a function's operations.
//!
//! A [`TaintContext`] is never updated in place. Each propagation step calls
//! [`TaintContext::derive`], which returns a new context holding the new fact and
//! appends the change to an audit trail; the previous context stays valid, so the
//! tracker can hand every operation the exact state it was evaluated in.

use super::label::TaintLabel;
use crate::model::{Builtin, ValueRef};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constraint {
    /// Checked equal to a trusted value.
    EqualsTrusted(ValueRef),
    /// Checked different from the given value.
    DistinctFrom(ValueRef),
    AllowListed,
    NonZero,
    /// Checked against the block clock.
    NotExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactSource {
    CallerSupplied,
    ContractSupplied,
    Builtin(Builtin),
    Storage,
    Literal,
    Output { operation: usize },
    Reseeded { operation: usize },
    Sanitized { operation: usize },
    Written { operation: usize },
    Unresolved,
}

impl fmt::Display for FactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallerSupplied => write!(f, "caller-supplied parameter"),
            Self::ContractSupplied => write!(f, "parameter not supplied by the caller"),
            Self::Builtin(b) => write!(f, "transaction context value {}", b.as_str()),
            Self::Storage => write!(f, "contract storage"),
            Self::Literal => write!(f, "literal"),
            Self::Output { operation } => write!(f, "output of operation {}", operation),
            Self::Reseeded { operation } => write!(
                f,
                "returned by a call to a caller-chosen target at operation {}",
                operation
            ),
            Self::Sanitized { operation } => {
                write!(f, "checked against a trusted value at operation {}", operation)
            }
            Self::Written { operation } => write!(f, "written at operation {}", operation),
            Self::Unresolved => write!(f, "unresolved value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaintFact {
    pub label: TaintLabel,
    /// The caller can read the value but not set it.
    pub caller_observable: bool,
    pub constraints: BTreeSet<Constraint>,
    /// Operations that shaped this value, in index order.
    pub origins: BTreeSet<usize>,
    pub source: FactSource,
}

impl TaintFact {
    pub fn seeded(label: TaintLabel, source: FactSource) -> Self {
        Self {
            label,
            caller_observable: false,
            constraints: BTreeSet::new(),
            origins: BTreeSet::new(),
            source,
        }
    }

    pub fn observable(mut self) -> Self {
        self.caller_observable = true;
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.insert(constraint);
        self
    }

    pub fn with_origin(mut self, operation: usize) -> Self {
        self.origins.insert(operation);
        self
    }

    pub fn is_allow_listed(&self) -> bool {
        self.constraints.contains(&Constraint::AllowListed)
    }

    pub fn is_non_zero(&self) -> bool {
        self.constraints.contains(&Constraint::NonZero)
    }

    pub fn is_distinct_from(&self, other: &ValueRef) -> bool {
        self.constraints
            .contains(&Constraint::DistinctFrom(other.clone()))
    }

    pub fn equals_trusted(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::EqualsTrusted(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaintEvent {
    pub operation: Option<usize>,
    pub value: ValueRef,
    pub previous: Option<TaintLabel>,
    pub label: TaintLabel,
    pub source: FactSource,
}

#[derive(Debug, Clone, Default)]
pub struct TaintContext {
    facts: BTreeMap<ValueRef, TaintFact>,
    trail: Vec<TaintEvent>,
}

impl TaintContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context in which `value` carries `fact`.
    pub fn derive(&self, value: ValueRef, fact: TaintFact, operation: Option<usize>) -> Self {
        let mut next = self.clone();
        let previous = next.facts.get(&value).map(|f| f.label);
        next.trail.push(TaintEvent {
            operation,
            value: value.clone(),
            previous,
            label: fact.label,
            source: fact.source.clone(),
        });
        next.facts.insert(value, fact);
        next
    }

    pub fn get(&self, value: &ValueRef) -> Option<&TaintFact> {
        self.facts.get(value)
    }

    /// The fact for `value`, falling back to what an untouched value of that shape carries.
    pub fn fact(&self, value: &ValueRef) -> TaintFact {
        if let Some(fact) = self.facts.get(value) {
            return fact.clone();
        }
        match value {
            ValueRef::State { keys, .. } if !keys.is_empty() => self
                .facts
                .get(&ValueRef::state(value.state_slot().unwrap_or_default()))
                .cloned()
                .unwrap_or_else(|| TaintFact::seeded(TaintLabel::Trusted, FactSource::Storage)),
            ValueRef::State { .. } => TaintFact::seeded(TaintLabel::Trusted, FactSource::Storage),
            ValueRef::Literal(_) => TaintFact::seeded(TaintLabel::Trusted, FactSource::Literal),
            ValueRef::Builtin(b) if b.is_caller_chosen() => {
                TaintFact::seeded(TaintLabel::CallerControlled, FactSource::Builtin(*b))
            }
            ValueRef::Builtin(b) => {
                let fact = TaintFact::seeded(TaintLabel::Trusted, FactSource::Builtin(*b));
                if b.is_caller_observable() {
                    fact.observable()
                } else {
                    fact
                }
            }
            ValueRef::Param(_) | ValueRef::Result(_) => {
                TaintFact::seeded(TaintLabel::Unknown, FactSource::Unresolved)
            }
        }
    }

    pub fn label(&self, value: &ValueRef) -> TaintLabel {
        self.fact(value).label
    }

    pub fn trail(&self) -> &[TaintEvent] {
        &self.trail
    }

    /// Every recorded label change for `value`, oldest first.
    pub fn history<'a>(&'a self, value: &'a ValueRef) -> impl Iterator<Item = &'a TaintEvent> + 'a {
        self.trail.iter().filter(move |event| &event.value == value)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_leaves_original_untouched() {
        let from = ValueRef::Param("from".to_string());
        let base = TaintContext::new().derive(
            from.clone(),
            TaintFact::seeded(TaintLabel::CallerControlled, FactSource::CallerSupplied),
            None,
        );
        let sanitized = base.derive(
            from.clone(),
            TaintFact::seeded(TaintLabel::Trusted, FactSource::Sanitized { operation: 0 }),
            Some(0),
        );

        assert_eq!(base.label(&from), TaintLabel::CallerControlled);
        assert_eq!(sanitized.label(&from), TaintLabel::Trusted);

        let history: Vec<_> = sanitized.history(&from).collect();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].previous, Some(TaintLabel::CallerControlled));
    }

    #[test]
    fn test_fallbacks_by_value_shape() {
        let ctx = TaintContext::new();
        assert_eq!(ctx.label(&ValueRef::state("vault")), TaintLabel::Trusted);
        assert_eq!(ctx.label(&ValueRef::Literal("1".to_string())), TaintLabel::Trusted);
        assert_eq!(ctx.label(&ValueRef::Result(3)), TaintLabel::Unknown);
        assert!(ctx.fact(&ValueRef::Builtin(Builtin::MsgSender)).caller_observable);
        assert!(!ctx.fact(&ValueRef::Builtin(Builtin::This)).caller_observable);
        assert_eq!(
            ctx.label(&ValueRef::Builtin(Builtin::MsgValue)),
            TaintLabel::CallerControlled
        );
    }

    #[test]
    fn test_keyed_read_inherits_slot_fact() {
        let ctx = TaintContext::new().derive(
            ValueRef::state("target"),
            TaintFact::seeded(TaintLabel::CallerControlled, FactSource::Written { operation: 1 }),
            Some(1),
        );
        let keyed = ValueRef::State {
            slot: "target".to_string(),
            keys: vec![ValueRef::Literal("0".to_string())],
        };
        assert_eq!(ctx.label(&keyed), TaintLabel::CallerControlled);
    }
}
