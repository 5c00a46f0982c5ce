//! Forward taint propagation over a function's operation sequence.
//!
//! Seeds come from the function signature: caller-supplied parameters start
//! `CallerControlled`, everything the contract or the chain supplies starts
//! `Trusted`, and the caller's own identity is `Trusted` but observable. Each
//! operation's output is the least trusted of its inputs, with two exceptions:
//!
//! * `Require { eq }` against a trusted value collapses the other side to `Trusted`
//!   for every later operation;
//! * the output of an external call whose target the caller picks is re-seeded
//!   `CallerControlled`, whatever was sanitized before, since such a target can
//!   return anything.

use super::context::{Constraint, FactSource, TaintContext, TaintFact};
use super::label::TaintLabel;
use crate::model::{
    Builtin, CheckKind, ContractModel, FunctionModel, Operation, OperationKind, ValueRef,
    WriteEffect,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct TrackedOperation {
    pub index: usize,
    pub kind: OperationKind,
    /// State the operation was evaluated in.
    pub before: TaintContext,
    pub operand_labels: Vec<(ValueRef, TaintLabel)>,
    pub output: TaintLabel,
}

#[derive(Debug, Clone)]
pub struct FunctionTaint {
    pub signature: String,
    pub entry: TaintContext,
    pub steps: Vec<TrackedOperation>,
    pub exit: TaintContext,
}

impl FunctionTaint {
    pub fn step(&self, index: usize) -> Option<&TrackedOperation> {
        self.steps.get(index)
    }

    pub fn before(&self, index: usize) -> Option<&TaintContext> {
        self.steps.get(index).map(|s| &s.before)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaintedModel {
    functions: BTreeMap<String, FunctionTaint>,
}

impl TaintedModel {
    pub fn function(&self, signature: &str) -> Option<&FunctionTaint> {
        self.functions.get(signature)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionTaint> {
        self.functions.values()
    }
}

/// True when the call target is picked by the caller and not held to an allow-list.
pub fn call_target_unconstrained(operation: &Operation, ctx: &TaintContext) -> bool {
    let Operation::ExternalCall {
        target,
        target_is_caller_controlled,
        ..
    } = operation
    else {
        return false;
    };
    let fact = ctx.fact(target);
    let caller_controlled = target_is_caller_controlled.unwrap_or(fact.label.is_caller_controlled());
    caller_controlled && !fact.is_allow_listed()
}

pub struct TaintTracker;

impl TaintTracker {
    pub fn track(model: &ContractModel) -> TaintedModel {
        let functions = model
            .functions()
            .map(|(signature, function)| (signature.clone(), Self::track_function(function)))
            .collect();
        TaintedModel { functions }
    }

    pub fn track_function(function: &FunctionModel) -> FunctionTaint {
        let entry = Self::seed(function);
        let mut current = entry.clone();
        let mut steps = Vec::with_capacity(function.operations.len());

        for (index, operation) in function.operations.iter().enumerate() {
            let (next, tracked) = Self::step(&current, index, operation);
            trace!(
                function = %function.name,
                index,
                kind = %tracked.kind,
                output = %tracked.output,
                "propagated taint"
            );
            steps.push(tracked);
            current = next;
        }

        debug!(
            function = %function.name,
            operations = steps.len(),
            events = current.trail().len(),
            "tracked function"
        );

        FunctionTaint {
            signature: function.signature(),
            entry,
            steps,
            exit: current,
        }
    }

    pub fn seed(function: &FunctionModel) -> TaintContext {
        let mut ctx = TaintContext::new();
        for param in &function.parameters {
            let fact = if param.caller_supplied {
                TaintFact::seeded(TaintLabel::CallerControlled, FactSource::CallerSupplied)
            } else {
                TaintFact::seeded(TaintLabel::Trusted, FactSource::ContractSupplied)
            };
            ctx = ctx.derive(ValueRef::Param(param.name.clone()), fact, None);
        }
        for builtin in [Builtin::MsgSender, Builtin::TxOrigin, Builtin::MsgValue] {
            let value = ValueRef::Builtin(builtin);
            let fact = ctx.fact(&value);
            ctx = ctx.derive(value, fact, None);
        }
        ctx
    }

    /// One propagation step. Returns the context for the next operation.
    pub fn step(
        ctx: &TaintContext,
        index: usize,
        operation: &Operation,
    ) -> (TaintContext, TrackedOperation) {
        let operands = operation.operands();
        let operand_labels: Vec<(ValueRef, TaintLabel)> = operands
            .iter()
            .map(|value| ((*value).clone(), ctx.label(value)))
            .collect();

        let (next, output) = match operation {
            Operation::ExternalCall { .. } => {
                if call_target_unconstrained(operation, ctx) {
                    let fact = TaintFact::seeded(
                        TaintLabel::CallerControlled,
                        FactSource::Reseeded { operation: index },
                    )
                    .with_origin(index);
                    (
                        ctx.derive(ValueRef::Result(index), fact, Some(index)),
                        TaintLabel::CallerControlled,
                    )
                } else {
                    Self::derive_output(ctx, index, &operands)
                }
            }
            Operation::TokenTransfer { .. }
            | Operation::ApprovalGrant { .. }
            | Operation::SignatureCheck { .. }
            | Operation::ContractCreation { .. } => Self::derive_output(ctx, index, &operands),
            Operation::StateWrite {
                slot,
                value,
                effect,
                ..
            } => {
                let label = match (effect, value) {
                    (WriteEffect::Delete, _) => TaintLabel::Trusted,
                    (WriteEffect::Set, Some(value)) => ctx.label(value),
                    (_, Some(value)) => ctx.label(value).least_trusted(ctx.label(slot)),
                    (_, None) => ctx.label(slot),
                };
                let mut fact = TaintFact::seeded(label, FactSource::Written { operation: index })
                    .with_origin(index);
                if let Some(value) = value {
                    fact.origins.extend(ctx.fact(value).origins);
                }
                (ctx.derive(slot.clone(), fact, Some(index)), label)
            }
            Operation::Require { check, left, right } => {
                (Self::apply_check(ctx, index, *check, left, right.as_ref()), TaintLabel::Trusted)
            }
        };

        let tracked = TrackedOperation {
            index,
            kind: operation.kind(),
            before: ctx.clone(),
            operand_labels,
            output,
        };
        (next, tracked)
    }

    fn derive_output(
        ctx: &TaintContext,
        index: usize,
        operands: &[&ValueRef],
    ) -> (TaintContext, TaintLabel) {
        let label = TaintLabel::join_all(operands.iter().map(|v| ctx.label(v)));
        let mut origins: BTreeSet<usize> = operands
            .iter()
            .flat_map(|v| ctx.fact(v).origins)
            .collect();
        origins.insert(index);

        let mut fact = TaintFact::seeded(label, FactSource::Output { operation: index });
        fact.origins = origins;
        (ctx.derive(ValueRef::Result(index), fact, Some(index)), label)
    }

    fn apply_check(
        ctx: &TaintContext,
        index: usize,
        check: CheckKind,
        left: &ValueRef,
        right: Option<&ValueRef>,
    ) -> TaintContext {
        match (check, right) {
            (CheckKind::Eq, Some(right)) => {
                let left_fact = ctx.fact(left);
                let right_fact = ctx.fact(right);
                if right_fact.label.is_trusted() && !left_fact.label.is_trusted() {
                    Self::sanitize(ctx, index, left, left_fact, right)
                } else if left_fact.label.is_trusted() && !right_fact.label.is_trusted() {
                    Self::sanitize(ctx, index, right, right_fact, left)
                } else {
                    ctx.clone()
                }
            }
            (CheckKind::Neq, Some(right)) => {
                let left_fact = ctx
                    .fact(left)
                    .with_constraint(Constraint::DistinctFrom(right.clone()))
                    .with_origin(index);
                let right_fact = ctx
                    .fact(right)
                    .with_constraint(Constraint::DistinctFrom(left.clone()))
                    .with_origin(index);
                ctx.derive(left.clone(), left_fact, Some(index))
                    .derive(right.clone(), right_fact, Some(index))
            }
            (CheckKind::AllowList, _) => {
                let fact = ctx
                    .fact(left)
                    .with_constraint(Constraint::AllowListed)
                    .with_origin(index);
                ctx.derive(left.clone(), fact, Some(index))
            }
            (CheckKind::NonZero, _) => {
                let fact = ctx
                    .fact(left)
                    .with_constraint(Constraint::NonZero)
                    .with_origin(index);
                ctx.derive(left.clone(), fact, Some(index))
            }
            (CheckKind::NotExpired, _) => {
                let fact = ctx
                    .fact(left)
                    .with_constraint(Constraint::NotExpired)
                    .with_origin(index);
                ctx.derive(left.clone(), fact, Some(index))
            }
            (CheckKind::Eq | CheckKind::Neq, None) => ctx.clone(),
        }
    }

    fn sanitize(
        ctx: &TaintContext,
        index: usize,
        value: &ValueRef,
        previous: TaintFact,
        trusted: &ValueRef,
    ) -> TaintContext {
        let mut fact = previous
            .with_constraint(Constraint::EqualsTrusted(trusted.clone()))
            .with_origin(index);
        fact.label = TaintLabel::Trusted;
        fact.source = FactSource::Sanitized { operation: index };
        ctx.derive(value.clone(), fact, Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentFormat, ModelLoader};

    fn track(json: &str, signature: &str) -> FunctionTaint {
        let model = ModelLoader::new(100).load_str(json, DocumentFormat::Json).unwrap();
        TaintTracker::track_function(model.function(signature).unwrap())
    }

    #[test]
    fn test_caller_supplied_parameter_reaches_sink() {
        let taint = track(
            r#"{
            "contractName": "Bridge",
            "state": [{"name": "vault"}],
            "functions": [{
                "name": "deposit",
                "parameters": [
                    {"name": "from", "type": "address", "callerSupplied": true},
                    {"name": "amount", "type": "uint256"}
                ],
                "operations": [{"kind": "tokenTransfer", "operands": ["from", "vault", "amount"]}]
            }]
        }"#,
            "deposit(address,uint256)",
        );

        let step = taint.step(0).unwrap();
        assert_eq!(step.operand_labels[0].1, TaintLabel::CallerControlled);
        assert_eq!(step.operand_labels[1].1, TaintLabel::Trusted);
        assert_eq!(step.operand_labels[2].1, TaintLabel::Trusted);
        assert_eq!(step.output, TaintLabel::CallerControlled);
    }

    #[test]
    fn test_equality_with_sender_sanitizes_downstream_only() {
        let taint = track(
            r#"{
            "contractName": "Bridge",
            "state": [{"name": "vault"}],
            "functions": [{
                "name": "deposit",
                "parameters": [{"name": "from", "type": "address", "callerSupplied": true}],
                "operations": [
                    {"kind": "require", "check": "eq", "operands": ["from", "msg.sender"]},
                    {"kind": "tokenTransfer", "operands": ["from", "vault", "1"]}
                ]
            }]
        }"#,
            "deposit(address)",
        );

        let from = ValueRef::Param("from".to_string());
        assert_eq!(taint.before(0).unwrap().label(&from), TaintLabel::CallerControlled);
        let after = taint.before(1).unwrap().fact(&from);
        assert_eq!(after.label, TaintLabel::Trusted);
        assert!(after.equals_trusted());
        assert_eq!(after.source, FactSource::Sanitized { operation: 0 });
        // the audit trail keeps the original label
        assert_eq!(
            taint.exit.history(&from).next().map(|e| e.label),
            Some(TaintLabel::CallerControlled)
        );
    }

    #[test]
    fn test_arbitrary_call_result_is_reseeded() {
        let taint = track(
            r#"{
            "contractName": "Router",
            "functions": [{
                "name": "execute",
                "parameters": [
                    {"name": "target", "type": "address", "callerSupplied": true},
                    {"name": "data", "type": "bytes"}
                ],
                "operations": [
                    {"kind": "externalCall", "operands": ["target", "data"]},
                    {"kind": "approvalGrant", "operands": ["msg.sender", "@0"]}
                ]
            }]
        }"#,
            "execute(address,bytes)",
        );

        let result = taint.before(1).unwrap().fact(&ValueRef::Result(0));
        assert_eq!(result.label, TaintLabel::CallerControlled);
        assert_eq!(result.source, FactSource::Reseeded { operation: 0 });
    }

    #[test]
    fn test_reseeding_overrides_sanitized_inputs() {
        let taint = track(
            r#"{
            "contractName": "Router",
            "state": [{"name": "router"}, {"name": "balances"}],
            "functions": [{
                "name": "swap",
                "parameters": [{"name": "amount", "type": "uint256", "callerSupplied": true}],
                "operations": [
                    {"kind": "require", "check": "eq", "operands": ["amount", "balances[msg.sender]"]},
                    {"kind": "externalCall", "operands": ["router", "amount"], "targetIsCallerControlled": true},
                    {"kind": "approvalGrant", "operands": ["@1", "amount"]}
                ]
            }]
        }"#,
            "swap(uint256)",
        );

        let amount = ValueRef::Param("amount".to_string());
        let before_call = taint.before(1).unwrap();
        assert_eq!(before_call.label(&amount), TaintLabel::Trusted);
        assert_eq!(before_call.label(&ValueRef::state("router")), TaintLabel::Trusted);

        let result = taint.before(2).unwrap().fact(&ValueRef::Result(1));
        assert_eq!(result.label, TaintLabel::CallerControlled);
        assert_eq!(result.source, FactSource::Reseeded { operation: 1 });
        assert_eq!(taint.step(1).unwrap().output, TaintLabel::CallerControlled);
    }

    #[test]
    fn test_allow_listed_target_is_not_reseeded() {
        let taint = track(
            r#"{
            "contractName": "Router",
            "functions": [{
                "name": "execute",
                "parameters": [{"name": "target", "type": "address", "callerSupplied": true}],
                "operations": [
                    {"kind": "require", "check": "allowList", "operands": ["target"]},
                    {"kind": "externalCall", "operands": ["target"]}
                ]
            }]
        }"#,
            "execute(address)",
        );

        let target = taint.before(1).unwrap().fact(&ValueRef::Param("target".to_string()));
        assert!(target.is_allow_listed());
        assert_eq!(target.label, TaintLabel::CallerControlled);
        assert_eq!(taint.step(1).unwrap().output, TaintLabel::CallerControlled);
        assert_eq!(
            taint.exit.fact(&ValueRef::Result(1)).source,
            FactSource::Output { operation: 1 }
        );
    }

    #[test]
    fn test_state_write_carries_value_taint() {
        let taint = track(
            r#"{
            "contractName": "Registry",
            "state": [{"name": "implementation"}],
            "functions": [{
                "name": "set",
                "parameters": [{"name": "impl", "type": "address", "callerSupplied": true}],
                "operations": [
                    {"kind": "stateWrite", "operands": ["implementation", "impl"]},
                    {"kind": "externalCall", "operands": ["implementation"]}
                ]
            }]
        }"#,
            "set(address)",
        );

        let step = taint.step(1).unwrap();
        assert_eq!(step.operand_labels[0].1, TaintLabel::CallerControlled);
        assert!(step.before.fact(&ValueRef::state("implementation")).origins.contains(&0));
    }

    #[test]
    fn test_msg_value_is_caller_chosen() {
        let taint = track(
            r#"{
            "contractName": "Raffle",
            "state": [{"name": "deposits"}, {"name": "entranceFee"}],
            "functions": [{
                "name": "enter",
                "mutability": "payable",
                "operations": [
                    {"kind": "stateWrite", "operands": ["deposits[msg.sender]", "msg.value"]},
                    {"kind": "require", "check": "eq", "operands": ["msg.value", "entranceFee"]},
                    {"kind": "stateWrite", "operands": ["deposits[msg.sender]", "msg.value"]}
                ]
            }]
        }"#,
            "enter()",
        );

        let msg_value = ValueRef::Builtin(Builtin::MsgValue);
        assert_eq!(taint.before(0).unwrap().label(&msg_value), TaintLabel::CallerControlled);
        assert_eq!(taint.step(0).unwrap().output, TaintLabel::CallerControlled);
        assert_eq!(taint.step(2).unwrap().operand_labels[1].1, TaintLabel::Trusted);
    }
}
