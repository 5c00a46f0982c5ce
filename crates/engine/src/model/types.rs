use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    External,
    Internal,
    Private,
}

impl Visibility {
    pub fn is_externally_callable(&self) -> bool {
        matches!(self, Self::Public | Self::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    #[default]
    NonPayable,
    Payable,
    View,
    Pure,
}

impl Mutability {
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Self::NonPayable | Self::Payable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: String,
    pub caller_supplied: bool,
}

/// Transaction and block context values every function can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Builtin {
    MsgSender,
    TxOrigin,
    MsgValue,
    This,
    BlockTimestamp,
    BlockNumber,
}

impl Builtin {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "msg.sender" | "_msgSender()" => Some(Self::MsgSender),
            "tx.origin" => Some(Self::TxOrigin),
            "msg.value" => Some(Self::MsgValue),
            "this" | "address(this)" => Some(Self::This),
            "block.timestamp" | "now" => Some(Self::BlockTimestamp),
            "block.number" => Some(Self::BlockNumber),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MsgSender => "msg.sender",
            Self::TxOrigin => "tx.origin",
            Self::MsgValue => "msg.value",
            Self::This => "address(this)",
            Self::BlockTimestamp => "block.timestamp",
            Self::BlockNumber => "block.number",
        }
    }

    /// The caller can read these values but cannot pick them freely.
    pub fn is_caller_observable(&self) -> bool {
        !matches!(self, Self::This | Self::MsgValue)
    }

    /// The caller sets these directly with the transaction.
    pub fn is_caller_chosen(&self) -> bool {
        matches!(self, Self::MsgValue)
    }
}

/// A resolved operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueRef {
    Param(String),
    Builtin(Builtin),
    State { slot: String, keys: Vec<ValueRef> },
    Literal(String),
    /// Output of an earlier operation in the same function.
    Result(usize),
}

impl ValueRef {
    pub fn state(slot: impl Into<String>) -> Self {
        Self::State {
            slot: slot.into(),
            keys: Vec::new(),
        }
    }

    pub fn state_slot(&self) -> Option<&str> {
        match self {
            Self::State { slot, .. } => Some(slot),
            _ => None,
        }
    }

    /// The unkeyed slot this value lives in, if it is storage.
    pub fn slot_root(&self) -> Option<ValueRef> {
        self.state_slot().map(ValueRef::state)
    }

    /// True when `other` appears as this value or as one of its storage keys.
    pub fn mentions(&self, other: &ValueRef) -> bool {
        if self == other {
            return true;
        }
        match self {
            Self::State { keys, .. } => keys.iter().any(|k| k.mentions(other)),
            _ => false,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(name) => write!(f, "{}", name),
            Self::Builtin(b) => write!(f, "{}", b.as_str()),
            Self::State { slot, keys } => {
                write!(f, "{}", slot)?;
                for key in keys {
                    write!(f, "[{}]", key)?;
                }
                Ok(())
            }
            Self::Literal(text) => write!(f, "{}", text),
            Self::Result(index) => write!(f, "@{}", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    ExternalCall,
    TokenTransfer,
    StateWrite,
    SignatureCheck,
    ApprovalGrant,
    Require,
    ContractCreation,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExternalCall => "ExternalCall",
            Self::TokenTransfer => "TokenTransfer",
            Self::StateWrite => "StateWrite",
            Self::SignatureCheck => "SignatureCheck",
            Self::ApprovalGrant => "ApprovalGrant",
            Self::Require => "Require",
            Self::ContractCreation => "ContractCreation",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnDataHandling {
    #[default]
    Copied,
    Capped,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteEffect {
    #[default]
    Set,
    Increment,
    Decrement,
    Consume,
    Delete,
}

impl WriteEffect {
    /// Effects that hand a bounded resource back.
    pub fn releases(&self) -> bool {
        matches!(self, Self::Decrement | Self::Consume | Self::Delete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckKind {
    Eq,
    Neq,
    AllowList,
    NonZero,
    /// `value >= block.timestamp` (or `block.number`).
    NotExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldRole {
    Payload,
    Nonce,
    Expiry,
    ConsumedMarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageField {
    pub value: ValueRef,
    pub role: Option<FieldRole>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFlow {
    pub from: ValueRef,
    pub to: ValueRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ExternalCall {
        target: ValueRef,
        args: Vec<ValueRef>,
        /// Explicit override from the model; `None` defers to taint.
        target_is_caller_controlled: Option<bool>,
        gas_limit: Option<u64>,
        return_data: ReturnDataHandling,
        moves: Option<AssetFlow>,
    },
    TokenTransfer {
        from: ValueRef,
        to: ValueRef,
        amount: ValueRef,
        /// `false` for `transfer(to, amount)` where the contract itself pays.
        explicit_source: bool,
    },
    StateWrite {
        slot: ValueRef,
        value: Option<ValueRef>,
        effect: WriteEffect,
        ceiling: Option<ValueRef>,
    },
    SignatureCheck {
        signer: ValueRef,
        signature: ValueRef,
        message: Vec<MessageField>,
    },
    ApprovalGrant {
        spender: ValueRef,
        amount: ValueRef,
    },
    Require {
        check: CheckKind,
        left: ValueRef,
        right: Option<ValueRef>,
    },
    ContractCreation {
        init_code: Vec<ValueRef>,
        low_level: bool,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::ExternalCall { .. } => OperationKind::ExternalCall,
            Self::TokenTransfer { .. } => OperationKind::TokenTransfer,
            Self::StateWrite { .. } => OperationKind::StateWrite,
            Self::SignatureCheck { .. } => OperationKind::SignatureCheck,
            Self::ApprovalGrant { .. } => OperationKind::ApprovalGrant,
            Self::Require { .. } => OperationKind::Require,
            Self::ContractCreation { .. } => OperationKind::ContractCreation,
        }
    }

    /// Every value the operation reads, in declaration order.
    pub fn operands(&self) -> Vec<&ValueRef> {
        match self {
            Self::ExternalCall {
                target, args, moves, ..
            } => {
                let mut out = vec![target];
                out.extend(args.iter());
                if let Some(flow) = moves {
                    out.push(&flow.from);
                    out.push(&flow.to);
                }
                out
            }
            Self::TokenTransfer {
                from, to, amount, ..
            } => vec![from, to, amount],
            Self::StateWrite {
                slot,
                value,
                ceiling,
                ..
            } => {
                let mut out = vec![slot];
                out.extend(value.iter());
                out.extend(ceiling.iter());
                out
            }
            Self::SignatureCheck {
                signer,
                signature,
                message,
            } => {
                let mut out = vec![signer, signature];
                out.extend(message.iter().map(|field| &field.value));
                out
            }
            Self::ApprovalGrant { spender, amount } => vec![spender, amount],
            Self::Require { left, right, .. } => {
                let mut out = vec![left];
                out.extend(right.iter());
                out
            }
            Self::ContractCreation { init_code, .. } => init_code.iter().collect(),
        }
    }

    /// Source and destination of an asset movement, when the operation moves value.
    pub fn value_flow(&self) -> Option<(&ValueRef, &ValueRef)> {
        match self {
            Self::TokenTransfer { from, to, .. } => Some((from, to)),
            Self::ExternalCall {
                moves: Some(flow), ..
            } => Some((&flow.from, &flow.to)),
            _ => None,
        }
    }

    pub fn is_sink(&self) -> bool {
        matches!(
            self.kind(),
            OperationKind::TokenTransfer | OperationKind::ExternalCall | OperationKind::ApprovalGrant
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVariable {
    pub name: String,
    pub ty: Option<String>,
    /// Holds pooled assets (a vault, a treasury) that other accounts rely on.
    pub privileged: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionModel {
    pub name: String,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub parameters: Vec<Parameter>,
    pub operations: Vec<Operation>,
    pub modifiers: Vec<String>,
}

impl FunctionModel {
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.parameters.iter().map(|p| p.ty.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn operation(&self, index: usize) -> Option<&Operation> {
        self.operations.get(index)
    }
}

/// `onlyRole(ADMIN)` and `onlyRole` name the same guard.
pub fn modifier_base(modifier: &str) -> &str {
    modifier
        .split_once('(')
        .map(|(base, _)| base)
        .unwrap_or(modifier)
        .trim()
}

/// A loaded contract. Built once by the loader and only read afterwards.
#[derive(Debug, Clone)]
pub struct ContractModel {
    name: String,
    state: Vec<StateVariable>,
    functions: BTreeMap<String, FunctionModel>,
}

impl ContractModel {
    pub(crate) fn new(
        name: String,
        state: Vec<StateVariable>,
        functions: BTreeMap<String, FunctionModel>,
    ) -> Self {
        Self {
            name,
            state,
            functions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &[StateVariable] {
        &self.state
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state.iter().find(|s| s.name == name)
    }

    /// Functions keyed by signature, in signature order.
    pub fn functions(&self) -> impl Iterator<Item = (&String, &FunctionModel)> {
        self.functions.iter()
    }

    pub fn function(&self, signature: &str) -> Option<&FunctionModel> {
        self.functions.get(signature)
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn operation_count(&self) -> usize {
        self.functions.values().map(|f| f.operations.len()).sum()
    }

    /// A state slot declared privileged. The contract's own address is not one: pulling
    /// tokens into `address(this)` is the normal deposit shape.
    pub fn is_privileged_account(&self, value: &ValueRef) -> bool {
        match value {
            ValueRef::State { slot, keys } if keys.is_empty() => self
                .state_variable(slot)
                .map(|s| s.privileged)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Every state write in the contract, across all functions.
    pub fn state_writes(&self) -> impl Iterator<Item = (&FunctionModel, usize, &Operation)> {
        self.functions.values().flat_map(|function| {
            function
                .operations
                .iter()
                .enumerate()
                .filter(|(_, op)| op.kind() == OperationKind::StateWrite)
                .map(move |(index, op)| (function, index, op))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_ref_display_includes_keys() {
        let value = ValueRef::State {
            slot: "allowance".to_string(),
            keys: vec![
                ValueRef::Param("owner".to_string()),
                ValueRef::Builtin(Builtin::MsgSender),
            ],
        };
        assert_eq!(value.to_string(), "allowance[owner][msg.sender]");
        assert!(value.mentions(&ValueRef::Param("owner".to_string())));
        assert_eq!(value.slot_root(), Some(ValueRef::state("allowance")));
    }

    #[test]
    fn test_modifier_base_strips_arguments() {
        assert_eq!(modifier_base("onlyRole(MINTER_ROLE)"), "onlyRole");
        assert_eq!(modifier_base("onlyOwner"), "onlyOwner");
    }

    #[test]
    fn test_token_transfer_value_flow() {
        let op = Operation::TokenTransfer {
            from: ValueRef::Param("from".to_string()),
            to: ValueRef::state("vault"),
            amount: ValueRef::Param("amount".to_string()),
            explicit_source: true,
        };
        let (from, to) = op.value_flow().unwrap();
        assert_eq!(from, &ValueRef::Param("from".to_string()));
        assert_eq!(to, &ValueRef::state("vault"));
        assert!(op.is_sink());
    }
}
