//! Wire format for contract descriptions.
//!
//! These types mirror the input document one to one and carry operands as raw
//! strings. The loader resolves and validates them into [`ContractModel`](super::ContractModel).

use super::types::{
    CheckKind, FieldRole, Mutability, OperationKind, ReturnDataHandling, Visibility, WriteEffect,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDocument {
    pub contract_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state: Vec<StateDecl>,

    pub functions: Vec<FunctionDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDecl {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,

    #[serde(default)]
    pub privileged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDecl {
    pub name: String,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default)]
    pub mutability: Mutability,

    #[serde(default)]
    pub parameters: Vec<ParameterDecl>,

    #[serde(default)]
    pub modifiers: Vec<String>,

    #[serde(default)]
    pub operations: Vec<OperationDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDecl {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: String,

    #[serde(default)]
    pub caller_supplied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDecl {
    pub kind: OperationKind,

    #[serde(default)]
    pub operands: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_is_caller_controlled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_data: Option<ReturnDataHandling>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moves: Option<MovesDecl>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<WriteEffect>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceiling: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Vec<MessageFieldDecl>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_level: Option<bool>,
}

impl OperationDecl {
    /// Names of the kind-specific fields present on this declaration.
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.target_is_caller_controlled.is_some() {
            fields.push("targetIsCallerControlled");
        }
        if self.gas_limit.is_some() {
            fields.push("gasLimit");
        }
        if self.return_data.is_some() {
            fields.push("returnData");
        }
        if self.moves.is_some() {
            fields.push("moves");
        }
        if self.effect.is_some() {
            fields.push("effect");
        }
        if self.ceiling.is_some() {
            fields.push("ceiling");
        }
        if self.message.is_some() {
            fields.push("message");
        }
        if self.check.is_some() {
            fields.push("check");
        }
        if self.low_level.is_some() {
            fields.push("lowLevel");
        }
        fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovesDecl {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFieldDecl {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<FieldRole>,
}

/// Kind-specific fields each operation kind accepts.
pub fn allowed_fields(kind: OperationKind) -> &'static [&'static str] {
    match kind {
        OperationKind::ExternalCall => &["targetIsCallerControlled", "gasLimit", "returnData", "moves"],
        OperationKind::StateWrite => &["effect", "ceiling"],
        OperationKind::SignatureCheck => &["message"],
        OperationKind::Require => &["check"],
        OperationKind::ContractCreation => &["lowLevel"],
        OperationKind::TokenTransfer | OperationKind::ApprovalGrant => &[],
    }
}
