//! Contract model loader.
//!
//! Turns a [`ContractDocument`] into an immutable [`ContractModel`]. Every operand
//! string is resolved against the function's parameters, the contract's declared
//! state, the transaction builtins and earlier operation results; anything that
//! does not resolve aborts the load with [`AnalysisError::MalformedModel`] naming
//! the offending document path. The operation ceiling is checked before any
//! resolution work so oversized inputs are rejected in constant time.

use super::schema::{allowed_fields, ContractDocument, FunctionDecl, OperationDecl};
use super::types::{
    AssetFlow, Builtin, CheckKind, ContractModel, FunctionModel, MessageField, Operation,
    OperationKind, Parameter, StateVariable, ValueRef, WriteEffect,
};
use crate::core::{AnalysisConfig, AnalysisError, AnalysisResult};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// JSON documents start with an object; everything else is read as YAML.
    pub fn sniff(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Yaml
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelLoader {
    max_operations: usize,
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl ModelLoader {
    pub fn new(max_operations: usize) -> Self {
        Self { max_operations }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.max_operations)
    }

    pub fn load_file(&self, path: &Path) -> AnalysisResult<ContractModel> {
        let text = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let format = DocumentFormat::from_path(path).unwrap_or_else(|| DocumentFormat::sniff(&text));
        self.load_str(&text, format)
    }

    pub fn load_str(&self, text: &str, format: DocumentFormat) -> AnalysisResult<ContractModel> {
        let document = parse_document(text, format)?;
        self.build(document)
    }

    pub fn build(&self, document: ContractDocument) -> AnalysisResult<ContractModel> {
        let size: usize = document.functions.iter().map(|f| f.operations.len()).sum();
        if size > self.max_operations {
            return Err(AnalysisError::ModelTooLarge {
                size,
                ceiling: self.max_operations,
            });
        }

        if document.contract_name.trim().is_empty() {
            return Err(AnalysisError::malformed("contractName", "must not be empty"));
        }

        let mut state = Vec::with_capacity(document.state.len());
        let mut state_names = HashSet::new();
        for (index, decl) in document.state.iter().enumerate() {
            let path = format!("state[{}].name", index);
            check_identifier(&decl.name, &path)?;
            if !state_names.insert(decl.name.clone()) {
                return Err(AnalysisError::malformed(
                    path,
                    format!("duplicate state variable '{}'", decl.name),
                ));
            }
            state.push(StateVariable {
                name: decl.name.clone(),
                ty: decl.ty.clone(),
                privileged: decl.privileged,
            });
        }

        let mut functions = BTreeMap::new();
        for (index, decl) in document.functions.iter().enumerate() {
            let function = build_function(index, decl, &state_names)?;
            let signature = function.signature();
            if functions.contains_key(&signature) {
                return Err(AnalysisError::malformed(
                    format!("functions[{}]", index),
                    format!("duplicate function signature '{}'", signature),
                ));
            }
            functions.insert(signature, function);
        }

        debug!(
            contract = %document.contract_name,
            functions = functions.len(),
            operations = size,
            "loaded contract model"
        );

        Ok(ContractModel::new(document.contract_name, state, functions))
    }
}

pub fn parse_document(text: &str, format: DocumentFormat) -> AnalysisResult<ContractDocument> {
    match format {
        DocumentFormat::Json => serde_json::from_str(text).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => AnalysisError::malformed(
                format!("line {}, column {}", e.line(), e.column()),
                e.to_string(),
            ),
            _ => AnalysisError::Parse(e.to_string()),
        }),
        DocumentFormat::Yaml => {
            // Well-formed YAML that does not fit the schema is a model error, as with JSON.
            serde_yaml::from_str::<serde_yaml::Value>(text)
                .map_err(|e| AnalysisError::Parse(e.to_string()))?;
            serde_yaml::from_str(text).map_err(|e| {
                let path = match e.location() {
                    Some(at) => format!("line {}, column {}", at.line(), at.column()),
                    None => "document".to_string(),
                };
                AnalysisError::malformed(path, e.to_string())
            })
        }
    }
}

fn check_identifier(name: &str, path: &str) -> AnalysisResult<()> {
    if name.trim().is_empty() {
        return Err(AnalysisError::malformed(path, "name must not be empty"));
    }
    if name.contains(['[', ']', '@', ' ']) {
        return Err(AnalysisError::malformed(
            path,
            format!("'{}' is not a valid identifier", name),
        ));
    }
    Ok(())
}

fn build_function(
    index: usize,
    decl: &FunctionDecl,
    state_names: &HashSet<String>,
) -> AnalysisResult<FunctionModel> {
    let base = format!("functions[{}]", index);
    check_identifier(&decl.name, &format!("{}.name", base))?;

    let mut parameters = Vec::with_capacity(decl.parameters.len());
    let mut seen = HashSet::new();
    for (p, param) in decl.parameters.iter().enumerate() {
        let path = format!("{}.parameters[{}]", base, p);
        check_identifier(&param.name, &format!("{}.name", path))?;
        if param.ty.trim().is_empty() {
            return Err(AnalysisError::malformed(
                format!("{}.type", path),
                "parameter type must not be empty",
            ));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(AnalysisError::malformed(
                path,
                format!("duplicate parameter '{}'", param.name),
            ));
        }
        parameters.push(Parameter {
            name: param.name.clone(),
            ty: param.ty.trim().to_string(),
            caller_supplied: param.caller_supplied,
        });
    }

    if decl.mutability.has_side_effects() && decl.operations.is_empty() {
        return Err(AnalysisError::malformed(
            format!("{}.operations", base),
            format!(
                "function '{}' is declared state-changing but has no operations",
                decl.name
            ),
        ));
    }

    let scope = Scope {
        params: &parameters,
        state: state_names,
    };
    let operations = decl
        .operations
        .iter()
        .enumerate()
        .map(|(o, op)| build_operation(op, o, &scope, &format!("{}.operations[{}]", base, o)))
        .collect::<AnalysisResult<Vec<_>>>()?;

    Ok(FunctionModel {
        name: decl.name.clone(),
        visibility: decl.visibility,
        mutability: decl.mutability,
        modifiers: decl.modifiers.iter().map(|m| m.trim().to_string()).collect(),
        parameters,
        operations,
    })
}

fn build_operation(
    decl: &OperationDecl,
    index: usize,
    scope: &Scope<'_>,
    path: &str,
) -> AnalysisResult<Operation> {
    let allowed = allowed_fields(decl.kind);
    if let Some(field) = decl.present_fields().into_iter().find(|f| !allowed.contains(f)) {
        return Err(AnalysisError::malformed(
            format!("{}.{}", path, field),
            format!("field is not valid on a {} operation", decl.kind),
        ));
    }

    let operands = decl
        .operands
        .iter()
        .enumerate()
        .map(|(i, text)| scope.resolve(text, index, &format!("{}.operands[{}]", path, i)))
        .collect::<AnalysisResult<Vec<_>>>()?;

    let arity = |expected: &str| {
        AnalysisError::malformed(
            format!("{}.operands", path),
            format!(
                "{} expects {}, got {} operand(s)",
                decl.kind,
                expected,
                operands.len()
            ),
        )
    };

    let operation = match decl.kind {
        OperationKind::TokenTransfer => match operands.as_slice() {
            [to, amount] => Operation::TokenTransfer {
                from: ValueRef::Builtin(Builtin::This),
                to: to.clone(),
                amount: amount.clone(),
                explicit_source: false,
            },
            [from, to, amount] => Operation::TokenTransfer {
                from: from.clone(),
                to: to.clone(),
                amount: amount.clone(),
                explicit_source: true,
            },
            _ => return Err(arity("[from, to, amount] or [to, amount]")),
        },
        OperationKind::ExternalCall => {
            let (target, args) = operands.split_first().ok_or_else(|| arity("[target, args...]"))?;
            let moves = match &decl.moves {
                Some(flow) => Some(AssetFlow {
                    from: scope.resolve(&flow.from, index, &format!("{}.moves.from", path))?,
                    to: scope.resolve(&flow.to, index, &format!("{}.moves.to", path))?,
                }),
                None => None,
            };
            Operation::ExternalCall {
                target: target.clone(),
                args: args.to_vec(),
                target_is_caller_controlled: decl.target_is_caller_controlled,
                gas_limit: decl.gas_limit,
                return_data: decl.return_data.unwrap_or_default(),
                moves,
            }
        }
        OperationKind::ApprovalGrant => match operands.as_slice() {
            [spender, amount] => Operation::ApprovalGrant {
                spender: spender.clone(),
                amount: amount.clone(),
            },
            _ => return Err(arity("[spender, amount]")),
        },
        OperationKind::StateWrite => {
            let (slot, value) = match operands.as_slice() {
                [slot] => (slot.clone(), None),
                [slot, value] => (slot.clone(), Some(value.clone())),
                _ => return Err(arity("[slot] or [slot, value]")),
            };
            if slot.state_slot().is_none() {
                return Err(AnalysisError::malformed(
                    format!("{}.operands[0]", path),
                    format!("'{}' is not a declared state variable", slot),
                ));
            }
            let effect = decl.effect.unwrap_or_default();
            if effect == WriteEffect::Set && value.is_none() {
                return Err(AnalysisError::malformed(
                    format!("{}.operands", path),
                    "a 'set' write needs a value operand",
                ));
            }
            let ceiling = match &decl.ceiling {
                Some(text) => Some(scope.resolve(text, index, &format!("{}.ceiling", path))?),
                None => None,
            };
            Operation::StateWrite {
                slot,
                value,
                effect,
                ceiling,
            }
        }
        OperationKind::SignatureCheck => {
            let (signer, signature, rest) = match operands.as_slice() {
                [signer, signature, rest @ ..] => (signer.clone(), signature.clone(), rest),
                _ => return Err(arity("[signer, signature, fields...]")),
            };
            let mut message: Vec<MessageField> = rest
                .iter()
                .map(|value| MessageField {
                    value: value.clone(),
                    role: None,
                })
                .collect();
            for (m, field) in decl.message.iter().flatten().enumerate() {
                let value =
                    scope.resolve(&field.name, index, &format!("{}.message[{}].name", path, m))?;
                match message.iter_mut().find(|existing| existing.value == value) {
                    Some(existing) => existing.role = field.role.or(existing.role),
                    None => message.push(MessageField {
                        value,
                        role: field.role,
                    }),
                }
            }
            Operation::SignatureCheck {
                signer,
                signature,
                message,
            }
        }
        OperationKind::Require => {
            let check = decl.check.ok_or_else(|| {
                AnalysisError::malformed(
                    format!("{}.check", path),
                    "require operations need a check kind",
                )
            })?;
            match (check, operands.as_slice()) {
                (CheckKind::Eq | CheckKind::Neq, [left, right]) => Operation::Require {
                    check,
                    left: left.clone(),
                    right: Some(right.clone()),
                },
                (CheckKind::AllowList | CheckKind::NonZero, [value]) => Operation::Require {
                    check,
                    left: value.clone(),
                    right: None,
                },
                (CheckKind::NotExpired, [value]) => Operation::Require {
                    check,
                    left: value.clone(),
                    right: Some(ValueRef::Builtin(Builtin::BlockTimestamp)),
                },
                (CheckKind::NotExpired, [value, clock]) => match clock {
                    ValueRef::Builtin(Builtin::BlockTimestamp | Builtin::BlockNumber) => {
                        Operation::Require {
                            check,
                            left: value.clone(),
                            right: Some(clock.clone()),
                        }
                    }
                    other => {
                        return Err(AnalysisError::malformed(
                            format!("{}.operands[1]", path),
                            format!(
                                "'{}' is not a block clock; expected block.timestamp or block.number",
                                other
                            ),
                        ))
                    }
                },
                (CheckKind::Eq | CheckKind::Neq, _) => return Err(arity("[left, right]")),
                (CheckKind::NotExpired, _) => return Err(arity("[value] or [value, clock]")),
                _ => return Err(arity("[value]")),
            }
        }
        OperationKind::ContractCreation => Operation::ContractCreation {
            init_code: operands.clone(),
            low_level: decl.low_level.unwrap_or(false),
        },
    };

    Ok(operation)
}

struct Scope<'a> {
    params: &'a [Parameter],
    state: &'a HashSet<String>,
}

impl Scope<'_> {
    fn resolve(&self, text: &str, op_index: usize, path: &str) -> AnalysisResult<ValueRef> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AnalysisError::malformed(path, "operand must not be empty"));
        }

        if let Some(index) = text.strip_prefix('@') {
            let index: usize = index.parse().map_err(|_| {
                AnalysisError::malformed(path, format!("'{}' is not a valid result reference", text))
            })?;
            if index >= op_index {
                return Err(AnalysisError::malformed(
                    path,
                    format!(
                        "'{}' refers to operation {} which does not precede operation {}",
                        text, index, op_index
                    ),
                ));
            }
            return Ok(ValueRef::Result(index));
        }

        if let Some(builtin) = Builtin::parse(text) {
            return Ok(ValueRef::Builtin(builtin));
        }

        if is_literal(text) {
            return Ok(ValueRef::Literal(text.to_string()));
        }

        if self.params.iter().any(|p| p.name == text) {
            return Ok(ValueRef::Param(text.to_string()));
        }

        let (root, keys) = split_indexed(text).ok_or_else(|| {
            AnalysisError::malformed(path, format!("'{}' is not a well-formed operand", text))
        })?;
        if !self.state.contains(root) {
            let reason = if keys.is_empty() {
                format!("'{}' is not a declared parameter or state variable", root)
            } else {
                format!("'{}' is not a declared state variable", root)
            };
            return Err(AnalysisError::malformed(path, reason));
        }
        let keys = keys
            .into_iter()
            .map(|key| self.resolve(key, op_index, path))
            .collect::<AnalysisResult<Vec<_>>>()?;
        Ok(ValueRef::State {
            slot: root.to_string(),
            keys,
        })
    }
}

fn is_literal(text: &str) -> bool {
    if text == "true" || text == "false" {
        return true;
    }
    if text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
    {
        return true;
    }
    text.starts_with(|c: char| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits `name[a][b]` into `("name", ["a", "b"])`. Returns `None` on unbalanced brackets.
fn split_indexed(text: &str) -> Option<(&str, Vec<&str>)> {
    let Some(open) = text.find('[') else {
        return Some((text, Vec::new()));
    };
    let root = &text[..open];
    let rest = &text[open..];

    let mut keys = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '[' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    keys.push(rest[start..i].trim());
                }
            }
            _ if depth == 0 => return None,
            _ => {}
        }
    }

    if depth != 0 || root.is_empty() || keys.iter().any(|k| k.is_empty()) {
        return None;
    }
    Some((root, keys))
}
