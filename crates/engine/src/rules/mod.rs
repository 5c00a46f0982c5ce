//! Built-in detection rules, one vulnerability class each.

pub mod arbitrary_external_call;
pub mod missing_replay_nonce;
pub mod resource_ceiling;
pub mod self_referential_transfer;
pub mod unbounded_return_data;
pub mod unrestricted_approval;
pub mod unrestricted_source;
pub mod unvalidated_deployment;

pub use arbitrary_external_call::ArbitraryExternalCallRule;
pub use missing_replay_nonce::MissingReplayNonceRule;
pub use resource_ceiling::ResourceCeilingRule;
pub use self_referential_transfer::SelfReferentialTransferRule;
pub use unbounded_return_data::UnboundedReturnDataRule;
pub use unrestricted_approval::UnrestrictedApprovalRule;
pub use unrestricted_source::UnrestrictedSourceRule;
pub use unvalidated_deployment::UnvalidatedDeploymentRule;

use crate::core::Rule;
use std::sync::Arc;

pub fn builtin_rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(UnrestrictedSourceRule::new()),
        Arc::new(SelfReferentialTransferRule::new()),
        Arc::new(ArbitraryExternalCallRule::new()),
        Arc::new(MissingReplayNonceRule::new()),
        Arc::new(ResourceCeilingRule::new()),
        Arc::new(UnvalidatedDeploymentRule::new()),
        Arc::new(UnboundedReturnDataRule::new()),
        Arc::new(UnrestrictedApprovalRule::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AnalysisConfig, Finding, Severity};
    use crate::model::{DocumentFormat, ModelLoader};
    use crate::runner::RuleEngine;
    use crate::signature::SignatureAnalyzer;
    use crate::taint::TaintTracker;
    use std::collections::HashSet;

    fn run<R: Rule + 'static>(rule: R, json: &str) -> Vec<Finding> {
        let model = ModelLoader::new(1_000)
            .load_str(json, DocumentFormat::Json)
            .unwrap();
        let tainted = TaintTracker::track(&model);
        let replay = SignatureAnalyzer::assess_contract(&model, &tainted);
        let run = RuleEngine::new(AnalysisConfig::default())
            .add_rule(rule)
            .run(&model, &tainted, &replay);
        assert!(run.diagnostics.is_empty(), "{:?}", run.diagnostics);
        run.findings
    }

    #[test]
    fn test_builtin_rule_ids_are_unique() {
        let rules = builtin_rules();
        let ids: HashSet<_> = rules.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), rules.len());
        assert_eq!(rules.len(), 8);
    }

    #[test]
    fn test_unrestricted_source_fires_once_and_respects_sender_check() {
        let vulnerable = r#"{
            "contractName": "L1BossBridge",
            "state": [{"name": "vault", "privileged": true}],
            "functions": [{
                "name": "depositTokensToL2",
                "parameters": [
                    {"name": "from", "type": "address", "callerSupplied": true},
                    {"name": "amount", "type": "uint256", "callerSupplied": true}
                ],
                "operations": [{"kind": "tokenTransfer", "operands": ["from", "vault", "amount"]}]
            }]
        }"#;
        let findings = run(UnrestrictedSourceRule::new(), vulnerable);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].function_name, "depositTokensToL2");
        assert_eq!(findings[0].operation_path, vec![0]);

        let fixed = vulnerable.replace(
            r#""operations": ["#,
            r#""operations": [{"kind": "require", "check": "eq", "operands": ["from", "msg.sender"]},"#,
        );
        assert!(run(UnrestrictedSourceRule::new(), &fixed).is_empty());
    }

    #[test]
    fn test_contract_paid_transfer_is_not_unrestricted_source() {
        let findings = run(
            UnrestrictedSourceRule::new(),
            r#"{
            "contractName": "Vault",
            "functions": [{
                "name": "withdraw",
                "parameters": [{"name": "to", "type": "address", "callerSupplied": true}],
                "operations": [{"kind": "tokenTransfer", "operands": ["to", "1"]}]
            }]
        }"#,
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_self_referential_transfer_needs_neq_guard() {
        let vulnerable = r#"{
            "contractName": "L1BossBridge",
            "state": [{"name": "vault", "privileged": true}],
            "functions": [{
                "name": "depositTokensToL2",
                "parameters": [{"name": "from", "type": "address", "callerSupplied": true}],
                "operations": [{"kind": "tokenTransfer", "operands": ["from", "vault", "1"]}]
            }]
        }"#;
        assert_eq!(run(SelfReferentialTransferRule::new(), vulnerable).len(), 1);

        let guarded = vulnerable.replace(
            r#""operations": ["#,
            r#""operations": [{"kind": "require", "check": "neq", "operands": ["from", "vault"]},"#,
        );
        assert!(run(SelfReferentialTransferRule::new(), &guarded).is_empty());
    }

    #[test]
    fn test_pull_into_contract_is_not_self_referential() {
        let pull = r#"{
            "contractName": "Pool",
            "functions": [{
                "name": "deposit",
                "parameters": [
                    {"name": "from", "type": "address", "callerSupplied": true},
                    {"name": "amount", "type": "uint256", "callerSupplied": true}
                ],
                "operations": [{"kind": "tokenTransfer", "operands": ["from", "address(this)", "amount"]}]
            }]
        }"#;
        assert_eq!(run(UnrestrictedSourceRule::new(), pull).len(), 1);
        assert!(run(SelfReferentialTransferRule::new(), pull).is_empty());
    }

    #[test]
    fn test_arbitrary_call_respects_allow_list_and_guard() {
        let vulnerable = r#"{
            "contractName": "Executor",
            "functions": [{
                "name": "execute",
                "parameters": [{"name": "data", "type": "bytes", "callerSupplied": true}],
                "operations": [{"kind": "externalCall", "operands": ["data"], "targetIsCallerControlled": true}]
            }]
        }"#;
        assert_eq!(run(ArbitraryExternalCallRule::new(), vulnerable).len(), 1);

        let owner_only = vulnerable.replace(r#""parameters""#, r#""modifiers": ["onlyOwner"], "parameters""#);
        assert!(run(ArbitraryExternalCallRule::new(), &owner_only).is_empty());

        let allow_listed = r#"{
            "contractName": "Executor",
            "functions": [{
                "name": "execute",
                "parameters": [{"name": "target", "type": "address", "callerSupplied": true}],
                "operations": [
                    {"kind": "require", "check": "allowList", "operands": ["target"]},
                    {"kind": "externalCall", "operands": ["target"]}
                ]
            }]
        }"#;
        assert!(run(ArbitraryExternalCallRule::new(), allow_listed).is_empty());
    }

    #[test]
    fn test_resource_ceiling_cleared_by_release_elsewhere() {
        let capped = r#"{
            "contractName": "Raffle",
            "state": [{"name": "players"}, {"name": "MAX_PLAYERS"}],
            "functions": [{
                "name": "enter",
                "operations": [{"kind": "stateWrite", "operands": ["players"], "effect": "increment", "ceiling": "MAX_PLAYERS"}]
            }]
        }"#;
        let findings = run(ResourceCeilingRule::new(), capped);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);

        let released = r#"{
            "contractName": "Raffle",
            "state": [{"name": "players"}, {"name": "MAX_PLAYERS"}],
            "functions": [{
                "name": "enter",
                "operations": [{"kind": "stateWrite", "operands": ["players"], "effect": "increment", "ceiling": "MAX_PLAYERS"}]
            }, {
                "name": "leave",
                "operations": [{"kind": "stateWrite", "operands": ["players"], "effect": "decrement"}]
            }]
        }"#;
        assert!(run(ResourceCeilingRule::new(), released).is_empty());
    }

    #[test]
    fn test_unvalidated_deployment_cleared_by_non_zero_check() {
        let unchecked = r#"{
            "contractName": "TokenFactory",
            "state": [{"name": "tokens"}],
            "functions": [{
                "name": "deployToken",
                "parameters": [
                    {"name": "symbol", "type": "string"},
                    {"name": "bytecode", "type": "bytes"}
                ],
                "modifiers": ["onlyOwner"],
                "operations": [
                    {"kind": "contractCreation", "operands": ["bytecode"], "lowLevel": true},
                    {"kind": "stateWrite", "operands": ["tokens[symbol]", "@0"]}
                ]
            }]
        }"#;
        let findings = run(UnvalidatedDeploymentRule::new(), unchecked);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].operation_path, vec![0, 1]);

        let checked = unchecked.replace(
            r#"{"kind": "stateWrite""#,
            r#"{"kind": "require", "check": "nonZero", "operands": ["@0"]},
                    {"kind": "stateWrite""#,
        );
        assert!(run(UnvalidatedDeploymentRule::new(), &checked).is_empty());
    }

    #[test]
    fn test_return_bomb_only_for_untrusted_targets() {
        let findings = run(
            UnboundedReturnDataRule::new(),
            r#"{
            "contractName": "Vault",
            "state": [{"name": "oracle"}],
            "functions": [{
                "name": "refund",
                "parameters": [{"name": "to", "type": "address", "callerSupplied": true}],
                "operations": [
                    {"kind": "externalCall", "operands": ["to"]},
                    {"kind": "externalCall", "operands": ["oracle"]},
                    {"kind": "externalCall", "operands": ["to"], "gasLimit": 2300},
                    {"kind": "externalCall", "operands": ["to"], "returnData": "ignored"}
                ]
            }]
        }"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].operation_index, 0);
    }

    #[test]
    fn test_return_bomb_honours_declared_caller_control() {
        let declared = r#"{
            "contractName": "Aggregator",
            "state": [{"name": "router"}],
            "functions": [{
                "name": "route",
                "operations": [
                    {"kind": "externalCall", "operands": ["router"], "targetIsCallerControlled": true}
                ]
            }]
        }"#;
        let findings = run(UnboundedReturnDataRule::new(), declared);
        assert_eq!(findings.len(), 1);
        assert_eq!(run(ArbitraryExternalCallRule::new(), declared).len(), 1);

        let pinned = r#"{
            "contractName": "Aggregator",
            "functions": [{
                "name": "route",
                "parameters": [{"name": "target", "type": "address", "callerSupplied": true}],
                "operations": [
                    {"kind": "externalCall", "operands": ["target"], "targetIsCallerControlled": false}
                ]
            }]
        }"#;
        assert!(run(UnboundedReturnDataRule::new(), pinned).is_empty());
        assert!(run(ArbitraryExternalCallRule::new(), pinned).is_empty());
    }

    #[test]
    fn test_unchecked_deadline_is_replayable() {
        let unchecked = r#"{
            "contractName": "Permit",
            "state": [{"name": "signers"}],
            "functions": [{
                "name": "permit",
                "parameters": [
                    {"name": "sig", "type": "bytes", "callerSupplied": true},
                    {"name": "deadline", "type": "uint256", "callerSupplied": true}
                ],
                "operations": [
                    {"kind": "signatureCheck", "operands": ["signers", "sig", "deadline"]}
                ]
            }]
        }"#;
        assert_eq!(run(MissingReplayNonceRule::new(), unchecked).len(), 1);

        let checked = unchecked.replace(
            r#""operations": ["#,
            r#""operations": [{"kind": "require", "check": "notExpired", "operands": ["deadline"]},"#,
        );
        assert!(run(MissingReplayNonceRule::new(), &checked).is_empty());
    }

    #[test]
    fn test_reseeded_call_result_reaches_approval() {
        let findings = run(
            UnrestrictedApprovalRule::new(),
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
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].operation_index, 2);
        assert!(findings[0].operation_path.contains(&1));
    }

    #[test]
    fn test_unrestricted_approval() {
        let findings = run(
            UnrestrictedApprovalRule::new(),
            r#"{
            "contractName": "Vault",
            "functions": [{
                "name": "approveSpender",
                "parameters": [{"name": "spender", "type": "address", "callerSupplied": true}],
                "operations": [{"kind": "approvalGrant", "operands": ["spender", "1000"]}]
            }]
        }"#,
        );
        assert_eq!(findings.len(), 1);
    }
}
