use crate::callgraph::{
    build_function_call_edges, contract_functions_by_visibility, iter_call_targets,
    transitive_bundle, BundleLeaf, CallFilters, EdgeKind, LeafKind, TargetKind, VisibilityQuery,
};
use crate::contract::{ContractId, ContractKind};
use crate::function::{Function, FunctionId, FunctionKind, Parameter, Visibility};
use crate::operations::{Callee, HighLevelTarget, UnresolvedEdge};
use crate::types::Type;
use crate::unit::{CompilationUnit, Language};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Fixture {
    unit: CompilationUnit,
}

impl Fixture {
    fn new() -> Self {
        let mut unit = CompilationUnit::new("Vault.sol", Language::Solidity);
        unit.add_scope("Vault.sol");
        Self { unit }
    }

    fn contract(&mut self, name: &str, kind: ContractKind) -> ContractId {
        let scope = self.unit.scopes[0].id;
        self.unit.add_contract(name, kind, scope)
    }

    fn function(
        &mut self,
        contract: ContractId,
        name: &str,
        params: &[Type],
        visibility: Visibility,
        kind: FunctionKind,
        implemented: bool,
    ) -> FunctionId {
        let owner = self.unit.contract(contract).unwrap().name.clone();
        let mut function = Function::new(FunctionId(0), name, kind);
        function.contract_context = Some(owner.clone());
        function.declarer = Some(owner);
        function.visibility = visibility;
        function.is_implemented = implemented;
        function.set_signature(
            params
                .iter()
                .enumerate()
                .map(|(i, ty)| Parameter::new(format!("p{}", i), ty.clone()))
                .collect(),
        );
        let id = self.unit.add_function(function);
        let c = self.unit.contract_mut(contract).unwrap();
        c.functions.push(id);
        c.functions_declared.push(id);
        id
    }

    fn calls(&mut self, id: FunctionId) -> &mut crate::function::CallSites {
        &mut self.unit.function_mut(id).unwrap().calls
    }
}

fn summary(node: &crate::callgraph::FunctionNode) -> Vec<(String, String, String)> {
    node.calls
        .iter()
        .map(|c| {
            (
                c.edge().to_string(),
                c.kind().to_string(),
                c.label().to_string(),
            )
        })
        .collect()
}

fn row(edge: &str, kind: &str, label: &str) -> (String, String, String) {
    (edge.to_string(), kind.to_string(), label.to_string())
}

/// Vault.withdraw exercising every edge kind.
fn vault() -> (Fixture, FunctionId) {
    let mut fx = Fixture::new();
    let vault = fx.contract("Vault", ContractKind::Contract);
    let math = fx.contract("SafeMath", ContractKind::Library);
    let token = fx.contract("IERC20", ContractKind::Interface);

    let withdraw = fx.function(
        vault,
        "withdraw",
        &[Type::uint256()],
        Visibility::External,
        FunctionKind::Function,
        true,
    );
    let only_owner = fx.function(
        vault,
        "onlyOwner",
        &[],
        Visibility::Internal,
        FunctionKind::Modifier,
        true,
    );
    let transfer_internal = fx.function(
        vault,
        "_transfer",
        &[Type::address(), Type::uint256()],
        Visibility::Internal,
        FunctionKind::Function,
        true,
    );
    let add = fx.function(
        math,
        "add",
        &[Type::uint256(), Type::uint256()],
        Visibility::Internal,
        FunctionKind::Function,
        true,
    );
    let transfer = fx.function(
        token,
        "transfer",
        &[Type::address(), Type::uint256()],
        Visibility::External,
        FunctionKind::Function,
        false,
    );

    let calls = fx.calls(withdraw);
    calls.modifiers = vec![only_owner];
    calls.internal = vec![
        Callee::Internal(transfer_internal),
        Callee::Builtin("require(bool,string)".to_string()),
        Callee::Internal(transfer_internal),
    ];
    calls.library = vec![Callee::Library(add)];
    calls.high_level = vec![
        Callee::HighLevel {
            contract: Some("IERC20".to_string()),
            target: HighLevelTarget::Function(transfer),
        },
        Callee::HighLevel {
            contract: Some("Oracle".to_string()),
            target: HighLevelTarget::Variable("price".to_string()),
        },
        Callee::HighLevel {
            contract: None,
            target: HighLevelTarget::Unresolved("call".to_string()),
        },
    ];
    (fx, withdraw)
}

#[test]
fn test_targets_come_in_list_order() {
    let (fx, withdraw) = vault();
    let function = fx.unit.function(withdraw).unwrap();
    let targets = iter_call_targets(&fx.unit, function);

    let edges: Vec<EdgeKind> = targets.iter().map(|t| t.edge).collect();
    assert_eq!(
        edges,
        vec![
            EdgeKind::Modifier,
            EdgeKind::Internal,
            EdgeKind::Solidity,
            EdgeKind::Internal,
            EdgeKind::Library,
            EdgeKind::External,
            EdgeKind::External,
            EdgeKind::External,
        ]
    );
    assert_eq!(targets[2].kind, TargetKind::Solidity);
    assert_eq!(targets[5].target_contract.as_deref(), Some("IERC20"));
    assert_eq!(targets[6].label, "Oracle.price");
}

#[test]
fn test_edges_are_filtered_deduplicated_and_sorted() {
    let (fx, withdraw) = vault();
    let node = build_function_call_edges(&fx.unit, withdraw, &CallFilters::default()).unwrap();

    assert_eq!(node.id, "Vault::Vault.withdraw(uint256)");
    assert_eq!(node.display, "Vault.withdraw(uint256)");
    assert_eq!(
        summary(&node),
        vec![
            row("external", "unknown", "IERC20.transfer(address,uint256)"),
            row("external", "unknown", "call"),
            row("external", "variable", "Oracle.price"),
            row("internal", "function", "Vault._transfer(address,uint256)"),
            row("library", "function", "SafeMath.add(uint256,uint256)"),
            row("modifier", "function", "Vault.onlyOwner()"),
        ]
    );
}

#[test]
fn test_filters_drop_edge_kinds() {
    let (fx, withdraw) = vault();
    let filters = CallFilters {
        include_external_calls: false,
        include_library_calls: false,
        include_solidity_calls: true,
        include_modifiers: false,
        include_base_constructors: false,
    };
    let node = build_function_call_edges(&fx.unit, withdraw, &filters).unwrap();
    assert_eq!(
        summary(&node),
        vec![
            row("internal", "function", "Vault._transfer(address,uint256)"),
            row("solidity", "solidity", "require(bool,string)"),
        ]
    );
}

#[test]
fn test_edge_building_is_idempotent() {
    let (fx, withdraw) = vault();
    let filters = CallFilters::default();
    let first = build_function_call_edges(&fx.unit, withdraw, &filters).unwrap();
    let second = build_function_call_edges(&fx.unit, withdraw, &filters).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_abstract_target_is_demoted_to_unknown() {
    let mut fx = Fixture::new();
    let iface = fx.contract("Interface", ContractKind::Interface);
    let user = fx.contract("User", ContractKind::Contract);
    let f = fx.function(
        iface,
        "f",
        &[],
        Visibility::External,
        FunctionKind::Function,
        false,
    );
    let g = fx.function(
        user,
        "g",
        &[],
        Visibility::Public,
        FunctionKind::Function,
        true,
    );
    fx.calls(g).internal = vec![Callee::Internal(f)];

    let node = build_function_call_edges(&fx.unit, g, &CallFilters::default()).unwrap();
    assert_eq!(
        serde_json::to_value(&node.calls).unwrap(),
        json!([{"kind": "unknown", "edge": "internal", "display": "Interface.f()"}])
    );
}

#[test]
fn test_function_node_schema() {
    let (fx, withdraw) = vault();
    let node = build_function_call_edges(&fx.unit, withdraw, &CallFilters::default()).unwrap();
    let value = serde_json::to_value(&node).unwrap();

    assert_eq!(value["kind"], "function");
    assert_eq!(value["visibility"], "external");
    assert_eq!(value["contract_context"], "Vault");
    assert_eq!(value["declared_in"], "Vault");
    assert_eq!(value["is_constructor"], false);
    assert!(value.get("visibility_defaulted").is_none());
    assert_eq!(
        value["calls"][3],
        json!({
            "kind": "function",
            "edge": "internal",
            "id": "Vault::Vault._transfer(address,uint256)",
            "name": "_transfer(address,uint256)",
            "display": "Vault._transfer(address,uint256)",
            "visibility": "internal",
            "contract_context": "Vault",
            "declared_in": "Vault",
        })
    );
}

#[test]
fn test_unknown_root_is_a_resolution_error() {
    let fx = Fixture::new();
    let err = build_function_call_edges(&fx.unit, FunctionId(9), &CallFilters::default())
        .unwrap_err();
    assert!(matches!(err, crate::IrError::Resolution(_)));
}

#[test]
fn test_bundle_terminates_under_mutual_recursion() {
    let mut fx = Fixture::new();
    let c = fx.contract("Ping", ContractKind::Contract);
    let iface = fx.contract("IPong", ContractKind::Interface);
    let ping = fx.function(c, "ping", &[], Visibility::External, FunctionKind::Function, true);
    let pong = fx.function(c, "pong", &[], Visibility::Internal, FunctionKind::Function, true);
    let remote = fx.function(iface, "pong", &[], Visibility::External, FunctionKind::Function, false);

    fx.calls(ping).internal = vec![Callee::Internal(pong)];
    let calls = fx.calls(pong);
    calls.internal = vec![
        Callee::Internal(ping),
        Callee::Builtin("keccak256(bytes)".to_string()),
        Callee::Unresolved {
            edge: UnresolvedEdge::Internal,
            label: "dispatch".to_string(),
        },
    ];
    calls.high_level = vec![Callee::HighLevel {
        contract: Some("IPong".to_string()),
        target: HighLevelTarget::Function(remote),
    }];

    let bundle = transitive_bundle(&fx.unit, ping, &CallFilters::default()).unwrap();
    assert_eq!(bundle.reachable, vec![(EdgeKind::Internal, pong)]);
    let leaves: Vec<&BundleLeaf> = bundle.leaves.iter().collect();
    assert_eq!(
        leaves,
        vec![
            &BundleLeaf {
                edge: EdgeKind::External,
                kind: LeafKind::Abstract,
                label: "IPong.pong()".to_string(),
            },
            &BundleLeaf {
                edge: EdgeKind::Internal,
                kind: LeafKind::Unknown,
                label: "dispatch".to_string(),
            },
        ]
    );

    let with_builtins = CallFilters {
        include_solidity_calls: true,
        ..CallFilters::default()
    };
    let bundle = transitive_bundle(&fx.unit, ping, &with_builtins).unwrap();
    assert!(bundle.leaves.contains(&BundleLeaf {
        edge: EdgeKind::Solidity,
        kind: LeafKind::Solidity,
        label: "keccak256(bytes)".to_string(),
    }));
}

#[test]
fn test_visibility_groups() {
    let mut fx = Fixture::new();
    let base = fx.contract("Base", ContractKind::Contract);
    let token = fx.contract("Token", ContractKind::Contract);

    let inherited = fx.function(base, "pause", &[], Visibility::Public, FunctionKind::Function, true);
    let shadowed = fx.function(base, "mint", &[], Visibility::Public, FunctionKind::Function, true);
    let fallback = fx.function(base, "fallback", &[], Visibility::External, FunctionKind::Fallback, true);
    let mint = fx.function(token, "mint", &[], Visibility::Public, FunctionKind::Function, true);
    let burn = fx.function(token, "burn", &[], Visibility::External, FunctionKind::Function, true);
    let helper = fx.function(token, "_helper", &[], Visibility::Private, FunctionKind::Function, true);
    let _modifier = fx.function(token, "guarded", &[], Visibility::Internal, FunctionKind::Modifier, true);
    let _declared = fx.function(token, "hook", &[], Visibility::Internal, FunctionKind::Function, false);

    for id in [shadowed, fallback] {
        fx.unit.function_mut(id).unwrap().is_shadowed = true;
    }
    {
        let t = fx.unit.contract_mut(token).unwrap();
        t.functions.extend([inherited, shadowed, fallback]);
    }

    let contract = fx.unit.contract(token).unwrap().clone();
    let groups = contract_functions_by_visibility(&fx.unit, &contract, &VisibilityQuery::default());
    let keys: Vec<Visibility> = groups.keys().copied().collect();
    assert_eq!(keys, Visibility::ALL.to_vec());
    assert_eq!(groups[&Visibility::External], vec![fallback, burn]);
    assert_eq!(groups[&Visibility::Public], vec![inherited, mint]);
    assert!(groups[&Visibility::Internal].is_empty());
    assert_eq!(groups[&Visibility::Private], vec![helper]);

    let declared_only = VisibilityQuery {
        include_inherited: false,
        ..VisibilityQuery::default()
    };
    let groups = contract_functions_by_visibility(&fx.unit, &contract, &declared_only);
    assert_eq!(groups[&Visibility::Public], vec![mint]);

    let with_shadowed = VisibilityQuery {
        include_shadowed: true,
        ..VisibilityQuery::only(&[Visibility::Public])
    };
    let groups = contract_functions_by_visibility(&fx.unit, &contract, &with_shadowed);
    assert_eq!(groups[&Visibility::Public], vec![shadowed, inherited, mint]);
    assert!(groups[&Visibility::External].is_empty());
}
