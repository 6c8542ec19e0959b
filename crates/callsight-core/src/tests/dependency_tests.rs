use crate::analysis::{compute_dependency, convert_to_ssa, function_dependencies};
use crate::block::Terminator;
use crate::contract::ContractKind;
use crate::function::{Function, FunctionBody, FunctionId, FunctionKind};
use crate::operations::{CallArgs, Callee, Intrinsic, Operation};
use crate::types::Type;
use crate::unit::{CompilationUnit, IrCounters, Language};
use std::collections::BTreeSet;

/// balances[who] = amount
fn store_body(counters: &mut IrCounters) -> FunctionBody {
    let mut body = FunctionBody::new();
    let balances = body.arena.state(
        "balances",
        Type::from_type_string("mapping(address => uint256)"),
    );
    let who = body.arena.local("who", Type::address());
    let amount = body.arena.local("amount", Type::uint256());
    let slot = body.arena.reference(counters, Type::uint256());
    body.arena.set_points_to(slot, balances).unwrap();

    let index = Operation::call(
        &body.arena,
        Callee::Intrinsic(Intrinsic::Index),
        CallArgs::positional(vec![balances, who]),
        Some(slot),
    )
    .unwrap();
    let store = Operation::assignment(&body.arena, slot, amount, Type::uint256()).unwrap();
    let entry = body.add_node();
    let n = body.node_mut(entry).unwrap();
    n.push(index);
    n.push(store);
    n.terminator = Terminator::Return(vec![]);
    body
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_write_through_reference_reaches_target() {
    let mut counters = IrCounters::default();
    let body = store_body(&mut counters);
    let deps = function_dependencies(&body).unwrap();

    assert_eq!(deps.get("balances"), Some(&names(&["amount"])));
    assert!(!deps["balances"].contains("who"));
}

#[test]
fn test_ssa_versions_project_to_variable_names() {
    let mut counters = IrCounters::default();
    let mut body = store_body(&mut counters);
    convert_to_ssa(&mut body).unwrap();
    let deps = function_dependencies(&body).unwrap();

    assert_eq!(deps.get("balances"), Some(&names(&["amount"])));
}

#[test]
fn test_transitive_through_temporaries() {
    let mut counters = IrCounters::default();
    let mut body = FunctionBody::new();
    let total = body.arena.state("total", Type::uint256());
    let a = body.arena.local("a", Type::uint256());
    let b = body.arena.local("b", Type::uint256());
    let tmp = body.arena.temporary(&mut counters, Type::uint256());

    let add = Operation::call(
        &body.arena,
        Callee::Intrinsic(Intrinsic::Binary("+".to_string())),
        CallArgs::positional(vec![a, b]),
        Some(tmp),
    )
    .unwrap();
    let store = Operation::assignment(&body.arena, total, tmp, Type::uint256()).unwrap();
    let entry = body.add_node();
    let n = body.node_mut(entry).unwrap();
    n.push(add);
    n.push(store);
    n.terminator = Terminator::Return(vec![]);

    let deps = function_dependencies(&body).unwrap();
    assert_eq!(deps.get("total"), Some(&names(&["a", "b"])));
}

#[test]
fn test_contract_aggregates_state_variables() {
    let mut unit = CompilationUnit::new("Vault.sol", Language::Solidity);
    let scope = unit.add_scope("Vault.sol");
    let contract = unit.add_contract("Vault", ContractKind::Contract, scope);

    let mut function = Function::new(FunctionId(0), "deposit", FunctionKind::Function);
    function.contract_context = Some("Vault".to_string());
    function.declarer = Some("Vault".to_string());
    function.is_implemented = true;
    function.body = Some(store_body(&mut unit.counters));
    let id = unit.add_function(function);
    let uid = unit.function(id).unwrap().uid();
    unit.contract_mut(contract).unwrap().functions.push(id);

    compute_dependency(&mut unit).unwrap();

    let deps = &unit.data_dependency;
    assert!(deps.is_dependent(&uid, "balances", "amount"));
    assert!(!deps.is_dependent(&uid, "balances", "who"));
    assert!(deps.is_state_dependent("Vault", "balances", "amount"));
    assert_eq!(
        deps.contract("Vault").map(|m| m.keys().cloned().collect::<Vec<_>>()),
        Some(vec!["balances".to_string()])
    );
}
