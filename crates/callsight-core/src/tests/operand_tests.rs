use crate::types::Type;
use crate::unit::IrCounters;
use crate::values::{Constant, OperandArena, OperandKind, SsaLink};
use crate::IrError;
use num_bigint::BigUint;

#[test]
fn test_lvalue_and_rvalue_validity() {
    let mut arena = OperandArena::new();
    let mut counters = IrCounters::default();

    let state = arena.state("balance", Type::uint256());
    let local = arena.local("amount", Type::uint256());
    let tmp = arena.temporary(&mut counters, Type::uint256());
    let reference = arena.reference(&mut counters, Type::uint256());
    let tuple = arena.tuple(&mut counters, Type::Tuple(vec![Type::uint256(), Type::bool()]));
    let constant = arena.constant(Constant::Uint(BigUint::from(5u32)), Type::uint256());
    let sender = arena.builtin("msg.sender", Type::address());

    for id in [state, local, tmp, reference, tuple] {
        let operand = arena.get(id).unwrap();
        assert!(operand.is_valid_lvalue(), "{} should be an lvalue", operand);
        assert!(operand.is_valid_rvalue(), "{} should be an rvalue", operand);
    }
    for id in [constant, sender] {
        let operand = arena.get(id).unwrap();
        assert!(!operand.is_valid_lvalue(), "{} should not be an lvalue", operand);
        assert!(operand.is_valid_rvalue(), "{} should be an rvalue", operand);
    }

    let version = arena.new_version(state).unwrap();
    assert!(arena.get(version).unwrap().is_valid_lvalue());
    let variant = arena.ssa_variant(tmp).unwrap();
    assert!(arena.get(variant).unwrap().is_valid_lvalue());
}

#[test]
fn test_ir_indices_come_from_counters() {
    let mut arena = OperandArena::new();
    let mut counters = IrCounters::default();
    let first = arena.temporary(&mut counters, Type::uint256());
    let second = arena.temporary(&mut counters, Type::uint256());
    let reference = arena.reference(&mut counters, Type::uint256());

    assert_eq!(arena.display(first), "TMP_0");
    assert_eq!(arena.display(second), "TMP_1");
    assert_eq!(arena.display(reference), "REF_0");

    let mut other_arena = OperandArena::new();
    let third = other_arena.temporary(&mut counters, Type::uint256());
    assert_eq!(other_arena.display(third), "TMP_2");
}

#[test]
fn test_ssa_variant_is_created_once() {
    let mut arena = OperandArena::new();
    let mut counters = IrCounters::default();
    let a = arena.temporary(&mut counters, Type::uint256());
    let b = arena.temporary(&mut counters, Type::uint256());

    let va = arena.ssa_variant(a).unwrap();
    let va_again = arena.ssa_variant(a).unwrap();
    let vb = arena.ssa_variant(b).unwrap();

    assert_eq!(va, va_again);
    assert_ne!(va, vb);
    assert_ne!(va, a);
    assert_eq!(arena.non_ssa(va), a);
    assert_eq!(arena.non_ssa(vb), b);
    assert_eq!(
        arena.get(va).unwrap().ssa,
        Some(SsaLink::Variant { non_ssa_version: a })
    );
    assert_eq!(arena.ssa_variant(va).unwrap(), va);
}

#[test]
fn test_ssa_variant_rejects_variables() {
    let mut arena = OperandArena::new();
    let state = arena.state("owner", Type::address());
    let err = arena.ssa_variant(state).unwrap_err();
    assert!(matches!(err, IrError::InvalidLvalue { kind: "state", .. }));
}

#[test]
fn test_variable_versions() {
    let mut arena = OperandArena::new();
    let x = arena.local("x", Type::uint256());

    let entry = arena.entry_version(x).unwrap();
    let first = arena.new_version(x).unwrap();
    let second = arena.new_version(x).unwrap();

    assert_eq!(arena.entry_version(x).unwrap(), entry);
    assert_eq!(arena.display(entry), "x_0");
    assert_eq!(arena.display(first), "x_1");
    assert_eq!(arena.display(second), "x_2");
    assert_eq!(arena.non_ssa(second), x);
}

#[test]
fn test_resolve_points_to_follows_chain() {
    let mut arena = OperandArena::new();
    let mut counters = IrCounters::default();
    let balances = arena.state(
        "balances",
        Type::from_type_string("mapping(address => uint256)"),
    );
    let outer = arena.reference(&mut counters, Type::uint256());
    let inner = arena.reference(&mut counters, Type::uint256());

    arena.set_points_to(outer, inner).unwrap();
    arena.set_points_to(inner, balances).unwrap();

    assert_eq!(arena.resolve_points_to(outer).unwrap(), balances);
    assert_eq!(arena.resolve_points_to(balances).unwrap(), balances);
}

#[test]
fn test_unbound_reference_resolves_to_itself() {
    let mut arena = OperandArena::new();
    let mut counters = IrCounters::default();
    let reference = arena.reference(&mut counters, Type::uint256());
    assert_eq!(arena.resolve_points_to(reference).unwrap(), reference);
}

#[test]
fn test_reference_cycle_is_detected() {
    let mut arena = OperandArena::new();
    let mut counters = IrCounters::default();
    let a = arena.reference(&mut counters, Type::uint256());
    let b = arena.reference(&mut counters, Type::uint256());
    arena.set_points_to(a, b).unwrap();
    arena.set_points_to(b, a).unwrap();

    let err = arena.resolve_points_to(a).unwrap_err();
    assert!(matches!(err, IrError::ReferenceCycle { bound: 2, .. }));
    assert!(err.is_contract_violation());
}

#[test]
fn test_points_to_is_set_once() {
    let mut arena = OperandArena::new();
    let mut counters = IrCounters::default();
    let x = arena.local("x", Type::uint256());
    let y = arena.local("y", Type::uint256());
    let reference = arena.reference(&mut counters, Type::uint256());

    arena.set_points_to(reference, x).unwrap();
    let err = arena.set_points_to(reference, y).unwrap_err();
    assert!(matches!(err, IrError::Sequencing(_)));
    assert_eq!(arena.resolve_points_to(reference).unwrap(), x);
}

#[test]
fn test_reindex_only_touches_ir_operands() {
    let mut arena = OperandArena::new();
    let mut counters = IrCounters::default();
    let tuple = arena.tuple(&mut counters, Type::Tuple(vec![]));
    let state = arena.state("total", Type::uint256());

    arena.reindex(tuple, 7).unwrap();
    assert_eq!(arena.display(tuple), "TUPLE_7");
    assert!(matches!(
        arena.get(tuple).unwrap().kind,
        OperandKind::Tuple { index: 7 }
    ));

    assert!(arena.reindex(state, 3).is_err());
}

#[test]
fn test_unknown_operand() {
    let arena = OperandArena::new();
    let err = arena.get(crate::values::OperandId(42)).unwrap_err();
    assert_eq!(err, IrError::UnknownOperand(42));
}

#[test]
fn test_constant_literals() {
    assert_eq!(
        Constant::parse_number("1_000").unwrap(),
        Constant::Uint(BigUint::from(1000u32))
    );
    assert_eq!(
        Constant::parse_number("0xff").unwrap(),
        Constant::Uint(BigUint::from(255u32))
    );
    assert_eq!(Constant::parse_number("-3").unwrap().to_string(), "-3");
    assert_eq!(
        Constant::parse_number("2.5e3").unwrap(),
        Constant::Uint(BigUint::from(2500u32))
    );
    assert!(Constant::parse_number("1e-2").is_none());
    assert_eq!(Constant::Bytes(vec![0xde, 0xad]).to_string(), "0xdead");
}
