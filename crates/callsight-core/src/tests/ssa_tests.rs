use crate::analysis::convert_to_ssa;
use crate::block::{NodeId, Terminator};
use crate::function::FunctionBody;
use crate::operations::{CallArgs, Callee, Intrinsic, Operation};
use crate::types::Type;
use crate::unit::IrCounters;
use crate::values::{Constant, OperandId, SsaLink};
use num_bigint::BigUint;
use pretty_assertions::assert_eq;

fn uint(body: &mut FunctionBody, value: u32) -> OperandId {
    body.arena
        .constant(Constant::Uint(BigUint::from(value)), Type::uint256())
}

fn show(body: &FunctionBody, id: OperandId) -> String {
    body.arena.display(id)
}

/// entry: x := 1; if c { x := 2 }; return x
fn diamond() -> FunctionBody {
    let mut body = FunctionBody::new();
    let x = body.arena.local("x", Type::uint256());
    let c = body.arena.local("c", Type::bool());
    let one = uint(&mut body, 1);
    let two = uint(&mut body, 2);

    let entry = body.add_node();
    let then_node = body.add_node();
    let else_node = body.add_node();
    let join = body.add_node();

    let assign_one = Operation::assignment(&body.arena, x, one, Type::uint256()).unwrap();
    let assign_two = Operation::assignment(&body.arena, x, two, Type::uint256()).unwrap();

    let n = body.node_mut(entry).unwrap();
    n.push(assign_one);
    n.terminator = Terminator::Branch {
        condition: c,
        then_node,
        else_node,
    };
    let n = body.node_mut(then_node).unwrap();
    n.push(assign_two);
    n.terminator = Terminator::Goto(join);
    body.node_mut(else_node).unwrap().terminator = Terminator::Goto(join);
    body.node_mut(join).unwrap().terminator = Terminator::Return(vec![x]);
    body
}

#[test]
fn test_diamond_places_phi_at_join() {
    let mut body = diamond();
    convert_to_ssa(&mut body).unwrap();
    assert!(body.is_ssa);

    let join = body.node(NodeId(3)).unwrap();
    assert_eq!(join.phis.len(), 1);
    let phi = &join.phis[0];
    assert_eq!(show(&body, phi.lvalue), "x_3");
    let incoming: Vec<(NodeId, String)> = phi
        .incoming
        .iter()
        .map(|(pred, value)| (*pred, show(&body, *value)))
        .collect();
    assert_eq!(
        incoming,
        vec![(NodeId(1), "x_2".to_string()), (NodeId(2), "x_1".to_string())]
    );

    match &join.terminator {
        Terminator::Return(values) => assert_eq!(show(&body, values[0]), "x_3"),
        other => panic!("unexpected terminator {:?}", other),
    }
    match &body.node(NodeId(0)).unwrap().terminator {
        Terminator::Branch { condition, .. } => assert_eq!(show(&body, *condition), "c_0"),
        other => panic!("unexpected terminator {:?}", other),
    }
}

#[test]
fn test_versions_link_back_to_base() {
    let mut body = diamond();
    convert_to_ssa(&mut body).unwrap();

    let entry = body.node(NodeId(0)).unwrap();
    let written = entry.operations[0].lvalue().unwrap();
    let operand = body.arena.get(written).unwrap();
    assert_eq!(
        operand.ssa,
        Some(SsaLink::Version {
            base: OperandId(0),
            index: 1
        })
    );
    assert_eq!(body.arena.non_ssa(written), OperandId(0));
}

#[test]
fn test_conversion_is_idempotent() {
    let mut body = diamond();
    convert_to_ssa(&mut body).unwrap();
    let operands = body.arena.len();
    let nodes = body.nodes.clone();

    convert_to_ssa(&mut body).unwrap();
    assert_eq!(body.arena.len(), operands);
    assert_eq!(body.nodes, nodes);
}

/// entry: i := 0; header: while c { i := i + 1 }; exit: return i
#[test]
fn test_loop_header_phis_are_completed_on_seal() {
    let mut body = FunctionBody::new();
    let mut counters = IrCounters::default();
    let i = body.arena.local("i", Type::uint256());
    let c = body.arena.local("c", Type::bool());
    let zero = uint(&mut body, 0);
    let one = uint(&mut body, 1);
    let sum = body.arena.temporary(&mut counters, Type::uint256());

    let entry = body.add_node();
    let header = body.add_node();
    let loop_body = body.add_node();
    let exit = body.add_node();

    let init = Operation::assignment(&body.arena, i, zero, Type::uint256()).unwrap();
    let add = Operation::call(
        &body.arena,
        Callee::Intrinsic(Intrinsic::Binary("+".to_string())),
        CallArgs::positional(vec![i, one]),
        Some(sum),
    )
    .unwrap();
    let store = Operation::assignment(&body.arena, i, sum, Type::uint256()).unwrap();

    let n = body.node_mut(entry).unwrap();
    n.push(init);
    n.terminator = Terminator::Goto(header);
    body.node_mut(header).unwrap().terminator = Terminator::Branch {
        condition: c,
        then_node: loop_body,
        else_node: exit,
    };
    let n = body.node_mut(loop_body).unwrap();
    n.push(add);
    n.push(store);
    n.terminator = Terminator::Goto(header);
    body.node_mut(exit).unwrap().terminator = Terminator::Return(vec![i]);

    convert_to_ssa(&mut body).unwrap();

    let header_node = body.node(header).unwrap();
    let phis: Vec<String> = header_node
        .phis
        .iter()
        .map(|phi| show(&body, phi.lvalue))
        .collect();
    assert_eq!(phis, vec!["c_1".to_string(), "i_2".to_string()]);

    let i_phi = &header_node.phis[1];
    let incoming: Vec<(NodeId, String)> = i_phi
        .incoming
        .iter()
        .map(|(pred, value)| (*pred, show(&body, *value)))
        .collect();
    assert_eq!(
        incoming,
        vec![(entry, "i_1".to_string()), (loop_body, "i_3".to_string())]
    );

    let body_ops = &body.node(loop_body).unwrap().operations;
    assert_eq!(show(&body, body_ops[0].read()[0]), "i_2");
    assert_eq!(show(&body, body_ops[0].lvalue().unwrap()), "TMP_0");
    assert_ne!(body_ops[0].lvalue(), Some(sum));
    assert_eq!(body_ops[1].read(), vec![body_ops[0].lvalue().unwrap()]);

    match &body.node(exit).unwrap().terminator {
        Terminator::Return(values) => assert_eq!(show(&body, values[0]), "i_2"),
        other => panic!("unexpected terminator {:?}", other),
    }
}

#[test]
fn test_unreachable_nodes_are_left_alone() {
    let mut body = FunctionBody::new();
    let x = body.arena.local("x", Type::uint256());
    let one = uint(&mut body, 1);
    let entry = body.add_node();
    let dead = body.add_node();
    body.node_mut(entry).unwrap().terminator = Terminator::Return(vec![]);
    let assign = Operation::assignment(&body.arena, x, one, Type::uint256()).unwrap();
    body.node_mut(dead).unwrap().push(assign);

    convert_to_ssa(&mut body).unwrap();
    assert_eq!(body.node(dead).unwrap().operations[0].lvalue(), Some(x));
}

#[test]
fn test_reference_variant_points_to_renamed_target() {
    let mut body = FunctionBody::new();
    let mut counters = IrCounters::default();
    let balances = body.arena.state(
        "balances",
        Type::from_type_string("mapping(address => uint256)"),
    );
    let who = body.arena.local("who", Type::address());
    let amount = body.arena.local("amount", Type::uint256());
    let slot = body.arena.reference(&mut counters, Type::uint256());
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

    convert_to_ssa(&mut body).unwrap();

    let ops = &body.node(entry).unwrap().operations;
    let variant = ops[0].lvalue().unwrap();
    assert_ne!(variant, slot);
    assert_eq!(ops[1].lvalue(), Some(variant));
    let target = body.arena.resolve_points_to(variant).unwrap();
    assert_eq!(show(&body, target), "balances_0");
    insta::assert_snapshot!(ops[1].display(&body.arena, &()).to_string(), @"REF_0(uint256) (->balances_0) := amount_0(uint256)");
}
