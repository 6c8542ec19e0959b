/*! Body construction shared by the Solidity and Vyper front ends.
 *
 * Front ends walk their own AST shapes but emit the same operations through [`BodyBuilder`], which
 * owns the node list, lexical scopes, loop targets and the per-body operand caches. A node is
 * terminated exactly once; anything emitted after a terminator lands in a fresh node so dead code
 * after `return` or `break` still lowers without touching reachable nodes.
 */

use crate::errors::Result;
use callsight_core::{
    CallArgs, Callee, Constant, FunctionBody, Intrinsic, IrCounters, NodeId, OperandArena,
    OperandId, Operation, SourceSpan, Terminator, Type,
};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Scope {
    symbols: HashMap<String, OperandId>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, operand: OperandId) {
        self.symbols.insert(name.into(), operand);
    }

    pub fn lookup(&self, name: &str) -> Option<OperandId> {
        self.symbols.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTargets {
    pub continue_to: NodeId,
    pub break_to: NodeId,
}

pub struct BodyBuilder<'c> {
    body: FunctionBody,
    counters: &'c mut IrCounters,
    current: NodeId,
    scopes: Vec<Scope>,
    loops: Vec<LoopTargets>,
    states: HashMap<String, OperandId>,
    builtins: HashMap<String, OperandId>,
}

impl<'c> BodyBuilder<'c> {
    pub fn new(counters: &'c mut IrCounters) -> Self {
        let mut body = FunctionBody::new();
        let entry = body.add_node();
        Self {
            body,
            counters,
            current: entry,
            scopes: vec![Scope::new()],
            loops: Vec::new(),
            states: HashMap::new(),
            builtins: HashMap::new(),
        }
    }

    pub fn arena(&self) -> &OperandArena {
        &self.body.arena
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn new_node(&mut self) -> NodeId {
        self.body.add_node()
    }

    pub fn switch_to(&mut self, node: NodeId) {
        self.current = node;
    }

    pub fn is_terminated(&self) -> bool {
        self.body
            .node(self.current)
            .map(|n| n.is_terminated())
            .unwrap_or(true)
    }

    /// Terminates the current node; a node that is already terminated keeps its terminator.
    pub fn terminate(&mut self, terminator: Terminator) {
        if let Some(node) = self.body.node_mut(self.current) {
            if !node.is_terminated() {
                node.terminator = terminator;
            }
        }
    }

    pub fn goto(&mut self, target: NodeId) {
        self.terminate(Terminator::Goto(target));
    }

    pub fn branch(&mut self, condition: OperandId, then_node: NodeId, else_node: NodeId) {
        self.terminate(Terminator::Branch {
            condition,
            then_node,
            else_node,
        });
    }

    pub fn annotate(&mut self, span: Option<SourceSpan>) {
        if let Some(node) = self.body.node_mut(self.current) {
            if node.source.is_none() {
                node.source = span;
            }
        }
    }

    pub fn emit(&mut self, op: Operation) {
        if self.is_terminated() {
            self.current = self.body.add_node();
        }
        if let Some(node) = self.body.node_mut(self.current) {
            node.push(op);
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn lookup(&self, name: &str) -> Option<OperandId> {
        self.scopes.iter().rev().find_map(|s| s.lookup(name))
    }

    pub fn push_loop(&mut self, targets: LoopTargets) {
        self.loops.push(targets);
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub fn loop_targets(&self) -> Option<LoopTargets> {
        self.loops.last().copied()
    }

    /// Declares a local in the innermost scope.
    pub fn local(&mut self, name: &str, ty: Type) -> OperandId {
        let id = self.body.arena.local(name, ty);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, id);
        }
        id
    }

    pub fn state(&mut self, name: &str, ty: Type) -> OperandId {
        if let Some(id) = self.states.get(name) {
            return *id;
        }
        let id = self.body.arena.state(name, ty);
        self.states.insert(name.to_string(), id);
        id
    }

    pub fn builtin(&mut self, name: &str, ty: Type) -> OperandId {
        if let Some(id) = self.builtins.get(name) {
            return *id;
        }
        let id = self.body.arena.builtin(name, ty);
        self.builtins.insert(name.to_string(), id);
        id
    }

    pub fn constant(&mut self, value: Constant, ty: Type) -> OperandId {
        self.body.arena.constant(value, ty)
    }

    pub fn temp(&mut self, ty: Type) -> OperandId {
        self.body.arena.temporary(self.counters, ty)
    }

    pub fn tuple(&mut self, ty: Type) -> OperandId {
        self.body.arena.tuple(self.counters, ty)
    }

    /// Fresh temporary, or a tuple when the type has more than one component.
    pub fn result_for(&mut self, ty: Type) -> Option<OperandId> {
        match &ty {
            Type::Tuple(items) if items.is_empty() => None,
            Type::Tuple(items) if items.len() > 1 => Some(self.tuple(ty)),
            Type::Tuple(items) => {
                let single = items[0].clone();
                Some(self.temp(single))
            }
            _ => Some(self.temp(ty)),
        }
    }

    pub fn reference(&mut self, ty: Type, points_to: OperandId) -> Result<OperandId> {
        let id = self.body.arena.reference(self.counters, ty);
        self.body.arena.set_points_to(id, points_to)?;
        Ok(id)
    }

    pub fn assign(&mut self, lvalue: OperandId, rvalue: OperandId, ty: Type) -> Result<()> {
        let op = Operation::assignment(&self.body.arena, lvalue, rvalue, ty)?;
        self.emit(op);
        Ok(())
    }

    pub fn call(
        &mut self,
        callee: Callee,
        args: CallArgs,
        lvalue: Option<OperandId>,
    ) -> Result<()> {
        let op = Operation::call(&self.body.arena, callee, args, lvalue)?;
        self.emit(op);
        Ok(())
    }

    /// Emits an intrinsic call into a fresh temporary and returns it.
    pub fn intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        arguments: Vec<OperandId>,
        ty: Type,
    ) -> Result<OperandId> {
        let result = self.temp(ty);
        self.call(
            Callee::Intrinsic(intrinsic),
            CallArgs::positional(arguments),
            Some(result),
        )?;
        Ok(result)
    }

    pub fn unary(&mut self, token: &str, operand: OperandId, ty: Type) -> Result<OperandId> {
        let result = self.temp(ty);
        let op = Operation::unary(&self.body.arena, result, operand, token)?;
        self.emit(op);
        Ok(result)
    }

    pub fn delete(&mut self, lvalue: OperandId) -> Result<()> {
        let op = Operation::delete(&self.body.arena, lvalue, lvalue)?;
        self.emit(op);
        Ok(())
    }

    pub fn nop(&mut self) {
        self.emit(Operation::Nop);
    }

    pub fn emit_new_elementary(
        &mut self,
        ty: Type,
        arguments: Vec<OperandId>,
    ) -> Result<OperandId> {
        let result = self.temp(ty.clone());
        let op = Operation::new_elementary_type(
            &self.body.arena,
            ty,
            CallArgs::positional(arguments),
            result,
        )?;
        self.emit(op);
        Ok(result)
    }

    pub fn emit_new_structure(
        &mut self,
        structure: &str,
        args: CallArgs,
        ty: Type,
    ) -> Result<OperandId> {
        let result = self.temp(ty);
        let op = Operation::new_structure(&self.body.arena, structure, args, result)?;
        self.emit(op);
        Ok(result)
    }

    pub fn set_signature(&mut self, parameters: Vec<OperandId>, returns: Vec<OperandId>) {
        self.body.parameters = parameters;
        self.body.returns = returns;
    }

    pub fn returns(&self) -> Vec<OperandId> {
        self.body.returns.clone()
    }

    /// Closes every open node with a return of the declared return variables.
    pub fn finish(mut self) -> FunctionBody {
        let returns = self.body.returns.clone();
        for node in &mut self.body.nodes {
            if !node.is_terminated() {
                node.terminator = Terminator::Return(returns.clone());
            }
        }
        self.body
    }
}
