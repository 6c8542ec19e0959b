//! SSA construction on lowered function bodies.
//!
//! Nodes are renamed in reverse postorder. A node is sealed once every reachable predecessor has
//! been filled; reads in unsealed nodes (loop headers) create incomplete phis that are completed
//! when the node is sealed.

use crate::block::{NodeId, Phi, Terminator};
use crate::function::FunctionBody;
use crate::values::{OperandId, OperandKind};
use crate::Result;
use std::collections::{HashMap, HashSet};

pub fn convert_to_ssa(body: &mut FunctionBody) -> Result<()> {
    if body.is_ssa {
        return Ok(());
    }
    let order = body.reverse_postorder();
    let reachable: HashSet<NodeId> = order.iter().copied().collect();
    let preds = body
        .predecessors()
        .into_iter()
        .map(|list| {
            list.into_iter()
                .filter(|p| reachable.contains(p))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut builder = SsaBuilder {
        body: &mut *body,
        preds,
        defs: HashMap::new(),
        sealed: HashSet::new(),
        filled: HashSet::new(),
        incomplete: HashMap::new(),
    };

    for node in &order {
        builder.try_seal_all(&order)?;
        builder.rename_node(*node)?;
        builder.filled.insert(*node);
    }
    builder.try_seal_all(&order)?;

    body.is_ssa = true;
    Ok(())
}

struct SsaBuilder<'a> {
    body: &'a mut FunctionBody,
    preds: Vec<Vec<NodeId>>,
    defs: HashMap<(NodeId, OperandId), OperandId>,
    sealed: HashSet<NodeId>,
    filled: HashSet<NodeId>,
    incomplete: HashMap<NodeId, Vec<(OperandId, usize)>>,
}

impl SsaBuilder<'_> {
    fn preds_of(&self, node: NodeId) -> Vec<NodeId> {
        self.preds.get(node.0 as usize).cloned().unwrap_or_default()
    }

    fn try_seal_all(&mut self, order: &[NodeId]) -> Result<()> {
        for node in order {
            if self.sealed.contains(node) {
                continue;
            }
            let ready = self.preds_of(*node).iter().all(|p| self.filled.contains(p));
            if ready {
                self.seal(*node)?;
            }
        }
        Ok(())
    }

    fn seal(&mut self, node: NodeId) -> Result<()> {
        self.sealed.insert(node);
        if let Some(pending) = self.incomplete.remove(&node) {
            for (var, phi_idx) in pending {
                self.add_phi_operands(var, node, phi_idx)?;
            }
        }
        Ok(())
    }

    fn rename_node(&mut self, node: NodeId) -> Result<()> {
        let Some(current) = self.body.node_mut(node) else {
            return Ok(());
        };
        let mut operations = std::mem::take(&mut current.operations);
        let mut terminator = std::mem::replace(&mut current.terminator, Terminator::Open);

        for op in operations.iter_mut() {
            let renamed = self.rename_reads(node, &op.read())?;
            op.map_reads(|id| renamed.get(&id).copied().unwrap_or(id));
            if let Some(lvalue) = op.lvalue() {
                let new_lvalue = self.rename_write(node, lvalue)?;
                op.map_lvalue(|_| new_lvalue);
            }
        }
        let renamed = self.rename_reads(node, &terminator.read())?;
        terminator.map_reads(|id| renamed.get(&id).copied().unwrap_or(id));

        if let Some(current) = self.body.node_mut(node) {
            current.operations = operations;
            current.terminator = terminator;
        }
        Ok(())
    }

    fn rename_reads(
        &mut self,
        node: NodeId,
        reads: &[OperandId],
    ) -> Result<HashMap<OperandId, OperandId>> {
        let mut renamed = HashMap::new();
        for id in reads {
            if renamed.contains_key(id) {
                continue;
            }
            let new_id = self.rename_read(node, *id)?;
            renamed.insert(*id, new_id);
        }
        Ok(renamed)
    }

    fn rename_read(&mut self, node: NodeId, id: OperandId) -> Result<OperandId> {
        let operand = self.body.arena.get(id)?;
        if operand.ssa.is_some() {
            return Ok(id);
        }
        let is_variable = operand.kind.is_variable();
        let is_ir = operand.kind.is_ir_introduced();
        if is_variable {
            self.read_variable(id, node)
        } else if is_ir {
            self.body.arena.ssa_variant(id)
        } else {
            Ok(id)
        }
    }

    fn rename_write(&mut self, node: NodeId, id: OperandId) -> Result<OperandId> {
        let operand = self.body.arena.get(id)?.clone();
        if operand.ssa.is_some() {
            return Ok(id);
        }
        match operand.kind {
            OperandKind::State { .. } | OperandKind::Local { .. } => {
                let version = self.body.arena.new_version(id)?;
                self.defs.insert((node, id), version);
                Ok(version)
            }
            OperandKind::Reference { points_to, .. } => {
                let variant = self.body.arena.ssa_variant(id)?;
                let unbound = matches!(
                    self.body.arena.get(variant)?.kind,
                    OperandKind::Reference { points_to: None, .. }
                );
                if let (Some(target), true) = (points_to, unbound) {
                    let renamed_target = self.rename_read(node, target)?;
                    self.body.arena.set_points_to(variant, renamed_target)?;
                }
                Ok(variant)
            }
            OperandKind::Temporary { .. } | OperandKind::Tuple { .. } => {
                self.body.arena.ssa_variant(id)
            }
            _ => Ok(id),
        }
    }

    fn read_variable(&mut self, var: OperandId, node: NodeId) -> Result<OperandId> {
        if let Some(value) = self.defs.get(&(node, var)) {
            return Ok(*value);
        }
        let preds = self.preds_of(node);
        let value = if !self.sealed.contains(&node) {
            let (value, phi_idx) = self.push_phi(var, node)?;
            self.incomplete.entry(node).or_default().push((var, phi_idx));
            value
        } else if preds.is_empty() {
            self.body.arena.entry_version(var)?
        } else if preds.len() == 1 {
            self.read_variable(var, preds[0])?
        } else {
            let (value, phi_idx) = self.push_phi(var, node)?;
            self.defs.insert((node, var), value);
            self.add_phi_operands(var, node, phi_idx)?;
            value
        };
        self.defs.insert((node, var), value);
        Ok(value)
    }

    fn push_phi(&mut self, var: OperandId, node: NodeId) -> Result<(OperandId, usize)> {
        let value = self.body.arena.new_version(var)?;
        let phis = match self.body.node_mut(node) {
            Some(n) => &mut n.phis,
            None => return Ok((value, 0)),
        };
        phis.push(Phi::new(value, var));
        Ok((value, phis.len() - 1))
    }

    fn add_phi_operands(&mut self, var: OperandId, node: NodeId, phi_idx: usize) -> Result<()> {
        for pred in self.preds_of(node) {
            let value = self.read_variable(var, pred)?;
            if let Some(phi) = self
                .body
                .node_mut(node)
                .and_then(|n| n.phis.get_mut(phi_idx))
            {
                phi.incoming.push((pred, value));
            }
        }
        Ok(())
    }
}
