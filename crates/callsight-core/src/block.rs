use crate::operations::Operation;
use crate::source_location::SourceSpan;
use crate::values::OperandId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// SSA merge of one variable at a control-flow join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phi {
    pub lvalue: OperandId,
    pub base: OperandId,
    pub incoming: Vec<(NodeId, OperandId)>,
}

impl Phi {
    pub fn new(lvalue: OperandId, base: OperandId) -> Self {
        Self {
            lvalue,
            base,
            incoming: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    Goto(NodeId),
    Branch {
        condition: OperandId,
        then_node: NodeId,
        else_node: NodeId,
    },
    Return(Vec<OperandId>),
    Revert,
    /// Not yet terminated by the lowering.
    Open,
}

impl Terminator {
    pub fn successors(&self) -> Vec<NodeId> {
        match self {
            Terminator::Goto(target) => vec![*target],
            Terminator::Branch {
                then_node,
                else_node,
                ..
            } => {
                if then_node == else_node {
                    vec![*then_node]
                } else {
                    vec![*then_node, *else_node]
                }
            }
            _ => Vec::new(),
        }
    }

    pub fn read(&self) -> Vec<OperandId> {
        match self {
            Terminator::Branch { condition, .. } => vec![*condition],
            Terminator::Return(values) => values.clone(),
            _ => Vec::new(),
        }
    }

    pub fn map_reads(&mut self, mut f: impl FnMut(OperandId) -> OperandId) {
        match self {
            Terminator::Branch { condition, .. } => *condition = f(*condition),
            Terminator::Return(values) => {
                for value in values.iter_mut() {
                    *value = f(*value);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub phis: Vec<Phi>,
    pub operations: Vec<Operation>,
    pub terminator: Terminator,
    pub source: Option<SourceSpan>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            phis: Vec::new(),
            operations: Vec::new(),
            terminator: Terminator::Open,
            source: None,
        }
    }

    pub fn push(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn is_terminated(&self) -> bool {
        !matches!(self.terminator, Terminator::Open)
    }

    pub fn successors(&self) -> Vec<NodeId> {
        self.terminator.successors()
    }
}
