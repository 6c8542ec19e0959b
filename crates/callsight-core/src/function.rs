use crate::block::{Node, NodeId};
use crate::operations::{Callee, Operation};
use crate::source_location::SourceSpan;
use crate::types::Type;
use crate::values::{OperandArena, OperandId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    Function,
    Constructor,
    Fallback,
    Receive,
    Modifier,
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    External,
    Public,
    Internal,
    Private,
}

impl Visibility {
    pub const ALL: [Visibility; 4] = [
        Visibility::External,
        Visibility::Public,
        Visibility::Internal,
        Visibility::Private,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::External => "external",
            Visibility::Public => "public",
            Visibility::Internal => "internal",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "external" => Some(Visibility::External),
            "public" => Some(Visibility::Public),
            "internal" => Some(Visibility::Internal),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call sites of a function, pre-classified by how they were resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSites {
    pub modifiers: Vec<FunctionId>,
    pub base_constructors: Vec<FunctionId>,
    /// `Internal`, `Builtin` or internal `Unresolved` callees.
    pub internal: Vec<Callee>,
    /// `Library` or library `Unresolved` callees.
    pub library: Vec<Callee>,
    /// `HighLevel` callees.
    pub high_level: Vec<Callee>,
}

impl CallSites {
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
            && self.base_constructors.is_empty()
            && self.internal.is_empty()
            && self.library.is_empty()
            && self.high_level.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Lowered body of an implemented function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionBody {
    pub arena: OperandArena,
    pub nodes: Vec<Node>,
    pub entry: Option<NodeId>,
    pub parameters: Vec<OperandId>,
    pub returns: Vec<OperandId>,
    pub is_ssa: bool,
}

impl FunctionBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id));
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.nodes.iter().flat_map(|n| n.operations.iter())
    }

    pub fn predecessors(&self) -> Vec<Vec<NodeId>> {
        let mut preds = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            for succ in node.successors() {
                if let Some(list) = preds.get_mut(succ.0 as usize) {
                    if !list.contains(&node.id) {
                        list.push(node.id);
                    }
                }
            }
        }
        preds
    }

    /// Nodes reachable from the entry, in reverse postorder.
    pub fn reverse_postorder(&self) -> Vec<NodeId> {
        let Some(entry) = self.entry else {
            return Vec::new();
        };
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();
        let mut stack = vec![(entry, 0usize)];
        visited.insert(entry);
        while let Some((node, child)) = stack.pop() {
            let succs = self
                .node(node)
                .map(|n| n.successors())
                .unwrap_or_default();
            if let Some(next) = succs.get(child).copied() {
                stack.push((node, child + 1));
                if visited.insert(next) {
                    stack.push((next, 0));
                }
            } else {
                postorder.push(node);
            }
        }
        postorder.reverse();
        postorder
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    /// `name(type,...)`.
    pub full_name: String,
    /// `Declarer.name(type,...)`.
    pub canonical_name: String,
    pub contract_context: Option<String>,
    pub declarer: Option<String>,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    /// Visibility was not annotated in source and fell back to `external`.
    pub visibility_defaulted: bool,
    pub is_implemented: bool,
    pub is_shadowed: bool,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<Parameter>,
    pub calls: CallSites,
    pub body: Option<FunctionBody>,
    pub source: Option<SourceSpan>,
    pub ast_id: Option<i64>,
}

impl Function {
    pub fn new(id: FunctionId, name: impl Into<String>, kind: FunctionKind) -> Self {
        let name = name.into();
        Self {
            id,
            full_name: format!("{}()", name),
            canonical_name: format!("{}()", name),
            name,
            contract_context: None,
            declarer: None,
            kind,
            visibility: Visibility::Public,
            visibility_defaulted: false,
            is_implemented: false,
            is_shadowed: false,
            parameters: Vec::new(),
            returns: Vec::new(),
            calls: CallSites::default(),
            body: None,
            source: None,
            ast_id: None,
        }
    }

    /// Recomputes `full_name` and `canonical_name` from the parameter list and declarer.
    pub fn set_signature(&mut self, parameters: Vec<Parameter>) {
        let types = parameters
            .iter()
            .map(|p| p.ty.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.full_name = format!("{}({})", self.name, types);
        self.canonical_name = match &self.declarer {
            Some(declarer) => format!("{}.{}", declarer, self.full_name),
            None => self.full_name.clone(),
        };
        self.parameters = parameters;
    }

    /// Names the function by its bare name, without a signature.
    pub fn set_bare_names(&mut self) {
        self.full_name = self.name.clone();
        self.canonical_name = self.name.clone();
    }

    pub fn uid(&self) -> String {
        match &self.contract_context {
            Some(ctx) => format!("{}::{}", ctx, self.canonical_name),
            None => self.full_name.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        match &self.contract_context {
            Some(ctx) => format!("{}.{}", ctx, self.full_name),
            None => self.full_name.clone(),
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor
    }

    pub fn is_fallback(&self) -> bool {
        self.kind == FunctionKind::Fallback
    }

    pub fn is_receive(&self) -> bool {
        self.kind == FunctionKind::Receive
    }

    pub fn is_modifier(&self) -> bool {
        self.kind == FunctionKind::Modifier
    }
}
