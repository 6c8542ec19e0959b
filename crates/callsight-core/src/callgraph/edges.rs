use super::targets::{iter_call_targets, EdgeKind, TargetKind, TargetRef};
use crate::function::{Function, FunctionId, Visibility};
use crate::unit::CompilationUnit;
use crate::{IrError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which edge kinds survive into the call graph. Internal edges are never filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFilters {
    pub include_external_calls: bool,
    pub include_library_calls: bool,
    pub include_solidity_calls: bool,
    pub include_modifiers: bool,
    pub include_base_constructors: bool,
}

impl Default for CallFilters {
    fn default() -> Self {
        Self {
            include_external_calls: true,
            include_library_calls: true,
            include_solidity_calls: false,
            include_modifiers: true,
            include_base_constructors: true,
        }
    }
}

impl CallFilters {
    pub fn keeps(&self, edge: EdgeKind) -> bool {
        match edge {
            EdgeKind::External => self.include_external_calls,
            EdgeKind::Library => self.include_library_calls,
            EdgeKind::Solidity => self.include_solidity_calls,
            EdgeKind::Modifier => self.include_modifiers,
            EdgeKind::BaseConstructor => self.include_base_constructors,
            EdgeKind::Internal => true,
        }
    }
}

/// One deduplicated outgoing call of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CallEntry {
    Function {
        edge: EdgeKind,
        id: String,
        name: String,
        display: String,
        visibility: Option<Visibility>,
        contract_context: Option<String>,
        declared_in: Option<String>,
    },
    Variable {
        edge: EdgeKind,
        name: String,
        display: String,
        contract: Option<String>,
    },
    Solidity {
        edge: EdgeKind,
        name: String,
    },
    Unknown {
        edge: EdgeKind,
        display: String,
    },
}

impl CallEntry {
    pub fn edge(&self) -> EdgeKind {
        match self {
            CallEntry::Function { edge, .. }
            | CallEntry::Variable { edge, .. }
            | CallEntry::Solidity { edge, .. }
            | CallEntry::Unknown { edge, .. } => *edge,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            CallEntry::Function { .. } => TargetKind::Function,
            CallEntry::Variable { .. } => TargetKind::Variable,
            CallEntry::Solidity { .. } => TargetKind::Solidity,
            CallEntry::Unknown { .. } => TargetKind::Unknown,
        }
    }

    /// `display` when the entry has one, otherwise `name`.
    pub fn label(&self) -> &str {
        match self {
            CallEntry::Function { display, .. }
            | CallEntry::Variable { display, .. }
            | CallEntry::Unknown { display, .. } => display,
            CallEntry::Solidity { name, .. } => name,
        }
    }

    /// Function uid for function entries.
    pub fn id(&self) -> Option<&str> {
        match self {
            CallEntry::Function { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// A function together with its direct, classified calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename = "function")]
pub struct FunctionNode {
    pub id: String,
    pub name: String,
    pub display: String,
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub visibility_defaulted: bool,
    pub contract_context: Option<String>,
    pub declared_in: Option<String>,
    pub is_constructor: bool,
    pub is_fallback: bool,
    pub is_receive: bool,
    pub is_shadowed: bool,
    pub calls: Vec<CallEntry>,
}

impl FunctionNode {
    pub fn for_function(function: &Function) -> Self {
        Self {
            id: function.uid(),
            name: function.full_name.clone(),
            display: function.display_name(),
            visibility: Some(function.visibility),
            visibility_defaulted: function.visibility_defaulted,
            contract_context: function.contract_context.clone(),
            declared_in: function.declarer.clone(),
            is_constructor: function.is_constructor(),
            is_fallback: function.is_fallback(),
            is_receive: function.is_receive(),
            is_shadowed: function.is_shadowed,
            calls: Vec::new(),
        }
    }
}

fn function_entry(edge: EdgeKind, callee: &Function) -> CallEntry {
    CallEntry::Function {
        edge,
        id: callee.uid(),
        name: callee.full_name.clone(),
        display: callee.display_name(),
        visibility: Some(callee.visibility),
        contract_context: callee.contract_context.clone(),
        declared_in: callee.declarer.clone(),
    }
}

/// Builds the call-graph record of `root`.
///
/// Calls are deduplicated on `(edge, kind, identity)` and sorted on `(edge, kind, label)`.
/// A call to a function without a body is reported as an `unknown` target.
pub fn build_function_call_edges(
    unit: &CompilationUnit,
    root: FunctionId,
    filters: &CallFilters,
) -> Result<FunctionNode> {
    let function = unit
        .function(root)
        .ok_or_else(|| IrError::Resolution(format!("no function with id {}", root)))?;
    let mut node = FunctionNode::for_function(function);

    let mut seen: HashSet<(EdgeKind, TargetKind, String)> = HashSet::new();
    let mut calls = Vec::new();

    for target in iter_call_targets(unit, function) {
        if !filters.keeps(target.edge) {
            continue;
        }
        let (key, entry) = match (&target.kind, &target.target) {
            (TargetKind::Function, TargetRef::Function(id)) => {
                let Some(callee) = unit.function(*id) else {
                    continue;
                };
                if !callee.is_implemented {
                    let display = callee.display_name();
                    (
                        (target.edge, TargetKind::Unknown, display.clone()),
                        CallEntry::Unknown {
                            edge: target.edge,
                            display,
                        },
                    )
                } else {
                    (
                        (target.edge, TargetKind::Function, callee.uid()),
                        function_entry(target.edge, callee),
                    )
                }
            }
            (TargetKind::Variable, TargetRef::Variable(name)) => (
                (target.edge, TargetKind::Variable, target.label.clone()),
                CallEntry::Variable {
                    edge: target.edge,
                    name: name.clone(),
                    display: target.label.clone(),
                    contract: target.target_contract.clone(),
                },
            ),
            (TargetKind::Solidity, TargetRef::Builtin(name)) => (
                (target.edge, TargetKind::Solidity, name.clone()),
                CallEntry::Solidity {
                    edge: target.edge,
                    name: name.clone(),
                },
            ),
            _ => (
                (target.edge, TargetKind::Unknown, target.label.clone()),
                CallEntry::Unknown {
                    edge: target.edge,
                    display: target.label.clone(),
                },
            ),
        };
        if seen.insert(key) {
            calls.push(entry);
        }
    }

    calls.sort_by(|a, b| {
        (a.edge(), a.kind(), a.label()).cmp(&(b.edge(), b.kind(), b.label()))
    });
    node.calls = calls;
    Ok(node)
}
