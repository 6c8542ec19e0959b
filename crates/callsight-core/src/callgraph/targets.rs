use crate::function::{Function, FunctionId};
use crate::operations::{Callee, HighLevelTarget, UnresolvedEdge};
use crate::unit::CompilationUnit;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a call edge lands on. Declared in label order so the derived `Ord` sorts like the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Function,
    Solidity,
    Unknown,
    Variable,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Function => "function",
            TargetKind::Solidity => "solidity",
            TargetKind::Unknown => "unknown",
            TargetKind::Variable => "variable",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call edge was made. Declared in label order so the derived `Ord` sorts like the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    BaseConstructor,
    External,
    Internal,
    Library,
    Modifier,
    Solidity,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::BaseConstructor => "base-constructor",
            EdgeKind::External => "external",
            EdgeKind::Internal => "internal",
            EdgeKind::Library => "library",
            EdgeKind::Modifier => "modifier",
            EdgeKind::Solidity => "solidity",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetRef {
    Function(FunctionId),
    Variable(String),
    Builtin(String),
    Unknown,
}

/// One direct call made by a function, before filtering and deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallTarget {
    pub kind: TargetKind,
    pub label: String,
    pub edge: EdgeKind,
    pub target: TargetRef,
    pub target_contract: Option<String>,
}

impl CallTarget {
    fn function(unit: &CompilationUnit, id: FunctionId, edge: EdgeKind) -> Self {
        match unit.function(id) {
            Some(callee) => Self {
                kind: TargetKind::Function,
                label: callee.display_name(),
                edge,
                target: TargetRef::Function(id),
                target_contract: None,
            },
            None => Self::unknown(id.to_string(), edge),
        }
    }

    fn unknown(label: String, edge: EdgeKind) -> Self {
        Self {
            kind: TargetKind::Unknown,
            label,
            edge,
            target: TargetRef::Unknown,
            target_contract: None,
        }
    }
}

/// Direct call targets of `function`, without recursion.
///
/// Targets come in a fixed order: modifiers, explicit base constructors, internal calls, library
/// calls, high-level calls.
pub fn iter_call_targets(unit: &CompilationUnit, function: &Function) -> Vec<CallTarget> {
    let calls = &function.calls;
    let mut targets = Vec::new();

    for id in &calls.modifiers {
        targets.push(CallTarget::function(unit, *id, EdgeKind::Modifier));
    }
    for id in &calls.base_constructors {
        targets.push(CallTarget::function(unit, *id, EdgeKind::BaseConstructor));
    }

    for callee in &calls.internal {
        match callee {
            Callee::Internal(id) => {
                targets.push(CallTarget::function(unit, *id, EdgeKind::Internal))
            }
            Callee::Builtin(name) => targets.push(CallTarget {
                kind: TargetKind::Solidity,
                label: name.clone(),
                edge: EdgeKind::Solidity,
                target: TargetRef::Builtin(name.clone()),
                target_contract: None,
            }),
            Callee::Unresolved {
                edge: UnresolvedEdge::Internal,
                label,
            } => targets.push(CallTarget::unknown(label.clone(), EdgeKind::Internal)),
            _ => {}
        }
    }

    for callee in &calls.library {
        match callee {
            Callee::Library(id) => targets.push(CallTarget::function(unit, *id, EdgeKind::Library)),
            Callee::Unresolved {
                edge: UnresolvedEdge::Library,
                label,
            } => targets.push(CallTarget::unknown(label.clone(), EdgeKind::Library)),
            _ => {}
        }
    }

    for callee in &calls.high_level {
        let Callee::HighLevel { contract, target } = callee else {
            continue;
        };
        let qualified = |name: &str| match contract {
            Some(c) => format!("{}.{}", c, name),
            None => name.to_string(),
        };
        let call_target = match target {
            HighLevelTarget::Function(id) => {
                let mut t = CallTarget::function(unit, *id, EdgeKind::External);
                t.target_contract = contract.clone();
                t
            }
            HighLevelTarget::Variable(name) => CallTarget {
                kind: TargetKind::Variable,
                label: qualified(name),
                edge: EdgeKind::External,
                target: TargetRef::Variable(name.clone()),
                target_contract: contract.clone(),
            },
            HighLevelTarget::Unresolved(label) => CallTarget {
                kind: TargetKind::Unknown,
                label: qualified(label),
                edge: EdgeKind::External,
                target: TargetRef::Unknown,
                target_contract: contract.clone(),
            },
        };
        targets.push(call_target);
    }

    targets
}
