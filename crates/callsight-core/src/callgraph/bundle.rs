use super::edges::CallFilters;
use super::targets::{iter_call_targets, EdgeKind, TargetKind, TargetRef};
use crate::function::FunctionId;
use crate::unit::CompilationUnit;
use crate::{IrError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Leaf classification in a bundle. Declared in label order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafKind {
    /// Function without a body (interface or abstract).
    Abstract,
    Solidity,
    Unknown,
    Variable,
}

impl LeafKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeafKind::Abstract => "abstract",
            LeafKind::Solidity => "solidity",
            LeafKind::Unknown => "unknown",
            LeafKind::Variable => "variable",
        }
    }
}

/// A call target with no code to expand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BundleLeaf {
    pub edge: EdgeKind,
    pub kind: LeafKind,
    pub label: String,
}

/// Everything transitively reachable from one entry function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub entry: FunctionId,
    /// Reached functions in discovery order, with the edge they were first reached through.
    pub reachable: Vec<(EdgeKind, FunctionId)>,
    pub leaves: BTreeSet<BundleLeaf>,
}

/// Expands the call graph from `entry` until no unseen implemented function remains.
///
/// Functions are keyed by uid, so mutual recursion terminates. Each expanded function contributes
/// its leaves sorted on `(edge, kind, label)` and its function targets sorted on `(edge, uid)`.
pub fn transitive_bundle(
    unit: &CompilationUnit,
    entry: FunctionId,
    filters: &CallFilters,
) -> Result<Bundle> {
    let root = unit
        .function(entry)
        .ok_or_else(|| IrError::Resolution(format!("no function with id {}", entry)))?;

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(root.uid());
    let mut reachable = Vec::new();
    let mut leaves = BTreeSet::new();
    let mut pending = vec![entry];

    while let Some(current_id) = pending.pop() {
        let Some(current) = unit.function(current_id) else {
            continue;
        };
        let mut fn_targets: Vec<(EdgeKind, String, FunctionId)> = Vec::new();
        let mut local_leaves: Vec<BundleLeaf> = Vec::new();

        for call in iter_call_targets(unit, current) {
            if !filters.keeps(call.edge) {
                continue;
            }
            match (call.kind, &call.target) {
                (TargetKind::Function, TargetRef::Function(id)) => match unit.function(*id) {
                    Some(callee) if callee.is_implemented => {
                        fn_targets.push((call.edge, callee.uid(), *id));
                    }
                    Some(callee) => local_leaves.push(BundleLeaf {
                        edge: call.edge,
                        kind: LeafKind::Abstract,
                        label: callee.display_name(),
                    }),
                    None => local_leaves.push(BundleLeaf {
                        edge: call.edge,
                        kind: LeafKind::Unknown,
                        label: call.label.clone(),
                    }),
                },
                (TargetKind::Variable, _) => local_leaves.push(BundleLeaf {
                    edge: call.edge,
                    kind: LeafKind::Variable,
                    label: call.label.clone(),
                }),
                (TargetKind::Solidity, _) => local_leaves.push(BundleLeaf {
                    edge: call.edge,
                    kind: LeafKind::Solidity,
                    label: call.label.clone(),
                }),
                _ => local_leaves.push(BundleLeaf {
                    edge: call.edge,
                    kind: LeafKind::Unknown,
                    label: call.label.clone(),
                }),
            }
        }

        local_leaves.sort();
        leaves.extend(local_leaves);

        fn_targets.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        for (edge, uid, id) in fn_targets {
            if !seen.insert(uid) {
                continue;
            }
            reachable.push((edge, id));
            pending.push(id);
        }
    }

    Ok(Bundle {
        entry,
        reachable,
        leaves,
    })
}
