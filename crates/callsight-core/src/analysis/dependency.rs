//! Variable-level data dependencies.
//!
//! Direct edges come from every operation (lvalue depends on its reads) and every phi (merged value
//! depends on each incoming value). A write through a reference also makes the aliased variable depend
//! on the written value. Edges are closed transitively and projected onto variable names.

use crate::function::FunctionBody;
use crate::operations::{Callee, Intrinsic, Operation};
use crate::unit::CompilationUnit;
use crate::values::{OperandId, OperandKind};
use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Variable name to the names of variables it (transitively) depends on.
pub type DependencyMap = IndexMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDependency {
    /// Keyed by function uid.
    pub functions: IndexMap<String, DependencyMap>,
    /// Keyed by contract name; only state variables are aggregated.
    pub contracts: IndexMap<String, DependencyMap>,
}

impl DataDependency {
    pub fn function(&self, uid: &str) -> Option<&DependencyMap> {
        self.functions.get(uid)
    }

    pub fn contract(&self, name: &str) -> Option<&DependencyMap> {
        self.contracts.get(name)
    }

    pub fn is_dependent(&self, uid: &str, variable: &str, source: &str) -> bool {
        self.functions
            .get(uid)
            .and_then(|deps| deps.get(variable))
            .map(|set| set.contains(source))
            .unwrap_or(false)
    }

    pub fn is_state_dependent(&self, contract: &str, variable: &str, source: &str) -> bool {
        self.contracts
            .get(contract)
            .and_then(|deps| deps.get(variable))
            .map(|set| set.contains(source))
            .unwrap_or(false)
    }
}

/// Computes per-function dependencies and aggregates state variables per contract.
pub fn compute_dependency(unit: &mut CompilationUnit) -> Result<()> {
    let mut result = DataDependency::default();
    for function in &unit.functions {
        let Some(body) = &function.body else {
            continue;
        };
        let deps = function_dependencies(body)?;
        tracing::debug!(function = %function.uid(), variables = deps.len(), "data dependency");
        result.functions.insert(function.uid(), deps);
    }

    for contract in &unit.contracts {
        let mut aggregated: DependencyMap = IndexMap::new();
        for function in unit.functions_of(contract) {
            let (Some(body), Some(deps)) = (&function.body, result.functions.get(&function.uid()))
            else {
                continue;
            };
            let state_names = state_variable_names(body);
            for (name, sources) in deps {
                if !state_names.contains(name) {
                    continue;
                }
                aggregated
                    .entry(name.clone())
                    .or_default()
                    .extend(sources.iter().cloned());
            }
        }
        result.contracts.insert(contract.name.clone(), aggregated);
    }

    unit.data_dependency = result;
    Ok(())
}

fn state_variable_names(body: &FunctionBody) -> HashSet<String> {
    body.arena
        .iter()
        .filter_map(|(_, op)| match &op.kind {
            OperandKind::State { name } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

pub fn function_dependencies(body: &FunctionBody) -> Result<DependencyMap> {
    let arena = &body.arena;
    let mut direct: HashMap<OperandId, Vec<OperandId>> = HashMap::new();

    for node in &body.nodes {
        for phi in &node.phis {
            let entry = direct.entry(phi.lvalue).or_default();
            entry.extend(phi.incoming.iter().map(|(_, v)| *v));
        }
        for op in &node.operations {
            let Some(lvalue) = op.lvalue() else {
                continue;
            };
            let reads = op.read();
            direct.entry(lvalue).or_default().extend(reads.iter().copied());
            if arena.get(lvalue)?.is_reference() && !defines_reference(op) {
                let target = arena.resolve_points_to(lvalue)?;
                if target != lvalue {
                    direct.entry(target).or_default().extend(reads.iter().copied());
                }
            }
        }
    }

    let mut result: DependencyMap = IndexMap::new();
    let mut defined: Vec<OperandId> = direct.keys().copied().collect();
    defined.sort();
    for start in defined {
        let Some(name) = variable_name(body, start) else {
            continue;
        };
        let mut seen = HashSet::new();
        let mut stack = direct.get(&start).cloned().unwrap_or_default();
        let mut sources = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(source) = variable_name(body, current) {
                if source != name {
                    sources.insert(source);
                }
            }
            if let Some(next) = direct.get(&current) {
                stack.extend(next.iter().copied());
            }
        }
        result.entry(name).or_default().extend(sources);
    }
    Ok(result)
}

/// Index and member accesses bind a reference; they do not write through it.
fn defines_reference(op: &Operation) -> bool {
    matches!(
        op.callee(),
        Some(Callee::Intrinsic(Intrinsic::Index | Intrinsic::Member(_)))
    )
}

fn variable_name(body: &FunctionBody, id: OperandId) -> Option<String> {
    let base = body.arena.non_ssa(id);
    match &body.arena.get(base).ok()?.kind {
        OperandKind::State { name } | OperandKind::Local { name } => Some(name.clone()),
        _ => None,
    }
}
