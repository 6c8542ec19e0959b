use crate::contract::Contract;
use crate::function::{FunctionId, Visibility};
use crate::unit::CompilationUnit;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityQuery {
    pub include_inherited: bool,
    pub include_shadowed: bool,
    /// `None` keeps every visibility.
    pub visibilities: Option<Vec<Visibility>>,
}

impl Default for VisibilityQuery {
    fn default() -> Self {
        Self {
            include_inherited: true,
            include_shadowed: false,
            visibilities: None,
        }
    }
}

impl VisibilityQuery {
    pub fn only(visibilities: &[Visibility]) -> Self {
        Self {
            visibilities: Some(visibilities.to_vec()),
            ..Self::default()
        }
    }

    fn wants(&self, visibility: Visibility) -> bool {
        self.visibilities
            .as_ref()
            .map(|v| v.contains(&visibility))
            .unwrap_or(true)
    }
}

/// Implemented functions of `contract` grouped by visibility.
///
/// The map always has the four groups, in `external, public, internal, private` order. Shadowed
/// functions are dropped unless requested, except fallbacks. Each group is sorted by
/// `(display, uid)`.
pub fn contract_functions_by_visibility(
    unit: &CompilationUnit,
    contract: &Contract,
    query: &VisibilityQuery,
) -> IndexMap<Visibility, Vec<FunctionId>> {
    let mut groups: IndexMap<Visibility, Vec<(String, String, FunctionId)>> = Visibility::ALL
        .iter()
        .map(|v| (*v, Vec::new()))
        .collect();

    let candidates = if query.include_inherited {
        &contract.functions
    } else {
        &contract.functions_declared
    };

    for function in candidates.iter().filter_map(|id| unit.function(*id)) {
        if function.is_modifier() || !query.wants(function.visibility) || !function.is_implemented {
            continue;
        }
        if !query.include_shadowed && function.is_shadowed && !function.is_fallback() {
            continue;
        }
        groups.entry(function.visibility).or_default().push((
            function.display_name(),
            function.uid(),
            function.id,
        ));
    }

    groups
        .into_iter()
        .map(|(visibility, mut functions)| {
            functions.sort();
            (visibility, functions.into_iter().map(|(_, _, id)| id).collect())
        })
        .collect()
}
