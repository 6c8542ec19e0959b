/*! Front-end tests over small compiler outputs.
 *
 * Solidity tests load a hand-trimmed compact AST of a vault, its library and the token interface it
 * calls. Vyper tests feed a fixed module AST through a stub compiler and compare the result with the
 * textual scanner on the same source.
 */

#![allow(unused_imports)]

mod vyper_tests;

use callsight_core::{build_function_call_edges, CallFilters, CompilationUnit};

/// `(edge, kind, label)` rows of a function's call-graph record.
pub(crate) fn edge_summary(
    unit: &CompilationUnit,
    uid: &str,
    filters: &CallFilters,
) -> Vec<(String, String, String)> {
    let function = unit
        .function_by_uid(uid)
        .unwrap_or_else(|| panic!("no function {}", uid));
    build_function_call_edges(unit, function.id, filters)
        .unwrap()
        .calls
        .iter()
        .map(|c| (c.edge().to_string(), c.kind().to_string(), c.label().to_string()))
        .collect()
}

pub(crate) fn row(edge: &str, kind: &str, label: &str) -> (String, String, String) {
    (edge.to_string(), kind.to_string(), label.to_string())
}
