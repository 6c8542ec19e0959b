//! JSON report of per-function call edges, grouped by contract and visibility.

use anyhow::Result;
use callsight_core::{
    build_function_call_edges, contract_functions_by_visibility, CallFilters, CompilationUnit,
    ErrorRecord, FunctionNode, Language, Visibility, VisibilityQuery,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TOOL_NAME: &str = "callsight";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub tool: String,
    pub targets: Vec<String>,
    pub compilations: Vec<CompilationReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorRecord>,
}

impl Report {
    pub fn new(targets: Vec<String>) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            targets,
            compilations: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationReport {
    pub target: String,
    pub contracts: Vec<ContractReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractReport {
    pub name: String,
    pub functions: IndexMap<Visibility, Vec<FunctionNode>>,
}

impl ContractReport {
    pub fn is_empty(&self) -> bool {
        self.functions.values().all(Vec::is_empty)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (Visibility, &FunctionNode)> {
        self.functions
            .iter()
            .flat_map(|(visibility, nodes)| nodes.iter().map(move |node| (*visibility, node)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub filters: CallFilters,
    pub query: VisibilityQuery,
}

/// Builds the report entry of one analyzed unit.
///
/// Contracts are ordered by `(name, file)`. A Solidity contract with no reported function is left
/// out; a Vyper module is always listed since it is the whole compilation.
pub fn build_compilation(
    unit: &CompilationUnit,
    target: &str,
    options: &ReportOptions,
) -> Result<CompilationReport> {
    let mut contracts: Vec<_> = unit.contracts.iter().collect();
    contracts.sort_by_key(|c| {
        (
            c.name.clone(),
            c.source.as_ref().map(|s| s.file.clone()).unwrap_or_default(),
        )
    });

    let mut entries = Vec::new();
    for contract in contracts {
        let groups = contract_functions_by_visibility(unit, contract, &options.query);
        let mut functions = IndexMap::new();
        for (visibility, ids) in groups {
            let nodes = ids
                .into_iter()
                .map(|id| build_function_call_edges(unit, id, &options.filters))
                .collect::<callsight_core::Result<Vec<_>>>()?;
            functions.insert(visibility, nodes);
        }
        let entry = ContractReport {
            name: contract.name.clone(),
            functions,
        };
        if entry.is_empty() && unit.language != Language::Vyper {
            continue;
        }
        entries.push(entry);
    }

    tracing::debug!(file = %target, contracts = entries.len(), "built compilation report");
    Ok(CompilationReport {
        target: target.to_string(),
        contracts: entries,
    })
}

/// Pretty-printed JSON with every object's keys sorted, newline terminated.
///
/// Going through [`Value`] sorts the keys: `serde_json::Map` is a `BTreeMap` without the
/// `preserve_order` feature.
pub fn report_to_json(report: &Report) -> Result<String> {
    let value = serde_json::to_value(report)?;
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_report_keys_are_sorted() {
        let mut functions = IndexMap::new();
        functions.insert(Visibility::Public, Vec::new());
        functions.insert(Visibility::External, Vec::new());
        let mut report = Report::new(vec!["A.sol".to_string()]);
        report.compilations.push(CompilationReport {
            target: "A.sol".to_string(),
            contracts: vec![ContractReport {
                name: "A".to_string(),
                functions,
            }],
        });

        let text = report_to_json(&report).unwrap();
        let position = |key: &str| text.find(&format!("\"{}\"", key)).unwrap();
        assert!(position("compilations") < position("targets"));
        assert!(position("targets") < position("tool"));
        assert!(position("contracts") < position("target"));
        assert!(position("external") < position("public"));
    }

    #[test]
    fn test_errors_are_omitted_when_empty() {
        let mut report = Report::new(vec!["A.sol".to_string()]);
        let text = report_to_json(&report).unwrap();
        assert!(!text.contains("errors"));
        assert!(text.ends_with("}\n"));

        report
            .errors
            .push(ErrorRecord::new("A.sol", "vyper", "boom"));
        let value: Value = serde_json::from_str(&report_to_json(&report).unwrap()).unwrap();
        assert_eq!(
            value["errors"],
            json!([{"error": "boom", "stage": "vyper", "target": "A.sol"}])
        );
        assert_eq!(value["tool"], json!("callsight"));
    }
}
