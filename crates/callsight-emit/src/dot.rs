//! Graphviz projection of one compilation report.

use crate::report::CompilationReport;
use callsight_core::{CallEntry, EdgeKind, TargetKind};
use std::collections::{BTreeMap, BTreeSet};

fn escape(text: &str) -> String {
    text.replace("\\\\", "\\\\\\\\").replace('"', "\\\"")
}

fn edge_color(edge: EdgeKind) -> &'static str {
    match edge {
        EdgeKind::Internal => "black",
        EdgeKind::External => "red",
        EdgeKind::Library => "blue",
        EdgeKind::Modifier => "gray40",
        EdgeKind::BaseConstructor => "purple4",
        EdgeKind::Solidity => "darkorange3",
    }
}

/// Renders the call graph of `compilation` as a DOT digraph.
///
/// Reported functions are boxes labelled with their visibility. Callees keep the first label they
/// were seen with; non-function targets are keyed `kind::label` and drawn as ellipses (unknown,
/// variable) or diamonds (builtins). Nodes and edges are emitted in sorted order.
pub fn render_callgraph_dot(compilation: &CompilationReport) -> String {
    let mut nodes: BTreeMap<String, (String, &'static str)> = BTreeMap::new();
    let mut edges: BTreeSet<(String, String, EdgeKind)> = BTreeSet::new();

    for contract in &compilation.contracts {
        for (visibility, function) in contract.nodes() {
            nodes.insert(
                function.id.clone(),
                (format!("{}\\n[{}]", function.display, visibility), "box"),
            );

            for call in &function.calls {
                let destination = match call {
                    CallEntry::Function { id, display, .. } => {
                        nodes
                            .entry(id.clone())
                            .or_insert_with(|| (display.clone(), "box"));
                        id.clone()
                    }
                    other => {
                        let kind = other.kind();
                        let label = other.label().to_string();
                        let key = format!("{}::{}", kind.as_str(), label);
                        let shape = match kind {
                            TargetKind::Unknown | TargetKind::Variable => "ellipse",
                            _ => "diamond",
                        };
                        nodes.entry(key.clone()).or_insert((label, shape));
                        key
                    }
                };
                edges.insert((function.id.clone(), destination, call.edge()));
            }
        }
    }

    let mut lines = vec![
        "digraph \"callgraph\" {".to_string(),
        "  rankdir=LR;".to_string(),
        "  node [fontsize=10];".to_string(),
    ];
    for (id, (label, shape)) in &nodes {
        lines.push(format!(
            "  \"{}\" [label=\"{}\", shape=\"{}\"];",
            escape(id),
            escape(label),
            shape
        ));
    }
    let mut edges: Vec<_> = edges.into_iter().collect();
    edges.sort_by(|a, b| (&a.0, &a.1, a.2.as_str()).cmp(&(&b.0, &b.1, b.2.as_str())));
    for (source, destination, edge) in edges {
        lines.push(format!(
            "  \"{}\" -> \"{}\" [label=\"{}\", color=\"{}\"];",
            escape(&source),
            escape(&destination),
            edge.as_str(),
            edge_color(edge)
        ));
    }
    lines.push("}".to_string());

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ContractReport;
    use callsight_core::{FunctionNode, Visibility};
    use indexmap::IndexMap;

    fn node(id: &str, display: &str, calls: Vec<CallEntry>) -> FunctionNode {
        FunctionNode {
            id: id.to_string(),
            name: display.to_string(),
            display: display.to_string(),
            visibility: Some(Visibility::External),
            visibility_defaulted: false,
            contract_context: Some("Vault".to_string()),
            declared_in: Some("Vault".to_string()),
            is_constructor: false,
            is_fallback: false,
            is_receive: false,
            is_shadowed: false,
            calls,
        }
    }

    #[test]
    fn test_render_small_graph() {
        let calls = vec![
            CallEntry::Unknown {
                edge: EdgeKind::External,
                display: "IERC20.transfer(address,uint256)".to_string(),
            },
            CallEntry::Solidity {
                edge: EdgeKind::Solidity,
                name: "require(bool)".to_string(),
            },
        ];
        let mut functions = IndexMap::new();
        functions.insert(
            Visibility::External,
            vec![node("Vault::Vault.pay()", "Vault.pay()", calls)],
        );
        let compilation = CompilationReport {
            target: "Vault.sol".to_string(),
            contracts: vec![ContractReport {
                name: "Vault".to_string(),
                functions,
            }],
        };

        insta::assert_snapshot!(render_callgraph_dot(&compilation), @r###"
        digraph "callgraph" {
          rankdir=LR;
          node [fontsize=10];
          "Vault::Vault.pay()" [label="Vault.pay()\n[external]", shape="box"];
          "solidity::require(bool)" [label="require(bool)", shape="diamond"];
          "unknown::IERC20.transfer(address,uint256)" [label="IERC20.transfer(address,uint256)", shape="ellipse"];
          "Vault::Vault.pay()" -> "solidity::require(bool)" [label="solidity", color="darkorange3"];
          "Vault::Vault.pay()" -> "unknown::IERC20.transfer(address,uint256)" [label="external", color="red"];
        }
        "###);
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(escape("say \"hi\""), "say \\\"hi\\\"");
    }
}
