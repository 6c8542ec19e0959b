//! Second phase of top-level declarations: turn the captured AST node into typed elements.

use super::ast::AstNode;
use crate::errors::{Result, TransformError};
use callsight_core::{
    EventParam, StructureElems, TopLevel, TopLevelKind, Type, UsingForEntry,
};
use serde_json::Value;

/// Empty placeholder kind for a declaration node, filled later by [`analyze_declaration`].
pub fn pending_kind(node: AstNode<'_>) -> Option<TopLevelKind> {
    let kind = match node.node_type() {
        "EventDefinition" => TopLevelKind::Event {
            elems: Vec::new(),
            anonymous: false,
        },
        "StructDefinition" => TopLevelKind::Structure {
            elements: StructureElems::new(),
        },
        "EnumDefinition" => TopLevelKind::Enum { values: Vec::new() },
        "ErrorDefinition" => TopLevelKind::CustomError {
            parameters: Vec::new(),
        },
        "UsingForDirective" => TopLevelKind::UsingFor { table: Vec::new() },
        _ => return None,
    };
    Some(kind)
}

/// Registration name of a declaration node. Using-for directives have no name and are keyed by their text.
pub fn declaration_name(node: AstNode<'_>) -> Option<String> {
    if node.is("UsingForDirective") {
        let entries = using_for_entries(node);
        let libraries = entries
            .iter()
            .map(|e| e.library.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let target = entries
            .first()
            .and_then(|e| e.for_type.as_ref())
            .map(|t| t.to_string())
            .unwrap_or_else(|| "*".to_string());
        return Some(format!("using {} for {}", libraries, target));
    }
    node.name().map(str::to_string)
}

pub fn analyze_declaration(decl: &mut TopLevel, compact: bool) -> Result<()> {
    let name = decl.canonical_name.clone();
    decl.analyze(|kind, raw| {
        let node = raw
            .first()
            .map(|v| AstNode::new(v, compact))
            .ok_or_else(|| TransformError::missing("node", name.as_str()))?;
        match kind {
            TopLevelKind::Event { elems, anonymous } => {
                *elems = event_params(node);
                *anonymous = node.bool_attr("anonymous");
            }
            TopLevelKind::Structure { elements } => {
                for member in struct_members(node) {
                    let member_name = member
                        .name()
                        .ok_or_else(|| TransformError::missing("name", member.node_type()))?;
                    elements.insert(member_name, member.ty());
                }
            }
            TopLevelKind::Enum { values } => {
                *values = enum_values(node);
            }
            TopLevelKind::CustomError { parameters } => {
                *parameters = node
                    .parameter_list("parameters", 0)
                    .into_iter()
                    .map(|p| (p.name().unwrap_or("").to_string(), p.ty()))
                    .collect();
            }
            TopLevelKind::UsingFor { table } => {
                *table = using_for_entries(node);
            }
        }
        Ok(())
    })
}

/// Event parameters in declaration order.
pub fn event_params(node: AstNode<'_>) -> Vec<EventParam> {
    node.parameter_list("parameters", 0)
        .into_iter()
        .map(|p| EventParam {
            name: p.name().unwrap_or("").to_string(),
            ty: p.ty(),
            indexed: p.bool_attr("indexed"),
        })
        .collect()
}

fn struct_members<'a>(node: AstNode<'a>) -> Vec<AstNode<'a>> {
    if node.is_compact() {
        node.nodes("members")
    } else {
        node.children()
            .into_iter()
            .filter(|c| c.is("VariableDeclaration"))
            .collect()
    }
}

fn enum_values(node: AstNode<'_>) -> Vec<String> {
    let members = if node.is_compact() {
        node.nodes("members")
    } else {
        node.children()
    };
    members
        .into_iter()
        .filter_map(|m| m.name().map(str::to_string))
        .collect()
}

fn path_name(node: AstNode<'_>) -> Option<String> {
    node.name()
        .or_else(|| node.str_attr("namePath"))
        .map(str::to_string)
}

pub fn using_for_entries(node: AstNode<'_>) -> Vec<UsingForEntry> {
    let (library, type_node) = if node.is_compact() {
        (
            node.child("libraryName").and_then(path_name),
            node.child("typeName"),
        )
    } else {
        let children = node.children();
        (
            children.first().copied().and_then(path_name),
            children.get(1).copied(),
        )
    };
    let for_type = type_node.map(type_name_type);

    let mut entries = Vec::new();
    if let Some(library) = library {
        entries.push(UsingForEntry {
            library,
            for_type: for_type.clone(),
        });
    }
    for item in node.nodes("functionList") {
        let Some(function) = item.child("function").and_then(path_name) else {
            continue;
        };
        entries.push(UsingForEntry {
            library: function,
            for_type: for_type.clone(),
        });
    }
    entries
}

/// Type named by a type-name node: its type string when present, else its spelled name.
pub fn type_name_type(node: AstNode<'_>) -> Type {
    if let Some(ts) = node.type_string() {
        return Type::from_type_string(ts);
    }
    match node.name().or_else(|| node.str_attr("namePath")) {
        Some(name) => Type::from_type_string(name),
        None => Type::Unknown,
    }
}

/// Raw buffer captured at registration time.
pub fn raw_capture(node: AstNode<'_>) -> Vec<Value> {
    vec![node.value().clone()]
}
