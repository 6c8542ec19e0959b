//! Read-only view over Vyper AST JSON nodes (`ast_type`-tagged objects).

use callsight_core::{SourceSpan, Type};
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct VyNode<'a> {
    value: &'a Value,
}

impl<'a> VyNode<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Wraps `value` only when it is a tagged AST node.
    pub fn wrap(value: &'a Value) -> Option<Self> {
        value.get("ast_type").and_then(Value::as_str)?;
        Some(Self { value })
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn ast_type(&self) -> &'a str {
        self.value
            .get("ast_type")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn is(&self, ast_type: &str) -> bool {
        self.ast_type() == ast_type
    }

    pub fn str_attr(&self, key: &str) -> Option<&'a str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn bool_attr(&self, key: &str) -> bool {
        self.value
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn child(&self, key: &str) -> Option<VyNode<'a>> {
        self.value.get(key).and_then(VyNode::wrap)
    }

    pub fn nodes(&self, key: &str) -> Vec<VyNode<'a>> {
        self.value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(VyNode::wrap).collect())
            .unwrap_or_default()
    }

    /// Every tagged node held directly by a field of this node, in key order.
    pub fn children(&self) -> Vec<VyNode<'a>> {
        let Some(fields) = self.value.as_object() else {
            return Vec::new();
        };
        let mut children = Vec::new();
        for field in fields.values() {
            match field {
                Value::Array(items) => children.extend(items.iter().filter_map(VyNode::wrap)),
                other => children.extend(VyNode::wrap(other)),
            }
        }
        children
    }

    /// `Name.id`, `FunctionDef.name` and friends.
    pub fn name(&self) -> Option<&'a str> {
        self.str_attr("id").or_else(|| self.str_attr("name"))
    }

    pub fn node_id(&self) -> Option<i64> {
        self.value.get("node_id").and_then(Value::as_i64)
    }

    /// Span from `src` when present, else from the line/column attributes.
    pub fn span(&self, file: &str, source: Option<&str>) -> Option<SourceSpan> {
        let lines = self.lines();
        let span = match self.str_attr("src") {
            Some(src) => SourceSpan::from_src_attribute(src, &[file.to_string()], file),
            None => {
                let (start_line, end_line) = lines?;
                let text = source?;
                let start = line_offset(text, start_line)
                    + self.value.get("col_offset").and_then(Value::as_u64).unwrap_or(0) as usize;
                let end = match self.value.get("end_col_offset").and_then(Value::as_u64) {
                    Some(col) => line_offset(text, end_line) + col as usize,
                    None => line_offset(text, end_line + 1),
                };
                Some(SourceSpan::new(file, start, end.saturating_sub(start)))
            }
        }?;
        Some(match lines {
            Some((start, end)) => span.with_lines(start, end),
            None => span,
        })
    }

    fn lines(&self) -> Option<(u32, u32)> {
        let start = self.value.get("lineno").and_then(Value::as_u64)? as u32;
        let end = self
            .value
            .get("end_lineno")
            .and_then(Value::as_u64)
            .map(|l| l as u32)
            .unwrap_or(start);
        Some((start, end))
    }
}

/// Byte offset of the start of 1-based `line`, clamped to the text length.
pub fn line_offset(text: &str, line: u32) -> usize {
    if line <= 1 {
        return 0;
    }
    text.match_indices('\n')
        .nth(line as usize - 2)
        .map(|(pos, _)| pos + 1)
        .unwrap_or(text.len())
}

/// Renders a callee expression as `a.b.c`; subscripts become `[...]` and other nodes their type name.
pub fn attr_chain(node: VyNode<'_>) -> String {
    match node.ast_type() {
        "Name" => node.str_attr("id").unwrap_or("").to_string(),
        "Attribute" => {
            let attr = node.str_attr("attr").unwrap_or("");
            let base = node.child("value").map(attr_chain).unwrap_or_default();
            if base.is_empty() {
                attr.to_string()
            } else {
                format!("{}.{}", base, attr)
            }
        }
        "Subscript" => format!(
            "{}[...]",
            node.child("value").map(attr_chain).unwrap_or_default()
        ),
        "" => "expr".to_string(),
        other => other.to_string(),
    }
}

/// Type named by an annotation expression.
///
/// `structs` and `interfaces` name the user types of the module. Storage wrappers such as
/// `public(...)` and `immutable(...)` are transparent.
pub fn annotation_type(node: VyNode<'_>, structs: &[String], interfaces: &[String]) -> Type {
    match node.ast_type() {
        "Name" => {
            let id = node.str_attr("id").unwrap_or("");
            if structs.iter().any(|s| s == id) {
                Type::Struct(id.to_string())
            } else if interfaces.iter().any(|i| i == id) {
                Type::Contract(id.to_string())
            } else if id.is_empty() {
                Type::Unknown
            } else {
                Type::elementary(id)
            }
        }
        "Call" => {
            let wrapper = node.child("func").and_then(|f| f.str_attr("id"));
            match (wrapper, node.nodes("args").first()) {
                (Some("public" | "constant" | "immutable" | "transient" | "indexed"), Some(inner)) => {
                    annotation_type(*inner, structs, interfaces)
                }
                _ => Type::Unknown,
            }
        }
        "Subscript" => subscript_type(node, structs, interfaces),
        "Attribute" => node
            .str_attr("attr")
            .map(|attr| Type::Contract(attr.to_string()))
            .unwrap_or(Type::Unknown),
        _ => Type::Unknown,
    }
}

fn subscript_type(node: VyNode<'_>, structs: &[String], interfaces: &[String]) -> Type {
    let Some(base) = node.child("value") else {
        return Type::Unknown;
    };
    let slice = node.child("slice").map(|s| match s.child("value") {
        // Vyper < 0.4 wraps the slice in an `Index` node.
        Some(inner) if s.is("Index") => inner,
        _ => s,
    });
    let elements: Vec<VyNode<'_>> = match slice {
        Some(s) if s.is("Tuple") => s.nodes("elements"),
        Some(s) => vec![s],
        None => Vec::new(),
    };

    match base.str_attr("id") {
        Some("HashMap") => match elements.as_slice() {
            [key, value] => Type::Mapping(
                Box::new(annotation_type(*key, structs, interfaces)),
                Box::new(annotation_type(*value, structs, interfaces)),
            ),
            _ => Type::Unknown,
        },
        Some("DynArray") => match elements.first() {
            Some(element) => Type::Array(
                Box::new(annotation_type(*element, structs, interfaces)),
                None,
            ),
            None => Type::Unknown,
        },
        Some("String") => Type::elementary("string"),
        Some("Bytes") => Type::elementary("bytes"),
        _ => {
            let length = elements
                .first()
                .and_then(|e| e.value().get("value"))
                .and_then(Value::as_u64)
                .map(|n| n as usize);
            Type::Array(Box::new(annotation_type(base, structs, interfaces)), length)
        }
    }
}
