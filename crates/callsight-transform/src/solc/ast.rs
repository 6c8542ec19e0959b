//! Uniform view over compact and legacy solc AST nodes.
//!
//! The compact dialect keeps attributes and children as named fields of the node object. The legacy
//! dialect (`--ast-json` before 0.8) moves attributes under `attributes` and children into an ordered
//! `children` array. Accessors here hide the difference wherever both carry the same information.

use crate::errors::{Result, TransformError};
use callsight_core::{SourceSpan, Type};
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct AstNode<'a> {
    value: &'a Value,
    compact: bool,
}

impl<'a> AstNode<'a> {
    pub fn new(value: &'a Value, compact: bool) -> Self {
        Self { value, compact }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn is_compact(&self) -> bool {
        self.compact
    }

    pub fn node_type(&self) -> &'a str {
        let key = if self.compact { "nodeType" } else { "name" };
        self.value.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn is(&self, node_type: &str) -> bool {
        self.node_type() == node_type
    }

    pub fn id(&self) -> Option<i64> {
        self.value.get("id").and_then(Value::as_i64)
    }

    pub fn src(&self) -> Option<&'a str> {
        self.value.get("src").and_then(Value::as_str)
    }

    pub fn span(&self, files: &[String], default_file: &str) -> Option<SourceSpan> {
        SourceSpan::from_src_attribute(self.src()?, files, default_file)
    }

    pub fn attr(&self, key: &str) -> Option<&'a Value> {
        let value = if self.compact {
            self.value.get(key)
        } else {
            self.value.get("attributes").and_then(|a| a.get(key))
        };
        value.filter(|v| !v.is_null())
    }

    pub fn str_attr(&self, key: &str) -> Option<&'a str> {
        self.attr(key).and_then(Value::as_str)
    }

    pub fn bool_attr(&self, key: &str) -> bool {
        self.attr(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn int_attr(&self, key: &str) -> Option<i64> {
        self.attr(key).and_then(Value::as_i64)
    }

    pub fn name(&self) -> Option<&'a str> {
        self.str_attr("name")
    }

    pub fn required_str(&self, key: &str) -> Result<&'a str> {
        self.str_attr(key)
            .ok_or_else(|| TransformError::missing(key, self.node_type()))
    }

    /// Named child object of a compact node.
    pub fn child(&self, key: &str) -> Option<AstNode<'a>> {
        self.value
            .get(key)
            .filter(|v| v.is_object())
            .map(|v| AstNode::new(v, self.compact))
    }

    /// Named child array of a compact node. Null entries are skipped.
    pub fn nodes(&self, key: &str) -> Vec<AstNode<'a>> {
        self.value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|v| v.is_object())
                    .map(|v| AstNode::new(v, self.compact))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Like [`AstNode::nodes`] but keeps null placeholders, as in tuple components.
    pub fn optional_nodes(&self, key: &str) -> Vec<Option<AstNode<'a>>> {
        self.value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|v| v.is_object().then(|| AstNode::new(v, self.compact)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ordered children of a legacy node. Comment nodes emitted by solc 0.6.3 to 0.6.10 are skipped.
    pub fn children(&self) -> Vec<AstNode<'a>> {
        self.value
            .get("children")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|v| AstNode::new(v, self.compact))
                    .filter(|n| !n.is("StructuredDocumentation"))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Legacy children with null placeholders kept.
    fn slots(&self) -> Vec<Option<AstNode<'a>>> {
        self.value
            .get("children")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|v| v.is_object().then(|| AstNode::new(v, self.compact)))
                    .filter(|n| !matches!(n, Some(n) if n.is("StructuredDocumentation")))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Named child of a compact node, or the legacy child holding the same role.
    pub fn field(&self, key: &str) -> Option<AstNode<'a>> {
        if self.compact {
            return self.child(key);
        }
        let children = self.children();
        let position = match (self.node_type(), key) {
            ("FunctionDefinition" | "ModifierDefinition", "body")
            | ("TryCatchClause", "block") => {
                return children.last().filter(|c| c.is("Block")).copied()
            }
            ("TryCatchClause", "parameters") => {
                return children.first().filter(|c| c.is("ParameterList")).copied()
            }
            ("VariableDeclarationStatement", "initialValue") => {
                return children
                    .last()
                    .filter(|c| !c.is("VariableDeclaration"))
                    .copied()
            }
            ("ForStatement", _) => return self.legacy_for_part(key, children),
            ("ExpressionStatement" | "Return", "expression")
            | ("EmitStatement", "eventCall")
            | ("RevertStatement", "errorCall")
            | ("TryStatement", "externalCall")
            | ("IfStatement" | "WhileStatement" | "DoWhileStatement" | "Conditional", "condition")
            | ("MemberAccess" | "FunctionCall" | "FunctionCallOptions", "expression")
            | ("IndexAccess" | "IndexRangeAccess", "baseExpression")
            | ("BinaryOperation", "leftExpression")
            | ("Assignment", "leftHandSide")
            | ("UnaryOperation", "subExpression")
            | ("NewExpression", "typeName") => 0,
            ("IfStatement", "trueBody")
            | ("WhileStatement" | "DoWhileStatement", "body")
            | ("IndexAccess", "indexExpression")
            | ("IndexRangeAccess", "startExpression")
            | ("BinaryOperation", "rightExpression")
            | ("Assignment", "rightHandSide")
            | ("Conditional", "trueExpression") => 1,
            ("IfStatement", "falseBody")
            | ("IndexRangeAccess", "endExpression")
            | ("Conditional", "falseExpression") => 2,
            _ => return None,
        };
        children.get(position).copied()
    }

    /// `for` children are positional, with absent parts marked null in the attributes.
    fn legacy_for_part(&self, key: &str, mut children: Vec<AstNode<'a>>) -> Option<AstNode<'a>> {
        let body = children.pop()?;
        if key == "body" {
            return Some(body);
        }
        let mut remaining = children.into_iter();
        for part in ["initializationExpression", "condition", "loopExpression"] {
            let absent = self
                .value
                .get("attributes")
                .and_then(|a| a.get(part))
                .map(Value::is_null)
                .unwrap_or(false);
            let node = if absent { None } else { remaining.next() };
            if part == key {
                return node;
            }
        }
        None
    }

    /// Named child array of a compact node, or the legacy children holding the same role.
    pub fn fields(&self, key: &str) -> Vec<AstNode<'a>> {
        self.optional_fields(key).into_iter().flatten().collect()
    }

    /// Like [`AstNode::fields`] but keeps null placeholders.
    pub fn optional_fields(&self, key: &str) -> Vec<Option<AstNode<'a>>> {
        if self.compact {
            return self.optional_nodes(key);
        }
        let slots = self.slots();
        match (self.node_type(), key) {
            ("Block" | "UncheckedBlock", "statements")
            | ("ParameterList", "parameters")
            | ("TupleExpression", "components") => slots,
            ("FunctionCall", "arguments")
            | ("FunctionCallOptions", "options")
            | ("TryStatement", "clauses") => slots.into_iter().skip(1).collect(),
            ("VariableDeclarationStatement", "declarations") => {
                let mut declarations = slots
                    .into_iter()
                    .flatten()
                    .filter(|c| c.is("VariableDeclaration"));
                match self.attr("assignments").and_then(Value::as_array) {
                    Some(assignments) => assignments
                        .iter()
                        .map(|id| if id.is_null() { None } else { declarations.next() })
                        .collect(),
                    None => declarations.map(Some).collect(),
                }
            }
            _ => Vec::new(),
        }
    }

    /// `kind` of a `FunctionCall`; legacy nodes carry it as boolean flags.
    pub fn call_kind(&self) -> &'a str {
        if let Some(kind) = self.str_attr("kind") {
            return kind;
        }
        if self.bool_attr("type_conversion") {
            "typeConversion"
        } else if self.bool_attr("isStructConstructorCall") {
            "structConstructorCall"
        } else {
            "functionCall"
        }
    }

    pub fn member_name(&self) -> Option<&'a str> {
        self.str_attr("memberName")
            .or_else(|| self.str_attr("member_name"))
    }

    /// Members of a definition: `nodes` for compact, `children` for legacy.
    pub fn members(&self) -> Vec<AstNode<'a>> {
        if self.compact {
            self.nodes("nodes")
        } else {
            self.children()
        }
    }

    pub fn type_string(&self) -> Option<&'a str> {
        if self.compact {
            self.value
                .get("typeDescriptions")
                .and_then(|t| t.get("typeString"))
                .and_then(Value::as_str)
        } else {
            self.str_attr("type")
        }
    }

    pub fn ty(&self) -> Type {
        self.type_string()
            .map(Type::from_type_string)
            .unwrap_or(Type::Unknown)
    }

    pub fn referenced_declaration(&self) -> Option<i64> {
        self.int_attr("referencedDeclaration")
    }

    /// Parameters of a `ParameterList`-bearing definition.
    ///
    /// Compact nodes name the list; legacy nodes hold parameter lists as positional children, so
    /// `position` selects the first (parameters) or second (return parameters) one.
    pub fn parameter_list(&self, compact_key: &str, position: usize) -> Vec<AstNode<'a>> {
        if self.compact {
            return self
                .child(compact_key)
                .map(|list| list.nodes("parameters"))
                .unwrap_or_default();
        }
        self.children()
            .into_iter()
            .filter(|c| c.is("ParameterList"))
            .nth(position)
            .map(|list| list.children())
            .unwrap_or_default()
    }
}

/// Detects the dialect from a `SourceUnit` node.
pub fn detect_compact(source_unit: &Value) -> Option<bool> {
    if source_unit.get("nodeType").is_some() {
        Some(true)
    } else if source_unit.get("name").and_then(Value::as_str) == Some("SourceUnit") {
        Some(false)
    } else {
        None
    }
}

/// File index of a node's `src` attribute.
pub fn src_file_index(src: &str) -> Option<usize> {
    src.split(':').nth(2)?.parse().ok()
}
