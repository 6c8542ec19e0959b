//! Lowering of Vyper `FunctionDef` bodies into IR.
//!
//! `self.f(...)` binds the module's own function, any other attribute call becomes a high-level call
//! labelled by its attribute chain, and a bare-name call is a builtin. Storage is reached through
//! `self.<name>`; environment variables (`msg.sender`, `block.timestamp`, ...) are builtins.

use super::ast::{attr_chain, annotation_type, VyNode};
use crate::errors::{Result, TransformError};
use crate::lowering::{BodyBuilder, LoopTargets};
use crate::solc::lower::decode_hex;
use callsight_core::{
    CallArgs, Callee, Constant, FunctionBody, FunctionId, HighLevelTarget, Intrinsic, IrCounters,
    OperandId, Terminator, Type, UnresolvedEdge,
};
use serde_json::Value;
use std::collections::HashMap;

const ENVIRONMENT: &[&str] = &["msg", "block", "tx", "chain"];

/// Builtins after which control never continues.
const REVERTING_BUILTINS: &[&str] = &["raw_revert", "selfdestruct"];

/// Names and types of a module, shared by every function lowered from it.
#[derive(Debug, Clone, Default)]
pub struct ModuleLayout {
    pub contract_name: String,
    pub functions: HashMap<String, FunctionId>,
    pub returns: HashMap<String, Vec<Type>>,
    pub states: HashMap<String, Type>,
    pub structs: Vec<String>,
    pub interfaces: Vec<String>,
}

impl ModuleLayout {
    pub fn annotation(&self, node: VyNode<'_>) -> Type {
        annotation_type(node, &self.structs, &self.interfaces)
    }
}

pub struct VyperLowering<'m, 'c> {
    layout: &'m ModuleLayout,
    file: &'m str,
    source: Option<&'m str>,
    builder: BodyBuilder<'c>,
}

impl<'m, 'c> VyperLowering<'m, 'c> {
    pub fn new(
        layout: &'m ModuleLayout,
        file: &'m str,
        source: Option<&'m str>,
        counters: &'c mut IrCounters,
    ) -> Self {
        Self {
            layout,
            file,
            source,
            builder: BodyBuilder::new(counters),
        }
    }

    pub fn lower(mut self, definition: VyNode<'_>) -> Result<FunctionBody> {
        let mut parameters = Vec::new();
        if let Some(arguments) = definition.child("args") {
            for argument in arguments.nodes("args") {
                let name = argument
                    .str_attr("arg")
                    .ok_or_else(|| TransformError::missing("arg", argument.ast_type()))?;
                let ty = argument
                    .child("annotation")
                    .map(|a| self.layout.annotation(a))
                    .unwrap_or(Type::Unknown);
                parameters.push(self.builder.local(name, ty));
            }
        }
        self.builder.set_signature(parameters, Vec::new());
        self.block(definition.nodes("body"))?;
        Ok(self.builder.finish())
    }

    fn block(&mut self, statements: Vec<VyNode<'_>>) -> Result<()> {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn scoped_block(&mut self, statements: Vec<VyNode<'_>>) -> Result<()> {
        self.builder.push_scope();
        let result = self.block(statements);
        self.builder.pop_scope();
        result
    }

    fn statement(&mut self, node: VyNode<'_>) -> Result<()> {
        self.builder.annotate(node.span(self.file, self.source));
        match node.ast_type() {
            "AnnAssign" => {
                let target = required(node, "target")?;
                let name = target
                    .name()
                    .ok_or_else(|| TransformError::missing("id", target.ast_type()))?;
                let ty = node
                    .child("annotation")
                    .map(|a| self.layout.annotation(a))
                    .unwrap_or(Type::Unknown);
                let value = match node.child("value") {
                    Some(value) => Some(self.expression(value)?),
                    None => None,
                };
                let local = self.builder.local(name, ty.clone());
                if let Some(value) = value {
                    self.builder.assign(local, value, ty)?;
                }
            }
            "Assign" => {
                let value = self.expression(required(node, "value")?)?;
                self.store(required(node, "target")?, value)?;
            }
            "AugAssign" => {
                let right = self.expression(required(node, "value")?)?;
                let left = self.lvalue(required(node, "target")?)?;
                let ty = self.type_of(left);
                let operator = node
                    .child("op")
                    .map(|op| operator_symbol(op.ast_type()))
                    .unwrap_or("?");
                let result = self.builder.intrinsic(
                    Intrinsic::Binary(operator.to_string()),
                    vec![left, right],
                    ty.clone(),
                )?;
                self.builder.assign(left, result, ty)?;
            }
            "Expr" | "Log" => {
                if let Some(value) = node.child("value") {
                    self.value(value)?;
                }
            }
            "Return" => {
                let values = match node.child("value") {
                    Some(value) if value.is("Tuple") => {
                        let mut values = Vec::new();
                        for element in value.nodes("elements") {
                            values.push(self.expression(element)?);
                        }
                        values
                    }
                    Some(value) => vec![self.expression(value)?],
                    None => Vec::new(),
                };
                self.builder.terminate(Terminator::Return(values));
            }
            "If" => self.if_statement(node)?,
            "For" => self.for_statement(node)?,
            "Assert" => {
                let condition = self.expression(required(node, "test")?)?;
                let pass = self.builder.new_node();
                let fail = self.builder.new_node();
                self.builder.branch(condition, pass, fail);
                self.builder.switch_to(fail);
                if let Some(message) = node.child("msg") {
                    self.value(message)?;
                }
                self.builder.terminate(Terminator::Revert);
                self.builder.switch_to(pass);
            }
            "Raise" => {
                if let Some(exception) = node.child("exc") {
                    self.value(exception)?;
                }
                self.builder.terminate(Terminator::Revert);
            }
            "Pass" => self.builder.nop(),
            "Break" => {
                if let Some(targets) = self.builder.loop_targets() {
                    self.builder.goto(targets.break_to);
                }
            }
            "Continue" => {
                if let Some(targets) = self.builder.loop_targets() {
                    self.builder.goto(targets.continue_to);
                }
            }
            other => {
                tracing::debug!(statement = other, "lowering unlisted statement opaquely");
                self.opaque(node)?;
            }
        }
        Ok(())
    }

    /// Lowers every nested node for its calls and stands the node itself in as a builtin.
    fn opaque(&mut self, node: VyNode<'_>) -> Result<OperandId> {
        for child in node.children() {
            self.value(child)?;
        }
        Ok(self.builder.builtin(node.ast_type(), Type::Unknown))
    }

    fn if_statement(&mut self, node: VyNode<'_>) -> Result<()> {
        let condition = self.expression(required(node, "test")?)?;
        let then_node = self.builder.new_node();
        let join = self.builder.new_node();
        let orelse = node.nodes("orelse");
        let else_node = if orelse.is_empty() {
            join
        } else {
            self.builder.new_node()
        };
        self.builder.branch(condition, then_node, else_node);

        self.builder.switch_to(then_node);
        self.scoped_block(node.nodes("body"))?;
        self.builder.goto(join);

        if !orelse.is_empty() {
            self.builder.switch_to(else_node);
            self.scoped_block(orelse)?;
            self.builder.goto(join);
        }
        self.builder.switch_to(join);
        Ok(())
    }

    /// The loop variable is bound to an element of the iterable behind an opaque `for.has_next` flag.
    fn for_statement(&mut self, node: VyNode<'_>) -> Result<()> {
        let iterable = self.expression(required(node, "iter")?)?;
        let target = required(node, "target")?;
        let (name, ty) = match target.ast_type() {
            "AnnAssign" => {
                let inner = required(target, "target")?;
                let ty = target
                    .child("annotation")
                    .map(|a| self.layout.annotation(a))
                    .unwrap_or(Type::Unknown);
                (inner.name(), ty)
            }
            "Name" => (target.name(), Type::Unknown),
            other => {
                return Err(TransformError::UnsupportedAst(format!(
                    "loop target {}",
                    other
                )))
            }
        };
        let name = name.ok_or_else(|| TransformError::missing("id", "For.target"))?;

        self.builder.push_scope();
        let variable = self.builder.local(name, ty.clone());
        let header = self.builder.new_node();
        self.builder.goto(header);
        self.builder.switch_to(header);
        let has_next = self.builder.builtin("for.has_next", Type::bool());
        let body = self.builder.new_node();
        let exit = self.builder.new_node();
        self.builder.branch(has_next, body, exit);

        self.builder.push_loop(LoopTargets {
            continue_to: header,
            break_to: exit,
        });
        self.builder.switch_to(body);
        let element = self.builder.reference(ty.clone(), iterable)?;
        self.builder.call(
            Callee::Intrinsic(Intrinsic::Index),
            CallArgs::positional(vec![iterable]),
            Some(element),
        )?;
        self.builder.assign(variable, element, ty)?;
        self.block(node.nodes("body"))?;
        self.builder.goto(header);
        self.builder.pop_loop();
        self.builder.switch_to(exit);
        self.builder.pop_scope();
        Ok(())
    }

    fn store(&mut self, target: VyNode<'_>, value: OperandId) -> Result<()> {
        if target.is("Tuple") {
            for (position, element) in target.nodes("elements").into_iter().enumerate() {
                let slot = self.lvalue(element)?;
                self.builder.call(
                    Callee::Intrinsic(Intrinsic::TupleComponent(position)),
                    CallArgs::positional(vec![value]),
                    Some(slot),
                )?;
            }
            return Ok(());
        }
        let slot = self.lvalue(target)?;
        let ty = self.type_of(slot);
        self.builder.assign(slot, value, ty)?;
        Ok(())
    }

    fn lvalue(&mut self, node: VyNode<'_>) -> Result<OperandId> {
        let layout = self.layout;
        match node.ast_type() {
            "Name" => {
                let name = node.str_attr("id").unwrap_or("");
                if let Some(local) = self.builder.lookup(name) {
                    return Ok(local);
                }
                match layout.states.get(name) {
                    Some(ty) => Ok(self.builder.state(name, ty.clone())),
                    None => Err(TransformError::VariableNotFound(name.to_string())),
                }
            }
            _ => self.expression(node),
        }
    }

    fn type_of(&self, operand: OperandId) -> Type {
        self.builder
            .arena()
            .get(operand)
            .map(|o| o.ty.clone())
            .unwrap_or(Type::Unknown)
    }

    fn expression(&mut self, node: VyNode<'_>) -> Result<OperandId> {
        self.value(node)?.ok_or_else(|| {
            TransformError::UnsupportedAst(format!(
                "{} used as a value has no result",
                node.ast_type()
            ))
        })
    }

    fn value(&mut self, node: VyNode<'_>) -> Result<Option<OperandId>> {
        let operand = match node.ast_type() {
            "Int" | "Decimal" | "Hex" | "HexBytes" | "Bytes" | "Str" | "NameConstant" => {
                self.literal(node)
            }
            "Name" => self.name(node),
            "Attribute" => self.attribute(node)?,
            "Subscript" => self.subscript(node)?,
            "Call" => return self.call(node),
            "ExtCall" | "StaticCall" => return self.value(required(node, "value")?),
            "BinOp" | "Compare" => {
                let left = self.expression(required(node, "left")?)?;
                let right = self.expression(required(node, "right")?)?;
                let operator = node
                    .child("op")
                    .map(|op| operator_symbol(op.ast_type()))
                    .unwrap_or("?");
                let ty = if node.is("Compare") {
                    Type::bool()
                } else {
                    self.type_of(left)
                };
                self.builder
                    .intrinsic(Intrinsic::Binary(operator.to_string()), vec![left, right], ty)?
            }
            "BoolOp" => {
                let operator = node
                    .child("op")
                    .map(|op| operator_symbol(op.ast_type()))
                    .unwrap_or("?");
                let mut values = node.nodes("values").into_iter();
                let first = values
                    .next()
                    .ok_or_else(|| TransformError::missing("values", "BoolOp"))?;
                let mut accumulated = self.expression(first)?;
                for value in values {
                    let next = self.expression(value)?;
                    accumulated = self.builder.intrinsic(
                        Intrinsic::Binary(operator.to_string()),
                        vec![accumulated, next],
                        Type::bool(),
                    )?;
                }
                accumulated
            }
            "UnaryOp" => {
                let operand = self.expression(required(node, "operand")?)?;
                let ty = self.type_of(operand);
                match node.child("op").map(|op| op.ast_type()) {
                    Some("Not") => self.builder.unary("!", operand, Type::bool())?,
                    Some("Invert") => self.builder.unary("~", operand, ty)?,
                    _ => {
                        let zero = self.builder.constant(Constant::Uint(0u32.into()), ty.clone());
                        self.builder.intrinsic(
                            Intrinsic::Binary("-".to_string()),
                            vec![zero, operand],
                            ty,
                        )?
                    }
                }
            }
            "Tuple" | "List" => {
                let mut elements = Vec::new();
                for element in node.nodes("elements") {
                    elements.push(self.expression(element)?);
                }
                let types = elements.iter().map(|e| self.type_of(*e)).collect::<Vec<_>>();
                let ty = if node.is("Tuple") {
                    Type::Tuple(types)
                } else {
                    Type::Array(
                        Box::new(types.first().cloned().unwrap_or(Type::Unknown)),
                        Some(types.len()),
                    )
                };
                self.builder.intrinsic(Intrinsic::Initializer, elements, ty)?
            }
            "IfExp" => {
                let mut arguments = Vec::new();
                for key in ["test", "body", "orelse"] {
                    arguments.push(self.expression(required(node, key)?)?);
                }
                let ty = self.type_of(arguments[1]);
                self.builder
                    .intrinsic(Intrinsic::Binary("?:".to_string()), arguments, ty)?
            }
            "Dict" => {
                let (_, values) = self.dict_fields(node)?;
                self.builder
                    .intrinsic(Intrinsic::Initializer, values, Type::Unknown)?
            }
            other => {
                tracing::debug!(expression = other, "lowering unlisted expression opaquely");
                self.opaque(node)?
            }
        };
        Ok(Some(operand))
    }

    fn literal(&mut self, node: VyNode<'_>) -> OperandId {
        let raw = node.value().get("value");
        let text = match raw {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let (constant, ty) = match node.ast_type() {
            "NameConstant" => match raw.and_then(Value::as_bool) {
                Some(flag) => (Constant::Bool(flag), Type::bool()),
                None => (Constant::String("None".to_string()), Type::Unknown),
            },
            "Str" => (Constant::String(text), Type::elementary("string")),
            "Decimal" => (Constant::String(text), Type::elementary("decimal")),
            "Hex" if text.len() == 42 => (Constant::Address(text), Type::address()),
            "Hex" | "HexBytes" | "Bytes" => {
                let bytes = match text.strip_prefix("0x") {
                    Some(hex) => decode_hex(hex),
                    None => text.into_bytes(),
                };
                (Constant::Bytes(bytes), Type::elementary("bytes"))
            }
            _ => match Constant::parse_number(&text) {
                Some(constant @ Constant::Int(_)) => (constant, Type::elementary("int256")),
                Some(constant) => (constant, Type::uint256()),
                None => (Constant::String(text), Type::Unknown),
            },
        };
        self.builder.constant(constant, ty)
    }

    fn name(&mut self, node: VyNode<'_>) -> OperandId {
        let layout = self.layout;
        let name = node.str_attr("id").unwrap_or("");
        if let Some(local) = self.builder.lookup(name) {
            return local;
        }
        if let Some(ty) = layout.states.get(name) {
            return self.builder.state(name, ty.clone());
        }
        let ty = if name == "self" {
            Type::address()
        } else {
            Type::Unknown
        };
        self.builder.builtin(name, ty)
    }

    fn attribute(&mut self, node: VyNode<'_>) -> Result<OperandId> {
        let layout = self.layout;
        let attr = node.str_attr("attr").unwrap_or("");
        let base = required(node, "value")?;
        if let Some(base_name) = base.str_attr("id").filter(|_| base.is("Name")) {
            if base_name == "self" {
                if let Some(ty) = layout.states.get(attr) {
                    return Ok(self.builder.state(attr, ty.clone()));
                }
            }
            if base_name == "self" || ENVIRONMENT.contains(&base_name) {
                let label = format!("{}.{}", base_name, attr);
                return Ok(self.builder.builtin(&label, Type::Unknown));
            }
        }
        let object = self.expression(base)?;
        let reference = self.builder.reference(Type::Unknown, object)?;
        self.builder.call(
            Callee::Intrinsic(Intrinsic::Member(attr.to_string())),
            CallArgs::positional(vec![object]),
            Some(reference),
        )?;
        Ok(reference)
    }

    fn subscript(&mut self, node: VyNode<'_>) -> Result<OperandId> {
        let object = self.expression(required(node, "value")?)?;
        let slice = required(node, "slice")?;
        let key = match slice.child("value") {
            Some(inner) if slice.is("Index") => inner,
            _ => slice,
        };
        let key = self.expression(key)?;
        let ty = match self.type_of(object) {
            Type::Mapping(_, value) => *value,
            Type::Array(element, _) => *element,
            _ => Type::Unknown,
        };
        let reference = self.builder.reference(ty, object)?;
        self.builder.call(
            Callee::Intrinsic(Intrinsic::Index),
            CallArgs::positional(vec![object, key]),
            Some(reference),
        )?;
        Ok(reference)
    }

    fn call(&mut self, node: VyNode<'_>) -> Result<Option<OperandId>> {
        let func = required(node, "func")?;
        if let Some(structure) = func
            .str_attr("id")
            .filter(|id| func.is("Name") && self.layout.structs.iter().any(|s| s == id))
        {
            return self.struct_literal(structure, node).map(Some);
        }
        let callee = match func.ast_type() {
            "Attribute" => {
                let attr = func.str_attr("attr").unwrap_or("");
                let base = required(func, "value")?;
                if base.is("Name") && base.str_attr("id") == Some("self") {
                    self.internal_callee(attr)
                } else {
                    self.value(base)?;
                    Callee::HighLevel {
                        contract: None,
                        target: HighLevelTarget::Unresolved(attr_chain(func)),
                    }
                }
            }
            "Name" => Callee::Builtin(func.str_attr("id").unwrap_or("").to_string()),
            _ => {
                self.value(func)?;
                Callee::HighLevel {
                    contract: None,
                    target: HighLevelTarget::Unresolved(attr_chain(func)),
                }
            }
        };

        let mut arguments = Vec::new();
        for argument in node.nodes("args") {
            arguments.push(self.expression(argument)?);
        }
        for keyword in node.nodes("keywords") {
            if let Some(value) = keyword.child("value") {
                arguments.push(self.expression(value)?);
            }
        }

        let result = match &callee {
            Callee::Internal(_) => {
                let name = func.str_attr("attr").unwrap_or("");
                let returns = self.layout.returns.get(name).cloned().unwrap_or_default();
                self.builder.result_for(Type::Tuple(returns))
            }
            _ => Some(self.builder.temp(Type::Unknown)),
        };
        let reverts = matches!(
            &callee,
            Callee::Builtin(name) if REVERTING_BUILTINS.contains(&name.as_str())
        );
        self.builder
            .call(callee, CallArgs::positional(arguments), result)?;
        if reverts {
            self.builder.terminate(Terminator::Revert);
        }
        Ok(result)
    }

    /// `P({a: 1})` before Vyper 0.4, `P(a=1)` after.
    fn struct_literal(&mut self, structure: &str, node: VyNode<'_>) -> Result<OperandId> {
        let mut names = Vec::new();
        let mut values = Vec::new();
        if let Some(dict) = node.nodes("args").into_iter().find(|a| a.is("Dict")) {
            (names, values) = self.dict_fields(dict)?;
        }
        for keyword in node.nodes("keywords") {
            if let Some(value) = keyword.child("value") {
                names.push(keyword.str_attr("arg").unwrap_or("").to_string());
                values.push(self.expression(value)?);
            }
        }
        self.builder.emit_new_structure(
            structure,
            CallArgs::named(names, values),
            Type::Struct(structure.to_string()),
        )
    }

    fn dict_fields(&mut self, dict: VyNode<'_>) -> Result<(Vec<String>, Vec<OperandId>)> {
        let names = dict
            .nodes("keys")
            .iter()
            .map(|key| key.name().unwrap_or("").to_string())
            .collect();
        let mut values = Vec::new();
        for value in dict.nodes("values") {
            values.push(self.expression(value)?);
        }
        Ok((names, values))
    }

    fn internal_callee(&self, name: &str) -> Callee {
        match self.layout.functions.get(name) {
            Some(id) => Callee::Internal(*id),
            None => Callee::Unresolved {
                edge: UnresolvedEdge::Internal,
                label: format!("{}.{}", self.layout.contract_name, name),
            },
        }
    }
}

fn required<'a>(node: VyNode<'a>, key: &str) -> Result<VyNode<'a>> {
    node.child(key)
        .ok_or_else(|| TransformError::missing(key, node.ast_type()))
}

/// Operator token of a Vyper operator node.
pub fn operator_symbol(ast_type: &str) -> &'static str {
    match ast_type {
        "Add" => "+",
        "Sub" => "-",
        "Mult" => "*",
        "Div" => "/",
        "FloorDiv" => "//",
        "Mod" => "%",
        "Pow" => "**",
        "LShift" => "<<",
        "RShift" => ">>",
        "BitAnd" => "&",
        "BitOr" => "|",
        "BitXor" => "^",
        "And" => "&&",
        "Or" => "||",
        "Eq" => "==",
        "NotEq" => "!=",
        "Lt" => "<",
        "LtE" => "<=",
        "Gt" => ">",
        "GtE" => ">=",
        "In" => "in",
        "NotIn" => "not in",
        "Not" => "!",
        "Invert" => "~",
        "USub" => "-",
        _ => "?",
    }
}
