//! Lowering of solc function bodies into IR, from either AST dialect.
//!
//! Identifiers are resolved through `referencedDeclaration`. Calls are classified at the call site:
//! internal calls go through virtual dispatch in the contract context, `super` and `Base.f` calls bind
//! the definition's instance in the same context, library calls bind the library's own instance, and
//! calls on contract-typed receivers become high-level calls.

use super::ast::AstNode;
use super::contracts::identifier_parts;
use super::index::{dispatch, DeclRef, SolcIndex};
use crate::errors::{Result, TransformError};
use crate::lowering::{BodyBuilder, LoopTargets};
use callsight_core::{
    CallArgs, Callee, CompilationUnit, Constant, ContractId, FunctionBody, HighLevelTarget,
    Intrinsic, IrCounters, OperandId, Terminator, Type, UnresolvedEdge,
};
use num_bigint::BigUint;
use std::collections::HashMap;

const LOW_LEVEL_MEMBERS: &[&str] = &[
    "call",
    "delegatecall",
    "staticcall",
    "callcode",
    "send",
    "transfer",
];

pub struct FunctionLowering<'u, 'c> {
    unit: &'u CompilationUnit,
    index: &'u SolcIndex,
    ctx: Option<ContractId>,
    files: &'u [String],
    file: &'u str,
    builder: BodyBuilder<'c>,
    locals: HashMap<i64, OperandId>,
}

impl<'u, 'c> FunctionLowering<'u, 'c> {
    pub fn new(
        unit: &'u CompilationUnit,
        index: &'u SolcIndex,
        ctx: Option<ContractId>,
        files: &'u [String],
        file: &'u str,
        counters: &'c mut IrCounters,
    ) -> Self {
        Self {
            unit,
            index,
            ctx,
            files,
            file,
            builder: BodyBuilder::new(counters),
            locals: HashMap::new(),
        }
    }

    /// Lowers a function or modifier definition. Definitions without a body yield `None`.
    pub fn lower(mut self, definition: AstNode<'_>) -> Result<Option<FunctionBody>> {
        let Some(body) = definition.field("body") else {
            return Ok(None);
        };
        let parameters = self.declare_all(definition.parameter_list("parameters", 0));
        let returns = self.declare_all(definition.parameter_list("returnParameters", 1));
        self.builder.set_signature(parameters, returns);
        self.statement(body)?;
        Ok(Some(self.builder.finish()))
    }

    fn declare_all(&mut self, declarations: Vec<AstNode<'_>>) -> Vec<OperandId> {
        declarations
            .into_iter()
            .filter_map(|decl| self.declare(decl))
            .collect()
    }

    /// Declares a named variable; unnamed parameters cannot be referenced and get no operand.
    fn declare(&mut self, decl: AstNode<'_>) -> Option<OperandId> {
        let name = decl.name().filter(|n| !n.is_empty())?;
        let operand = self.builder.local(name, decl.ty());
        if let Some(id) = decl.id() {
            self.locals.insert(id, operand);
        }
        Some(operand)
    }

    fn statement(&mut self, node: AstNode<'_>) -> Result<()> {
        self.builder.annotate(node.span(self.files, self.file));
        match node.node_type() {
            "Block" | "UncheckedBlock" => {
                self.builder.push_scope();
                for statement in node.fields("statements") {
                    self.statement(statement)?;
                }
                self.builder.pop_scope();
            }
            "ExpressionStatement" => {
                if let Some(expression) = node.field("expression") {
                    self.value(expression)?;
                }
            }
            "VariableDeclarationStatement" => self.variable_declaration(node)?,
            "IfStatement" => self.if_statement(node)?,
            "WhileStatement" => self.while_statement(node)?,
            "DoWhileStatement" => self.do_while_statement(node)?,
            "ForStatement" => self.for_statement(node)?,
            "Continue" => {
                if let Some(targets) = self.builder.loop_targets() {
                    self.builder.goto(targets.continue_to);
                }
            }
            "Break" => {
                if let Some(targets) = self.builder.loop_targets() {
                    self.builder.goto(targets.break_to);
                }
            }
            "Return" => self.return_statement(node)?,
            "EmitStatement" => {
                if let Some(call) = node.field("eventCall") {
                    self.value(call)?;
                }
            }
            "RevertStatement" => {
                if let Some(call) = node.field("errorCall") {
                    self.value(call)?;
                }
                self.builder.terminate(Terminator::Revert);
            }
            "Throw" => self.builder.terminate(Terminator::Revert),
            "TryStatement" => self.try_statement(node)?,
            "PlaceholderStatement" | "InlineAssembly" => self.builder.nop(),
            other => {
                return Err(TransformError::UnsupportedAst(format!(
                    "statement {}",
                    other
                )))
            }
        }
        Ok(())
    }

    fn variable_declaration(&mut self, node: AstNode<'_>) -> Result<()> {
        let initial = match node.field("initialValue") {
            Some(init) => Some(self.expression(init)?),
            None => None,
        };
        let declarations = node.optional_fields("declarations");

        if let [Some(decl)] = declarations.as_slice() {
            if let Some(local) = self.declare(*decl) {
                if let Some(value) = initial {
                    self.builder.assign(local, value, decl.ty())?;
                }
            }
            return Ok(());
        }

        for (position, decl) in declarations.iter().enumerate() {
            let Some(decl) = decl else {
                continue;
            };
            let Some(local) = self.declare(*decl) else {
                continue;
            };
            if let Some(tuple) = initial {
                self.builder.call(
                    Callee::Intrinsic(Intrinsic::TupleComponent(position)),
                    CallArgs::positional(vec![tuple]),
                    Some(local),
                )?;
            }
        }
        Ok(())
    }

    fn if_statement(&mut self, node: AstNode<'_>) -> Result<()> {
        let condition = self.required(node, "condition")?;
        let condition = self.expression(condition)?;
        let then_node = self.builder.new_node();
        let join = self.builder.new_node();
        let false_body = node.field("falseBody");
        let else_node = match false_body {
            Some(_) => self.builder.new_node(),
            None => join,
        };
        self.builder.branch(condition, then_node, else_node);

        self.builder.switch_to(then_node);
        if let Some(true_body) = node.field("trueBody") {
            self.statement(true_body)?;
        }
        self.builder.goto(join);

        if let Some(false_body) = false_body {
            self.builder.switch_to(else_node);
            self.statement(false_body)?;
            self.builder.goto(join);
        }
        self.builder.switch_to(join);
        Ok(())
    }

    fn while_statement(&mut self, node: AstNode<'_>) -> Result<()> {
        let header = self.builder.new_node();
        self.builder.goto(header);
        self.builder.switch_to(header);
        let condition = self.required(node, "condition")?;
        let condition = self.expression(condition)?;
        let body = self.builder.new_node();
        let exit = self.builder.new_node();
        self.builder.branch(condition, body, exit);

        self.builder.push_loop(LoopTargets {
            continue_to: header,
            break_to: exit,
        });
        self.builder.switch_to(body);
        if let Some(statement) = node.field("body") {
            self.statement(statement)?;
        }
        self.builder.goto(header);
        self.builder.pop_loop();
        self.builder.switch_to(exit);
        Ok(())
    }

    fn do_while_statement(&mut self, node: AstNode<'_>) -> Result<()> {
        let body = self.builder.new_node();
        let check = self.builder.new_node();
        let exit = self.builder.new_node();
        self.builder.goto(body);

        self.builder.push_loop(LoopTargets {
            continue_to: check,
            break_to: exit,
        });
        self.builder.switch_to(body);
        if let Some(statement) = node.field("body") {
            self.statement(statement)?;
        }
        self.builder.goto(check);
        self.builder.pop_loop();

        self.builder.switch_to(check);
        let condition = self.required(node, "condition")?;
        let condition = self.expression(condition)?;
        self.builder.branch(condition, body, exit);
        self.builder.switch_to(exit);
        Ok(())
    }

    fn for_statement(&mut self, node: AstNode<'_>) -> Result<()> {
        self.builder.push_scope();
        if let Some(init) = node.field("initializationExpression") {
            self.statement(init)?;
        }
        let header = self.builder.new_node();
        self.builder.goto(header);
        self.builder.switch_to(header);

        let body = self.builder.new_node();
        let step = self.builder.new_node();
        let exit = self.builder.new_node();
        match node.field("condition") {
            Some(condition) => {
                let condition = self.expression(condition)?;
                self.builder.branch(condition, body, exit);
            }
            None => self.builder.goto(body),
        }

        self.builder.push_loop(LoopTargets {
            continue_to: step,
            break_to: exit,
        });
        self.builder.switch_to(body);
        if let Some(statement) = node.field("body") {
            self.statement(statement)?;
        }
        self.builder.goto(step);
        self.builder.pop_loop();

        self.builder.switch_to(step);
        if let Some(expression) = node.field("loopExpression") {
            self.statement(expression)?;
        }
        self.builder.goto(header);
        self.builder.switch_to(exit);
        self.builder.pop_scope();
        Ok(())
    }

    fn return_statement(&mut self, node: AstNode<'_>) -> Result<()> {
        let values = match node.field("expression") {
            Some(expression) if expression.is("TupleExpression") => {
                let mut values = Vec::new();
                for component in expression.fields("components") {
                    values.push(self.expression(component)?);
                }
                values
            }
            Some(expression) => vec![self.expression(expression)?],
            None => self.builder.returns(),
        };
        self.builder.terminate(Terminator::Return(values));
        Ok(())
    }

    /// `try` lowers the external call, then chains every clause behind an opaque success flag.
    fn try_statement(&mut self, node: AstNode<'_>) -> Result<()> {
        let call = self.required(node, "externalCall")?;
        let result = self.value(call)?;
        let clauses = node.fields("clauses");
        let join = self.builder.new_node();
        let success = self.builder.builtin("try.success", Type::bool());

        for (position, clause) in clauses.iter().enumerate() {
            let clause_node = self.builder.new_node();
            let next = if position + 1 < clauses.len() {
                self.builder.new_node()
            } else {
                join
            };
            self.builder.branch(success, clause_node, next);
            self.builder.switch_to(clause_node);
            self.builder.push_scope();
            let parameters = clause
                .field("parameters")
                .map(|list| list.fields("parameters"))
                .unwrap_or_default();
            for (component, parameter) in parameters.into_iter().enumerate() {
                let Some(local) = self.declare(parameter) else {
                    continue;
                };
                if let (0, Some(result)) = (position, result) {
                    self.builder.call(
                        Callee::Intrinsic(Intrinsic::TupleComponent(component)),
                        CallArgs::positional(vec![result]),
                        Some(local),
                    )?;
                }
            }
            if let Some(block) = clause.field("block") {
                self.statement(block)?;
            }
            self.builder.pop_scope();
            self.builder.goto(join);
            self.builder.switch_to(next);
        }
        self.builder.switch_to(join);
        Ok(())
    }

    fn required<'a>(&self, node: AstNode<'a>, key: &str) -> Result<AstNode<'a>> {
        node.field(key)
            .ok_or_else(|| TransformError::missing(key, node.node_type()))
    }

    fn expression(&mut self, node: AstNode<'_>) -> Result<OperandId> {
        self.value(node)?.ok_or_else(|| {
            TransformError::UnsupportedAst(format!(
                "{} used as a value has no result",
                node.node_type()
            ))
        })
    }

    /// Lowers an expression; calls returning nothing yield `None`.
    fn value(&mut self, node: AstNode<'_>) -> Result<Option<OperandId>> {
        let ty = node.ty();
        let operand = match node.node_type() {
            "Literal" => self.literal(node),
            "Identifier" => self.identifier(node)?,
            "MemberAccess" => self.member_access(node)?,
            "IndexAccess" => self.index_access(node)?,
            "IndexRangeAccess" => {
                let base = self.required(node, "baseExpression")?;
                let mut arguments = vec![self.expression(base)?];
                for key in ["startExpression", "endExpression"] {
                    if let Some(bound) = node.field(key) {
                        arguments.push(self.expression(bound)?);
                    }
                }
                self.builder.intrinsic(Intrinsic::Index, arguments, ty)?
            }
            "BinaryOperation" => {
                let left = self.required(node, "leftExpression")?;
                let right = self.required(node, "rightExpression")?;
                let left = self.expression(left)?;
                let right = self.expression(right)?;
                let operator = node.str_attr("operator").unwrap_or("?");
                self.builder
                    .intrinsic(Intrinsic::Binary(operator.to_string()), vec![left, right], ty)?
            }
            "UnaryOperation" => self.unary_operation(node)?,
            "Assignment" => self.assignment(node)?,
            "Conditional" => {
                let mut arguments = Vec::new();
                for key in ["condition", "trueExpression", "falseExpression"] {
                    let part = self.required(node, key)?;
                    arguments.push(self.expression(part)?);
                }
                self.builder
                    .intrinsic(Intrinsic::Binary("?:".to_string()), arguments, ty)?
            }
            "TupleExpression" => return self.tuple_expression(node),
            "FunctionCall" => return self.function_call(node),
            "FunctionCallOptions" => {
                let inner = self.required(node, "expression")?;
                return self.value(inner);
            }
            "ElementaryTypeNameExpression" | "NewExpression" => {
                let label = node.type_string().unwrap_or("type");
                self.builder.builtin(label, ty)
            }
            other => {
                return Err(TransformError::UnsupportedAst(format!(
                    "expression {}",
                    other
                )))
            }
        };
        Ok(Some(operand))
    }

    fn literal(&mut self, node: AstNode<'_>) -> OperandId {
        let ty = node.ty();
        let value = node.str_attr("value").unwrap_or("");
        let kind = node
            .str_attr("kind")
            .or_else(|| node.str_attr("token"))
            .unwrap_or("number");
        let hex_value = node
            .str_attr("hexValue")
            .or_else(|| node.str_attr("hexvalue"))
            .unwrap_or("");
        let constant = match kind {
            "bool" => Constant::Bool(value == "true"),
            "string" | "unicodeString" => Constant::String(value.to_string()),
            "hexString" => Constant::Bytes(decode_hex(hex_value)),
            _ if matches!(&ty, Type::Elementary(t) if t.starts_with("address")) => {
                Constant::Address(value.to_string())
            }
            _ => match Constant::parse_number(value) {
                Some(Constant::Uint(n)) => {
                    let factor = node
                        .str_attr("subdenomination")
                        .map(subdenomination_factor)
                        .unwrap_or(1);
                    Constant::Uint(n * BigUint::from(factor))
                }
                Some(other) => other,
                None => Constant::String(value.to_string()),
            },
        };
        self.builder.constant(constant, ty)
    }

    fn identifier(&mut self, node: AstNode<'_>) -> Result<OperandId> {
        let (name, refdecl) = identifier_parts(node);
        let name = name.unwrap_or("");
        if let Some(local) = refdecl.and_then(|id| self.locals.get(&id)) {
            return Ok(*local);
        }
        let index = self.index;
        match index.decl(refdecl) {
            Some(
                DeclRef::StateVariable { name, ty, .. } | DeclRef::TopLevelVariable { name, ty },
            ) => Ok(self.builder.state(name, ty.clone())),
            Some(_) => Ok(self.builder.builtin(name, node.ty())),
            None if refdecl.map(|id| id < 0).unwrap_or(true) => {
                Ok(self.builder.builtin(name, node.ty()))
            }
            None => self
                .builder
                .lookup(name)
                .ok_or_else(|| TransformError::VariableNotFound(name.to_string())),
        }
    }

    fn member_access(&mut self, node: AstNode<'_>) -> Result<OperandId> {
        let member = node.member_name().unwrap_or("");
        let base = self.required(node, "expression")?;
        let ty = node.ty();
        if is_namespace(base) {
            let label = format!("{}.{}", namespace_label(base), member);
            return Ok(self.builder.builtin(&label, ty));
        }
        let object = self.expression(base)?;
        let reference = self.builder.reference(ty, object)?;
        self.builder.call(
            Callee::Intrinsic(Intrinsic::Member(member.to_string())),
            CallArgs::positional(vec![object]),
            Some(reference),
        )?;
        Ok(reference)
    }

    fn index_access(&mut self, node: AstNode<'_>) -> Result<OperandId> {
        let ty = node.ty();
        let Some(key) = node.field("indexExpression") else {
            let label = node.type_string().unwrap_or("type");
            return Ok(self.builder.builtin(label, ty));
        };
        let base = self.required(node, "baseExpression")?;
        let object = self.expression(base)?;
        let key = self.expression(key)?;
        let reference = self.builder.reference(ty, object)?;
        self.builder.call(
            Callee::Intrinsic(Intrinsic::Index),
            CallArgs::positional(vec![object, key]),
            Some(reference),
        )?;
        Ok(reference)
    }

    fn lvalue(&mut self, node: AstNode<'_>) -> Result<OperandId> {
        match node.node_type() {
            "TupleExpression" => match node.optional_fields("components").as_slice() {
                [Some(inner)] => self.lvalue(*inner),
                _ => self.expression(node),
            },
            _ => self.expression(node),
        }
    }

    fn unary_operation(&mut self, node: AstNode<'_>) -> Result<OperandId> {
        let operand_node = self.required(node, "subExpression")?;
        let ty = node.ty();
        let operator = node.str_attr("operator").unwrap_or("");
        match operator {
            "!" | "~" => {
                let operand = self.expression(operand_node)?;
                self.builder.unary(operator, operand, ty)
            }
            "-" => {
                let operand = self.expression(operand_node)?;
                let zero = self.builder.constant(Constant::Uint(BigUint::from(0u32)), ty.clone());
                self.builder
                    .intrinsic(Intrinsic::Binary("-".to_string()), vec![zero, operand], ty)
            }
            "++" | "--" => {
                let target = self.lvalue(operand_node)?;
                let previous = if node.bool_attr("prefix") {
                    None
                } else {
                    let copy = self.builder.temp(ty.clone());
                    self.builder.assign(copy, target, ty.clone())?;
                    Some(copy)
                };
                let one = self.builder.constant(Constant::Uint(BigUint::from(1u32)), ty.clone());
                let updated = self.builder.intrinsic(
                    Intrinsic::Binary(operator[..1].to_string()),
                    vec![target, one],
                    ty.clone(),
                )?;
                self.builder.assign(target, updated, ty)?;
                Ok(previous.unwrap_or(updated))
            }
            "delete" => {
                let target = self.lvalue(operand_node)?;
                self.builder.delete(target)?;
                Ok(target)
            }
            _ => self.expression(operand_node),
        }
    }

    fn assignment(&mut self, node: AstNode<'_>) -> Result<OperandId> {
        let left = self.required(node, "leftHandSide")?;
        let right = self.required(node, "rightHandSide")?;
        let operator = node.str_attr("operator").unwrap_or("=");
        let value = self.expression(right)?;

        if left.is("TupleExpression") && left.optional_fields("components").len() > 1 {
            for (position, component) in left.optional_fields("components").into_iter().enumerate() {
                let Some(component) = component else {
                    continue;
                };
                let target = self.lvalue(component)?;
                self.builder.call(
                    Callee::Intrinsic(Intrinsic::TupleComponent(position)),
                    CallArgs::positional(vec![value]),
                    Some(target),
                )?;
            }
            return Ok(value);
        }

        let target = self.lvalue(left)?;
        let ty = left.ty();
        let value = match operator.strip_suffix('=') {
            Some(binary) if !binary.is_empty() => self.builder.intrinsic(
                Intrinsic::Binary(binary.to_string()),
                vec![target, value],
                ty.clone(),
            )?,
            _ => value,
        };
        self.builder.assign(target, value, ty)?;
        Ok(target)
    }

    fn tuple_expression(&mut self, node: AstNode<'_>) -> Result<Option<OperandId>> {
        let components = node.optional_fields("components");
        if let [Some(inner)] = components.as_slice() {
            if !node.bool_attr("isInlineArray") {
                return self.value(*inner);
            }
        }
        let mut values = Vec::new();
        for component in components.into_iter().flatten() {
            values.push(self.expression(component)?);
        }
        let ty = node.ty();
        let result = if node.bool_attr("isInlineArray") {
            self.builder.temp(ty)
        } else {
            self.builder.tuple(ty)
        };
        self.builder.call(
            Callee::Intrinsic(Intrinsic::Initializer),
            CallArgs::positional(values),
            Some(result),
        )?;
        Ok(Some(result))
    }

    fn arguments(&mut self, node: AstNode<'_>) -> Result<CallArgs> {
        let mut values = Vec::new();
        for argument in node.fields("arguments") {
            values.push(self.expression(argument)?);
        }
        let names: Vec<String> = node
            .attr("names")
            .and_then(|v| v.as_array())
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if names.is_empty() {
            Ok(CallArgs::positional(values))
        } else {
            Ok(CallArgs::named(names, values))
        }
    }

    fn function_call(&mut self, node: AstNode<'_>) -> Result<Option<OperandId>> {
        let ty = node.ty();
        let mut callee_node = self.required(node, "expression")?;
        while callee_node.is("FunctionCallOptions") {
            for option in callee_node.fields("options") {
                self.value(option)?;
            }
            callee_node = self.required(callee_node, "expression")?;
        }

        match node.call_kind() {
            "typeConversion" => {
                let args = self.arguments(node)?;
                return Ok(Some(self.builder.intrinsic(
                    Intrinsic::Conversion,
                    args.arguments,
                    ty,
                )?));
            }
            "structConstructorCall" => {
                let args = self.arguments(node)?;
                let structure = expression_label(callee_node);
                return Ok(Some(self.builder.emit_new_structure(&structure, args, ty)?));
            }
            _ => {}
        }

        if callee_node.is("NewExpression") {
            let args = self.arguments(node)?;
            let type_name = callee_node.field("typeName");
            let created = type_name.map(|t| t.ty()).unwrap_or_else(|| ty.clone());
            return Ok(Some(match created {
                Type::Contract(name) => {
                    self.builder
                        .intrinsic(Intrinsic::Creation(name), args.arguments, ty)?
                }
                other => self.builder.emit_new_elementary(other, args.arguments)?,
            }));
        }

        let mut args = self.arguments(node)?;
        let callee = self.resolve_callee(callee_node, &mut args)?;
        let result = self.builder.result_for(ty);
        let reverts = matches!(&callee, Callee::Builtin(name) if name.starts_with("revert"));
        self.builder.call(callee, args, result)?;
        if reverts {
            self.builder.terminate(Terminator::Revert);
        }
        Ok(result)
    }

    fn resolve_callee(&mut self, callee: AstNode<'_>, args: &mut CallArgs) -> Result<Callee> {
        match callee.node_type() {
            "Identifier" => Ok(self.identifier_callee(callee)),
            "MemberAccess" => self.member_callee(callee, args),
            _ => {
                self.value(callee)?;
                Ok(Callee::Unresolved {
                    edge: UnresolvedEdge::Internal,
                    label: expression_label(callee),
                })
            }
        }
    }

    fn identifier_callee(&mut self, callee: AstNode<'_>) -> Callee {
        let (name, refdecl) = identifier_parts(callee);
        let name = name.unwrap_or("");
        let index = self.index;
        match (index.decl(refdecl), refdecl) {
            (Some(DeclRef::Function { declarer: None }), Some(def)) => index
                .instance(None, def)
                .map(Callee::Internal)
                .unwrap_or_else(|| unresolved_internal(name)),
            (Some(DeclRef::Function { .. }), Some(def)) => self.internal_dispatch(def, name),
            (Some(DeclRef::Event(event)), _) => Callee::Intrinsic(Intrinsic::Emit(event.clone())),
            (Some(DeclRef::Error(_)), _) => Callee::Builtin(format!(
                "revert {}",
                signature(name, callee.type_string())
            )),
            (Some(DeclRef::Contract(_)), _) => Callee::Intrinsic(Intrinsic::Conversion),
            (None, refdecl) if refdecl.map(|id| id < 0).unwrap_or(true) => {
                Callee::Builtin(signature(name, callee.type_string()))
            }
            _ => unresolved_internal(name),
        }
    }

    /// Binds an internal call to the most derived override visible in the current context.
    fn internal_dispatch(&self, def: i64, name: &str) -> Callee {
        let index = self.index;
        let unit = self.unit;
        if let Some(ctx) = self.ctx {
            let full_name = index
                .instance(Some(ctx), def)
                .and_then(|id| unit.function(id))
                .map(|f| f.full_name.clone());
            if let Some(id) = full_name.and_then(|n| dispatch(unit, ctx, &n)) {
                return Callee::Internal(id);
            }
        }
        match index.decl(Some(def)) {
            Some(DeclRef::Function {
                declarer: Some(declarer),
            }) => index
                .instance(Some(*declarer), def)
                .map(Callee::Internal)
                .unwrap_or_else(|| unresolved_internal(name)),
            _ => unresolved_internal(name),
        }
    }

    fn member_callee(&mut self, callee: AstNode<'_>, args: &mut CallArgs) -> Result<Callee> {
        let index = self.index;
        let unit = self.unit;
        let member = callee.member_name().unwrap_or("");
        let base = self.required(callee, "expression")?;
        let refdecl = callee.referenced_declaration();
        let base_type = base.ty();
        let is_type_receiver = matches!(base_type, Type::TypeOf(_));

        if identifier_parts(base).0 == Some("super") && base.is("Identifier") {
            let target = self
                .ctx
                .zip(refdecl)
                .and_then(|(ctx, def)| index.instance(Some(ctx), def));
            return Ok(target
                .map(Callee::Internal)
                .unwrap_or_else(|| unresolved_internal(&format!("super.{}", member))));
        }

        match (index.decl(refdecl), refdecl) {
            (Some(DeclRef::Function { declarer: Some(declarer) }), Some(def))
                if unit.contract(*declarer).map(|c| c.is_library()).unwrap_or(false) =>
            {
                if !is_type_receiver {
                    self.attach_receiver(base, args)?;
                }
                let library = unit.contract(*declarer).map(|c| c.name.as_str()).unwrap_or("");
                return Ok(index
                    .instance(Some(*declarer), def)
                    .map(Callee::Library)
                    .unwrap_or_else(|| Callee::Unresolved {
                        edge: UnresolvedEdge::Library,
                        label: format!("{}.{}", library, member),
                    }));
            }
            (Some(DeclRef::Function { declarer: None }), Some(def)) => {
                if !is_type_receiver {
                    self.attach_receiver(base, args)?;
                }
                return Ok(index
                    .instance(None, def)
                    .map(Callee::Internal)
                    .unwrap_or_else(|| unresolved_internal(member)));
            }
            (Some(DeclRef::Function { .. }), Some(def)) if is_type_receiver => {
                let target = self.ctx.and_then(|ctx| index.instance(Some(ctx), def));
                return Ok(target.map(Callee::Internal).unwrap_or_else(|| {
                    unresolved_internal(&format!("{}.{}", namespace_label(base), member))
                }));
            }
            (Some(DeclRef::Event(event)), _) => {
                return Ok(Callee::Intrinsic(Intrinsic::Emit(event.clone())))
            }
            (Some(DeclRef::Error(_)), _) => {
                return Ok(Callee::Builtin(format!(
                    "revert {}",
                    signature(member, callee.type_string())
                )))
            }
            _ => {}
        }

        if let Type::Contract(contract) = &base_type {
            self.value(base)?;
            let target_contract = unit.contract_by_name(contract).map(|c| c.id);
            let target = match (index.decl(refdecl), refdecl) {
                (Some(DeclRef::Function { .. }), Some(def)) => target_contract
                    .and_then(|c| index.instance(Some(c), def))
                    .map(HighLevelTarget::Function),
                (Some(DeclRef::StateVariable { name, .. }), _) => {
                    Some(HighLevelTarget::Variable(name.clone()))
                }
                _ => None,
            };
            return Ok(Callee::HighLevel {
                contract: Some(contract.clone()),
                target: target.unwrap_or_else(|| {
                    HighLevelTarget::Unresolved(signature(member, callee.type_string()))
                }),
            });
        }

        if is_namespace(base) {
            let name = format!("{}.{}", namespace_label(base), member);
            return Ok(Callee::Builtin(signature(&name, callee.type_string())));
        }

        self.attach_receiver(base, args)?;
        let is_address = matches!(&base_type, Type::Elementary(t) if t.starts_with("address"));
        if is_address && LOW_LEVEL_MEMBERS.contains(&member) {
            Ok(Callee::Intrinsic(Intrinsic::LowLevel(member.to_string())))
        } else {
            Ok(Callee::Intrinsic(Intrinsic::Member(member.to_string())))
        }
    }

    /// Passes the receiver of an attached call as its first argument. Named calls keep their names
    /// aligned and only evaluate the receiver.
    fn attach_receiver(&mut self, base: AstNode<'_>, args: &mut CallArgs) -> Result<()> {
        let receiver = self.expression(base)?;
        if args.names.is_none() {
            args.arguments.insert(0, receiver);
        }
        Ok(())
    }
}

fn unresolved_internal(label: &str) -> Callee {
    Callee::Unresolved {
        edge: UnresolvedEdge::Internal,
        label: label.to_string(),
    }
}

/// Magic namespaces (`msg`, `abi`, `block`, ...) and type expressions used as receivers.
fn is_namespace(base: AstNode<'_>) -> bool {
    if base.is("ElementaryTypeNameExpression") {
        return true;
    }
    if matches!(base.ty(), Type::TypeOf(_)) {
        return true;
    }
    let (name, refdecl) = identifier_parts(base);
    base.is("Identifier")
        && name != Some("this")
        && refdecl.map(|id| id < 0).unwrap_or(true)
}

fn namespace_label(base: AstNode<'_>) -> String {
    if base.is("ElementaryTypeNameExpression") {
        if let Some(name) = base
            .field("typeName")
            .and_then(|t| t.name())
            .or_else(|| base.str_attr("typeName"))
            .or_else(|| base.str_attr("value"))
        {
            return name.to_string();
        }
    }
    expression_label(base)
}

/// Source-like label of a callee or receiver expression.
fn expression_label(node: AstNode<'_>) -> String {
    match node.node_type() {
        "Identifier" | "IdentifierPath" => identifier_parts(node).0.unwrap_or("").to_string(),
        "MemberAccess" => {
            let member = node.member_name().unwrap_or("");
            match node.field("expression") {
                Some(base) => format!("{}.{}", expression_label(base), member),
                None => member.to_string(),
            }
        }
        "IndexAccess" => match node.field("baseExpression") {
            Some(base) => format!("{}[...]", expression_label(base)),
            None => "[...]".to_string(),
        },
        other => node
            .type_string()
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// `name(type,...)` from a callee's function type string.
pub fn signature(name: &str, type_string: Option<&str>) -> String {
    let parameters = type_string
        .and_then(function_type_parameters)
        .unwrap_or_default();
    format!("{}({})", name, parameters.join(","))
}

/// Parameter types of `function (uint256,bytes memory) pure returns (...)`, locations stripped.
pub fn function_type_parameters(type_string: &str) -> Option<Vec<String>> {
    let rest = type_string.trim().strip_prefix("function")?;
    let open = rest.find('(')?;
    let mut depth = 0usize;
    let mut close = None;
    for (idx, ch) in rest[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let inner = rest[open + 1..close?].trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    let mut parameters = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parameters.push(Type::from_type_string(&inner[start..idx]).to_string());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parameters.push(Type::from_type_string(&inner[start..]).to_string());
    Some(parameters)
}

fn subdenomination_factor(unit: &str) -> u64 {
    match unit {
        "gwei" => 1_000_000_000,
        "szabo" => 1_000_000_000_000,
        "finney" => 1_000_000_000_000_000,
        "ether" => 1_000_000_000_000_000_000,
        "minutes" => 60,
        "hours" => 3_600,
        "days" => 86_400,
        "weeks" => 604_800,
        "years" => 31_536_000,
        _ => 1,
    }
}

pub(crate) fn decode_hex(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .chars()
        .filter_map(|c| c.to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| match pair {
            [high, low] => (*high << 4) | *low,
            [single] => *single,
            _ => 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_type_parameters_strip_locations() {
        assert_eq!(
            function_type_parameters("function (bool,string memory) pure"),
            Some(vec!["bool".to_string(), "string".to_string()])
        );
        assert_eq!(
            function_type_parameters("function () pure returns (bytes memory)"),
            Some(Vec::new())
        );
        assert_eq!(
            function_type_parameters("function (uint256[] memory,mapping(address => uint256) storage pointer)"),
            Some(vec![
                "uint256[]".to_string(),
                "mapping(address => uint256)".to_string()
            ])
        );
    }

    #[test]
    fn test_signature_without_type_string() {
        assert_eq!(signature("gasleft", None), "gasleft()");
        assert_eq!(
            signature("keccak256", Some("function (bytes memory) pure returns (bytes32)")),
            "keccak256(bytes)"
        );
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("00ff10"), vec![0x00, 0xff, 0x10]);
        assert!(decode_hex("").is_empty());
    }
}
