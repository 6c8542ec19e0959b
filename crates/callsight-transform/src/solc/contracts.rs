//! Contract-level analysis: state variables, linearization, function instances per context and the
//! call lists carried by declaration headers (modifiers and base constructors).

use super::ast::AstNode;
use super::index::{dispatch_modifier, DeclRef, SolcIndex};
use callsight_core::{
    CompilationUnit, ContractId, Function, FunctionId, FunctionKind, Parameter, StateVariable,
    Visibility,
};
use std::collections::HashSet;

/// Fills linearization and state variables for every contract, then the file-level constants,
/// before any body is looked at.
pub fn resolve_state_variables(unit: &mut CompilationUnit, index: &SolcIndex, compact: bool) {
    for raw in &index.contracts {
        let Some(name) = unit.contract(raw.id).map(|c| c.name.clone()) else {
            continue;
        };
        let linearization: Vec<ContractId> = raw
            .linearized
            .iter()
            .filter_map(|id| index.contract_of(*id))
            .collect();

        let variables: Vec<StateVariable> = raw
            .state_variables
            .iter()
            .map(|value| state_variable(AstNode::new(value, compact), &name))
            .collect();

        if let Some(contract) = unit.contract_mut(raw.id) {
            if !linearization.is_empty() {
                contract.linearization = linearization;
            }
            contract.state_variables = variables;
        }
    }

    for (scope, value) in &index.top_level_variables {
        let Some(filename) = unit.scope(*scope).map(|s| s.filename.clone()) else {
            continue;
        };
        let variable = state_variable(AstNode::new(value, compact), &filename);
        if let Some(file_scope) = unit.scope_mut(*scope) {
            file_scope.register_variable(variable);
        }
    }
}

fn state_variable(node: AstNode<'_>, declarer: &str) -> StateVariable {
    let mutability = node.str_attr("mutability").unwrap_or("mutable");
    let mut variable = StateVariable::new(node.name().unwrap_or(""), node.ty(), declarer);
    variable.visibility = node
        .str_attr("visibility")
        .and_then(Visibility::parse)
        .unwrap_or(Visibility::Internal);
    variable.is_constant = node.bool_attr("constant") || mutability == "constant";
    variable.is_immutable = mutability == "immutable";
    variable.ast_id = node.id();
    variable
}

pub fn function_kind(node: AstNode<'_>, declarer: Option<&str>) -> FunctionKind {
    if node.is("ModifierDefinition") {
        return FunctionKind::Modifier;
    }
    match node.str_attr("kind") {
        Some("constructor") => FunctionKind::Constructor,
        Some("fallback") => FunctionKind::Fallback,
        Some("receive") => FunctionKind::Receive,
        Some("freeFunction") => FunctionKind::Free,
        Some(_) => FunctionKind::Function,
        None => {
            let name = node.name().unwrap_or("");
            if node.bool_attr("isConstructor") || (declarer.is_some() && declarer == Some(name)) {
                FunctionKind::Constructor
            } else if name.is_empty() {
                FunctionKind::Fallback
            } else if declarer.is_none() {
                FunctionKind::Free
            } else {
                FunctionKind::Function
            }
        }
    }
}

pub fn has_body(node: AstNode<'_>) -> bool {
    if node.is_compact() {
        node.child("body").is_some()
    } else {
        node.children().iter().any(|c| c.is("Block"))
    }
}

fn parameters(nodes: Vec<AstNode<'_>>) -> Vec<Parameter> {
    nodes
        .into_iter()
        .map(|p| Parameter::new(p.name().unwrap_or(""), p.ty()))
        .collect()
}

/// Function header for one definition seen from `context`.
pub fn function_from_definition(
    node: AstNode<'_>,
    context: Option<&str>,
    declarer: Option<&str>,
    files: &[String],
    file: &str,
) -> Function {
    let kind = function_kind(node, declarer);
    let name = match kind {
        FunctionKind::Constructor => "constructor",
        FunctionKind::Fallback => "fallback",
        FunctionKind::Receive => "receive",
        _ => node.name().unwrap_or(""),
    };
    let mut function = Function::new(FunctionId(0), name, kind);
    function.contract_context = context.map(str::to_string);
    function.declarer = declarer.map(str::to_string);
    function.visibility = match kind {
        FunctionKind::Modifier | FunctionKind::Free => Visibility::Internal,
        _ => node
            .str_attr("visibility")
            .and_then(Visibility::parse)
            .unwrap_or(Visibility::Public),
    };
    function.is_implemented = node
        .attr("implemented")
        .and_then(|v| v.as_bool())
        .unwrap_or_else(|| has_body(node));
    function.set_signature(parameters(node.parameter_list("parameters", 0)));
    function.returns = parameters(node.parameter_list("returnParameters", 1));
    function.source = node.span(files, file);
    function.ast_id = node.id();
    function
}

/// Instantiates every function and modifier once per contract context, most derived first.
///
/// A definition is shadowed in a context when a more derived contract of its linearization already
/// declared the same signature. Constructors are only instantiated in their own contract.
pub fn build_function_headers(unit: &mut CompilationUnit, index: &mut SolcIndex, compact: bool) {
    let files = unit.source_list.clone();
    let contexts: Vec<ContractId> = index.contracts.iter().map(|c| c.id).collect();

    for ctx in contexts {
        let Some((ctx_name, linearization)) = unit
            .contract(ctx)
            .map(|c| (c.name.clone(), c.linearization.clone()))
        else {
            continue;
        };
        let mut seen: HashSet<String> = HashSet::new();

        for base in linearization {
            let Some((definitions, file)) = index
                .raw_contract(base)
                .map(|raw| (raw.definitions.clone(), raw.file.clone()))
            else {
                continue;
            };
            let Some(base_name) = unit.contract(base).map(|c| c.name.clone()) else {
                continue;
            };

            for def_id in definitions {
                let Some(value) = index.definitions.get(&def_id) else {
                    continue;
                };
                let node = AstNode::new(value, compact);
                let mut function = function_from_definition(
                    node,
                    Some(&ctx_name),
                    Some(&base_name),
                    &files,
                    &file,
                );
                if function.is_constructor() && base != ctx {
                    continue;
                }
                let key = if function.is_modifier() {
                    format!("modifier {}", function.name)
                } else {
                    function.full_name.clone()
                };
                function.is_shadowed = !seen.insert(key) && !function.is_constructor();

                let fid = unit.add_function(function);
                if let Some(contract) = unit.contract_mut(ctx) {
                    contract.functions.push(fid);
                    if base == ctx {
                        contract.functions_declared.push(fid);
                    }
                }
                index.instances.insert((Some(ctx), def_id), fid);
            }
        }
        tracing::debug!(contract = %ctx_name, "function headers built");
    }

    let free_functions = index.free_functions.clone();
    for free in free_functions {
        let Some(value) = index.definitions.get(&free.def_id) else {
            continue;
        };
        let node = AstNode::new(value, compact);
        let mut function = function_from_definition(node, None, None, &files, &free.file);
        function.kind = FunctionKind::Free;
        let full_name = function.full_name.clone();
        let fid = unit.add_function(function);
        if let Some(scope) = unit.scope_mut(free.scope) {
            scope.register_function(full_name, fid);
        }
        index.instances.insert((None, free.def_id), fid);
    }
}

/// Name and referenced declaration of an identifier or identifier path.
pub fn identifier_parts<'a>(node: AstNode<'a>) -> (Option<&'a str>, Option<i64>) {
    let name = node
        .str_attr("name")
        .or_else(|| node.str_attr("value"))
        .or_else(|| node.str_attr("namePath"));
    (name, node.referenced_declaration())
}

fn modifier_invocations<'a>(node: AstNode<'a>) -> Vec<(Option<&'a str>, Option<i64>)> {
    let invocations = if node.is_compact() {
        node.nodes("modifiers")
    } else {
        node.children()
            .into_iter()
            .filter(|c| c.is("ModifierInvocation"))
            .collect()
    };
    invocations
        .into_iter()
        .filter_map(|invocation| {
            let name_node = if invocation.is_compact() {
                invocation.child("modifierName")
            } else {
                invocation.children().first().copied()
            };
            name_node.map(identifier_parts)
        })
        .collect()
}

fn own_constructor(unit: &CompilationUnit, contract: ContractId) -> Option<FunctionId> {
    let contract = unit.contract(contract)?;
    contract
        .functions_declared
        .iter()
        .copied()
        .find(|id| unit.function(*id).map(|f| f.is_constructor()).unwrap_or(false))
}

/// Base contracts given constructor arguments in the inheritance list of `contract`.
fn inheritance_with_arguments(
    index: &SolcIndex,
    contract: ContractId,
    compact: bool,
) -> Vec<ContractId> {
    let Some(raw) = index.raw_contract(contract) else {
        return Vec::new();
    };
    raw.inheritance
        .iter()
        .filter_map(|value| {
            let spec = AstNode::new(value, compact);
            let (base, has_arguments) = if compact {
                (spec.child("baseName"), !spec.nodes("arguments").is_empty())
            } else {
                let children = spec.children();
                (children.first().copied(), children.len() > 1)
            };
            if !has_arguments {
                return None;
            }
            index.contract_of(base?.referenced_declaration()?)
        })
        .collect()
}

/// Records modifier and explicit base-constructor calls of every function instance.
pub fn resolve_header_calls(unit: &mut CompilationUnit, index: &SolcIndex, compact: bool) {
    let mut instances: Vec<((Option<ContractId>, i64), FunctionId)> =
        index.instances.iter().map(|(k, v)| (*k, *v)).collect();
    instances.sort_by_key(|(_, fid)| *fid);

    for ((ctx, def_id), fid) in instances {
        let Some(value) = index.definitions.get(&def_id) else {
            continue;
        };
        let node = AstNode::new(value, compact);
        let mut modifiers = Vec::new();
        let mut base_constructors = Vec::new();

        for (name, refdecl) in modifier_invocations(node) {
            match index.decl(refdecl) {
                Some(DeclRef::Contract(base)) => {
                    if let Some(ctor) = own_constructor(unit, *base) {
                        base_constructors.push(ctor);
                    }
                }
                _ => {
                    let resolved = ctx
                        .zip(name)
                        .and_then(|(c, n)| dispatch_modifier(unit, c, n))
                        .or_else(|| refdecl.and_then(|d| index.instance(ctx, d)));
                    if let Some(modifier) = resolved {
                        modifiers.push(modifier);
                    }
                }
            }
        }

        let is_own_constructor = unit
            .function(fid)
            .map(|f| f.is_constructor() && f.declarer == f.contract_context)
            .unwrap_or(false);
        if let (true, Some(ctx)) = (is_own_constructor, ctx) {
            for base in inheritance_with_arguments(index, ctx, compact) {
                if let Some(ctor) = own_constructor(unit, base) {
                    if !base_constructors.contains(&ctor) {
                        base_constructors.push(ctor);
                    }
                }
            }
        }

        if let Some(function) = unit.function_mut(fid) {
            function.calls.modifiers = modifiers;
            function.calls.base_constructors = base_constructors;
        }
    }
}

