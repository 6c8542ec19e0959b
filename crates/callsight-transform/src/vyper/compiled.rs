//! Compilation unit built from the module AST that `vyper --standard-json` returns.

use super::ast::VyNode;
use super::lower::{ModuleLayout, VyperLowering};
use super::{add_module_function, module_unit};
use crate::errors::{Result, TransformError};
use crate::passes::AnalysisPipeline;
use callsight_core::{
    CompilationUnit, ContractId, ErrorRecord, EventParam, FailurePolicy, Function, FunctionId,
    FunctionKind, Parameter, StateVariable, StructureElems, TopLevel, TopLevelKind, Type,
    Visibility,
};
use serde_json::Value;

/// First module AST in a standard-json output.
pub fn module_ast(artifacts: &Value) -> Option<&Value> {
    artifacts
        .get("sources")?
        .as_object()?
        .values()
        .find_map(|entry| entry.get("ast").filter(|ast| ast.is_object()))
}

/// Contract name under the first source of `contracts`, when the compiler reports one.
pub fn artifact_contract_name(artifacts: &Value) -> Option<String> {
    artifacts
        .get("contracts")?
        .as_object()?
        .values()
        .next()?
        .as_object()?
        .keys()
        .next()
        .cloned()
}

/// Visibility named by the first `@external` or `@internal` decorator.
pub fn decorator_visibility(decorators: &[VyNode<'_>]) -> Option<Visibility> {
    decorators
        .iter()
        .filter(|d| d.is("Name"))
        .find_map(|d| match d.str_attr("id") {
            Some("external") => Some(Visibility::External),
            Some("internal") => Some(Visibility::Internal),
            _ => None,
        })
}

pub struct VyperAstParser {
    unit: CompilationUnit,
    contract: ContractId,
    file: String,
    module: Value,
    layout: ModuleLayout,
    policy: FailurePolicy,
}

impl VyperAstParser {
    pub fn new(
        target: impl Into<String>,
        contract_name: &str,
        file: &str,
        source: &str,
        module: Value,
        policy: FailurePolicy,
    ) -> Self {
        let (unit, contract) = module_unit(target, contract_name, file, source);
        Self {
            unit,
            contract,
            file: file.to_string(),
            module,
            layout: ModuleLayout {
                contract_name: contract_name.to_string(),
                ..ModuleLayout::default()
            },
            policy,
        }
    }

    pub fn unit(&self) -> &CompilationUnit {
        &self.unit
    }

    pub fn into_unit(self) -> CompilationUnit {
        self.unit
    }

    /// Registers state variables, declarations and function headers. A second call is a no-op.
    pub fn parse(&mut self) -> Result<()> {
        if self.unit.is_parsed() {
            return Ok(());
        }
        let module = VyNode::new(&self.module);
        if !module.is("Module") {
            return Err(TransformError::Parsing(format!(
                "expected a Module AST, found {}",
                module.ast_type()
            )));
        }
        let body = module.nodes("body");

        for node in &body {
            let Some(name) = node.name() else {
                continue;
            };
            match node.ast_type() {
                "StructDef" => self.layout.structs.push(name.to_string()),
                "InterfaceDef" => self.layout.interfaces.push(name.to_string()),
                _ => {}
            }
        }

        let source = self.unit.sources.get(&self.file).map(str::to_string);
        let scope = self
            .unit
            .contract(self.contract)
            .map(|c| c.scope)
            .ok_or_else(|| TransformError::Parsing("module contract missing".to_string()))?;

        for node in body {
            match node.ast_type() {
                "VariableDecl" => {
                    let variable = self.state_variable(node)?;
                    self.layout
                        .states
                        .insert(variable.name.clone(), variable.ty.clone());
                    if let Some(contract) = self.unit.contract_mut(self.contract) {
                        contract.state_variables.push(variable);
                    }
                }
                "StructDef" | "EventDef" | "EnumDef" | "FlagDef" => {
                    let name = node
                        .name()
                        .ok_or_else(|| TransformError::missing("name", node.ast_type()))?;
                    let kind = match node.ast_type() {
                        "StructDef" => TopLevelKind::Structure {
                            elements: StructureElems::new(),
                        },
                        "EventDef" => TopLevelKind::Event {
                            elems: Vec::new(),
                            anonymous: false,
                        },
                        _ => TopLevelKind::Enum { values: Vec::new() },
                    };
                    let owner = self.layout.contract_name.clone();
                    self.unit.add_declaration(
                        scope,
                        Some(&owner),
                        name,
                        kind,
                        vec![node.value().clone()],
                    );
                }
                "FunctionDef" => {
                    let function = self.function_header(node, source.as_deref());
                    let name = function.name.clone();
                    let returns = function.returns.iter().map(|p| p.ty.clone()).collect();
                    let fid = add_module_function(&mut self.unit, self.contract, function);
                    self.layout.functions.insert(name.clone(), fid);
                    self.layout.returns.insert(name, returns);
                }
                _ => {}
            }
        }

        self.unit.mark_parsed();
        tracing::info!(
            target_unit = %self.unit.target,
            functions = self.unit.functions.len(),
            "vyper AST parsed"
        );
        Ok(())
    }

    /// Fills declarations, lowers every function body and runs the passes.
    pub fn analyze(&mut self) -> Result<()> {
        if !self.unit.is_parsed() {
            return Err(TransformError::Sequencing("analyze before parse".to_string()));
        }
        if self.unit.is_analyzed() {
            return Ok(());
        }

        for position in 0..self.unit.declarations.len() {
            let result = match self.unit.declarations.get_mut(position) {
                Some(decl) => analyze_declaration(decl, &self.layout)
                    .map_err(|err| (decl.canonical_name.clone(), err)),
                None => continue,
            };
            if let Err((name, err)) = result {
                self.recover(name, "declaration", err)?;
            }
        }

        self.lower_bodies()?;
        AnalysisPipeline::default().run(&mut self.unit, self.policy)?;
        self.unit.mark_analyzed()?;
        tracing::info!(
            target_unit = %self.unit.target,
            functions = self.unit.functions.len(),
            errors = self.unit.errors.len(),
            "vyper unit analyzed"
        );
        Ok(())
    }

    fn state_variable(&self, node: VyNode<'_>) -> Result<StateVariable> {
        let name = node
            .child("target")
            .and_then(|t| t.name())
            .ok_or_else(|| TransformError::missing("target", "VariableDecl"))?;
        let ty = node
            .child("annotation")
            .map(|a| self.layout.annotation(a))
            .unwrap_or(Type::Unknown);
        let mut variable = StateVariable::new(name, ty, self.layout.contract_name.as_str());
        variable.visibility = if node.bool_attr("is_public") {
            Visibility::Public
        } else {
            Visibility::Internal
        };
        variable.is_constant = node.bool_attr("is_constant");
        variable.is_immutable = node.bool_attr("is_immutable");
        variable.ast_id = node.node_id();
        Ok(variable)
    }

    fn function_header(&self, node: VyNode<'_>, source: Option<&str>) -> Function {
        let name = node.str_attr("name").unwrap_or("");
        let kind = if name == "__default__" {
            FunctionKind::Fallback
        } else {
            FunctionKind::Function
        };
        let mut function = Function::new(FunctionId(0), name, kind);
        function.contract_context = Some(self.layout.contract_name.clone());
        function.declarer = Some(self.layout.contract_name.clone());
        match decorator_visibility(&node.nodes("decorator_list")) {
            Some(visibility) => function.visibility = visibility,
            None => {
                function.visibility = Visibility::External;
                function.visibility_defaulted = true;
            }
        }
        function.is_implemented = true;

        let parameters = node
            .child("args")
            .map(|arguments| arguments.nodes("args"))
            .unwrap_or_default()
            .into_iter()
            .map(|arg| {
                let ty = arg
                    .child("annotation")
                    .map(|a| self.layout.annotation(a))
                    .unwrap_or(Type::Unknown);
                Parameter::new(arg.str_attr("arg").unwrap_or(""), ty)
            })
            .collect();
        function.set_signature(parameters);
        function.set_bare_names();

        function.returns = match node.child("returns") {
            Some(returns) if returns.is("Tuple") => returns
                .nodes("elements")
                .into_iter()
                .map(|e| Parameter::new("", self.layout.annotation(e)))
                .collect(),
            Some(returns) => vec![Parameter::new("", self.layout.annotation(returns))],
            None => Vec::new(),
        };
        function.source = node.span(&self.file, source);
        function.ast_id = node.node_id();
        function
    }

    fn lower_bodies(&mut self) -> Result<()> {
        let module = VyNode::new(&self.module);
        let definitions: Vec<VyNode<'_>> = module
            .nodes("body")
            .into_iter()
            .filter(|n| n.is("FunctionDef"))
            .collect();
        let source = self.unit.sources.get(&self.file).map(str::to_string);

        let mut counters = std::mem::take(&mut self.unit.counters);
        let mut lowered = Vec::new();
        let mut failures = Vec::new();
        for definition in definitions {
            let Some(fid) = definition
                .str_attr("name")
                .and_then(|name| self.layout.functions.get(name))
                .copied()
            else {
                continue;
            };
            let uid = self.unit.function(fid).map(|f| f.uid()).unwrap_or_default();
            let result =
                VyperLowering::new(&self.layout, &self.file, source.as_deref(), &mut counters)
                    .lower(definition);
            match result {
                Ok(body) => {
                    tracing::debug!(function = %uid, nodes = body.nodes.len(), "body lowered");
                    lowered.push((fid, body));
                }
                Err(err) if err.is_fatal() || self.policy == FailurePolicy::StopOnFirst => {
                    self.unit.counters = counters;
                    return Err(err);
                }
                Err(err) => failures.push(ErrorRecord::new(uid, "lower", err)),
            }
        }
        self.unit.counters = counters;

        for (fid, body) in lowered {
            if let Some(function) = self.unit.function_mut(fid) {
                function.body = Some(body);
            }
        }
        for failure in failures {
            self.unit.record_error(failure);
        }
        Ok(())
    }

    fn recover(&mut self, target: String, stage: &str, err: TransformError) -> Result<()> {
        if err.is_fatal() || self.policy == FailurePolicy::StopOnFirst {
            return Err(err);
        }
        self.unit.record_error(ErrorRecord::new(target, stage, err));
        Ok(())
    }
}

fn analyze_declaration(decl: &mut TopLevel, layout: &ModuleLayout) -> Result<()> {
    let name = decl.canonical_name.clone();
    decl.analyze(|kind, raw| {
        let node = raw
            .first()
            .and_then(VyNode::wrap)
            .ok_or_else(|| TransformError::missing("node", name.as_str()))?;
        match kind {
            TopLevelKind::Structure { elements } => {
                for member in node.nodes("body").into_iter().filter(|m| m.is("AnnAssign")) {
                    let member_name = member
                        .child("target")
                        .and_then(|t| t.name())
                        .ok_or_else(|| TransformError::missing("target", "AnnAssign"))?;
                    let ty = member
                        .child("annotation")
                        .map(|a| layout.annotation(a))
                        .unwrap_or(Type::Unknown);
                    elements.insert(member_name, ty);
                }
            }
            TopLevelKind::Event { elems, .. } => {
                *elems = node
                    .nodes("body")
                    .into_iter()
                    .filter(|m| m.is("AnnAssign"))
                    .map(|member| {
                        let annotation = member.child("annotation");
                        let indexed = annotation
                            .filter(|a| a.is("Call"))
                            .and_then(|a| a.child("func"))
                            .and_then(|f| f.str_attr("id"))
                            == Some("indexed");
                        EventParam {
                            name: member
                                .child("target")
                                .and_then(|t| t.name())
                                .unwrap_or("")
                                .to_string(),
                            ty: annotation
                                .map(|a| layout.annotation(a))
                                .unwrap_or(Type::Unknown),
                            indexed,
                        }
                    })
                    .collect();
            }
            TopLevelKind::Enum { values } => {
                *values = node
                    .nodes("body")
                    .into_iter()
                    .filter_map(|member| {
                        member
                            .child("value")
                            .and_then(|v| v.name())
                            .or_else(|| member.name())
                            .map(str::to_string)
                    })
                    .collect();
            }
            TopLevelKind::CustomError { .. } | TopLevelKind::UsingFor { .. } => {}
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decorator_visibility_takes_first_visibility_name() {
        let decorators = json!([
            {"ast_type": "Call", "func": {"ast_type": "Name", "id": "nonreentrant"}},
            {"ast_type": "Name", "id": "view"},
            {"ast_type": "Name", "id": "internal"},
            {"ast_type": "Name", "id": "external"}
        ]);
        let nodes: Vec<VyNode<'_>> = decorators
            .as_array()
            .unwrap()
            .iter()
            .map(VyNode::new)
            .collect();
        assert_eq!(decorator_visibility(&nodes), Some(Visibility::Internal));
        assert_eq!(decorator_visibility(&nodes[..2]), None);
    }

    #[test]
    fn test_contract_name_from_artifacts() {
        let artifacts = json!({
            "contracts": {"Vault.vy": {"Vault": {"abi": []}}},
            "sources": {"Vault.vy": {"id": 0, "ast": {"ast_type": "Module", "body": []}}}
        });
        assert_eq!(artifact_contract_name(&artifacts), Some("Vault".to_string()));
        assert!(module_ast(&artifacts).is_some());
        assert_eq!(artifact_contract_name(&json!({})), None);
    }

    #[test]
    fn test_analyze_before_parse_fails() {
        let mut parser = VyperAstParser::new(
            "Vault.vy",
            "Vault",
            "Vault.vy",
            "",
            json!({"ast_type": "Module", "body": []}),
            FailurePolicy::StopOnFirst,
        );
        assert!(matches!(parser.analyze(), Err(TransformError::Sequencing(_))));
        parser.parse().unwrap();
        parser.analyze().unwrap();
        parser.analyze().unwrap();
        assert!(parser.unit().is_analyzed());
    }
}
