/*! Solidity front end over solc AST JSON.
 *
 * Accepts a bare `SourceUnit`, `--combined-json ast` output or standard-json output, in either the
 * compact or the legacy AST dialect. The dialect is detected once per parse. Parsing registers every
 * contract, declaration and definition; analysis resolves them in dependency order and lowers the
 * bodies before the unit-level passes run.
 */

pub mod ast;
pub mod contracts;
pub mod declarations;
pub mod index;
pub mod lower;

use crate::errors::{Result, TransformError};
use crate::passes::AnalysisPipeline;
use ast::{detect_compact, src_file_index, AstNode};
use callsight_core::{CompilationUnit, ContractKind, ErrorRecord, FailurePolicy, Language, ScopeId};
use index::{DeclRef, RawContract, RawFreeFunction, SolcIndex};
use lower::FunctionLowering;
use serde_json::Value;
use std::path::Path;

/// One `SourceUnit` of the input, with its file name and compiler source index.
#[derive(Debug, Clone)]
pub struct SourceUnitJson {
    pub path: String,
    pub source_index: Option<usize>,
    pub ast: Value,
}

/// Extracts the source units of any supported solc output shape, ordered by source index.
pub fn extract_source_units(value: &Value) -> Result<Vec<SourceUnitJson>> {
    if let Some(compact) = detect_compact(value) {
        let node = AstNode::new(value, compact);
        let path = node.str_attr("absolutePath").unwrap_or("<input>").to_string();
        return Ok(vec![SourceUnitJson {
            path,
            source_index: node.src().and_then(src_file_index),
            ast: value.clone(),
        }]);
    }

    let sources = value
        .get("sources")
        .and_then(Value::as_object)
        .ok_or_else(|| TransformError::Parsing("no SourceUnit or sources object found".to_string()))?;
    let source_list: Vec<&str> = value
        .get("sourceList")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut units = Vec::new();
    for (path, entry) in sources {
        let Some(ast) = ["ast", "AST", "legacyAST"]
            .iter()
            .find_map(|key| entry.get(*key).filter(|v| v.is_object()))
        else {
            continue;
        };
        let source_index = entry
            .get("id")
            .and_then(Value::as_u64)
            .map(|id| id as usize)
            .or_else(|| source_list.iter().position(|p| p == path))
            .or_else(|| ast.get("src").and_then(Value::as_str).and_then(src_file_index));
        units.push(SourceUnitJson {
            path: path.clone(),
            source_index,
            ast: ast.clone(),
        });
    }
    if units.is_empty() {
        return Err(TransformError::Parsing("sources carry no AST".to_string()));
    }
    units.sort_by_key(|u| u.source_index.unwrap_or(usize::MAX));
    Ok(units)
}

pub struct SolcParser {
    unit: CompilationUnit,
    sources: Vec<SourceUnitJson>,
    compact: bool,
    policy: FailurePolicy,
    index: SolcIndex,
}

impl SolcParser {
    pub fn new(
        target: impl Into<String>,
        sources: Vec<SourceUnitJson>,
        policy: FailurePolicy,
    ) -> Self {
        let compact = sources
            .first()
            .and_then(|s| detect_compact(&s.ast))
            .unwrap_or(true);
        Self {
            unit: CompilationUnit::new(target, Language::Solidity),
            sources,
            compact,
            policy,
            index: SolcIndex::default(),
        }
    }

    pub fn from_json(
        target: impl Into<String>,
        value: &Value,
        policy: FailurePolicy,
    ) -> Result<Self> {
        Ok(Self::new(target, extract_source_units(value)?, policy))
    }

    /// Reads an AST file, attaching the source texts found next to it for snippet rendering.
    pub fn from_path(path: &Path, policy: FailurePolicy) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        let mut parser = Self::from_json(path.display().to_string(), &value, policy)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let files: Vec<String> = parser.sources.iter().map(|s| s.path.clone()).collect();
        for file in files {
            let candidate = Path::new(&file);
            let resolved = if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                base.join(candidate)
            };
            if let Ok(source) = std::fs::read_to_string(&resolved) {
                parser.unit.sources.insert(file, source);
            }
        }
        Ok(parser)
    }

    pub fn is_compact_ast(&self) -> bool {
        self.compact
    }

    pub fn unit(&self) -> &CompilationUnit {
        &self.unit
    }

    pub fn into_unit(self) -> CompilationUnit {
        self.unit
    }

    /// Registers every contract, declaration and definition. A second call is a no-op.
    pub fn parse(&mut self) -> Result<()> {
        if self.unit.is_parsed() {
            return Ok(());
        }
        let compact = self.compact;

        let mut source_list: Vec<String> = Vec::new();
        for source in &self.sources {
            if let Some(idx) = source.source_index {
                if source_list.len() <= idx {
                    source_list.resize(idx + 1, String::new());
                }
                source_list[idx] = source.path.clone();
            }
        }
        self.unit.source_list = source_list;

        for source in &self.sources {
            let root = AstNode::new(&source.ast, compact);
            if detect_compact(&source.ast) != Some(compact) {
                return Err(TransformError::Parsing(format!(
                    "{} does not use the {} AST dialect",
                    source.path,
                    if compact { "compact" } else { "legacy" }
                )));
            }
            let scope = self.unit.add_scope(source.path.as_str());
            for member in root.members() {
                register_top_level(&mut self.unit, &mut self.index, scope, &source.path, member)?;
            }
        }

        self.unit.mark_parsed();
        tracing::info!(
            target_unit = %self.unit.target,
            contracts = self.unit.contracts.len(),
            compact,
            "solc AST parsed"
        );
        Ok(())
    }

    /// Resolves state variables, declarations and headers, lowers bodies and runs the passes.
    pub fn analyze(&mut self) -> Result<()> {
        if !self.unit.is_parsed() {
            return Err(TransformError::Sequencing("analyze before parse".to_string()));
        }
        if self.unit.is_analyzed() {
            return Ok(());
        }
        let compact = self.compact;

        contracts::resolve_state_variables(&mut self.unit, &self.index, compact);

        for position in 0..self.unit.declarations.len() {
            let result = match self.unit.declarations.get_mut(position) {
                Some(decl) => declarations::analyze_declaration(decl, compact)
                    .map_err(|err| (decl.canonical_name.clone(), err)),
                None => continue,
            };
            if let Err((name, err)) = result {
                self.recover(name, "declaration", err)?;
            }
        }

        contracts::build_function_headers(&mut self.unit, &mut self.index, compact);
        contracts::resolve_header_calls(&mut self.unit, &self.index, compact);
        self.lower_bodies()?;

        AnalysisPipeline::default().run(&mut self.unit, self.policy)?;
        self.unit.mark_analyzed()?;
        tracing::info!(
            target_unit = %self.unit.target,
            functions = self.unit.functions.len(),
            errors = self.unit.errors.len(),
            "solc unit analyzed"
        );
        Ok(())
    }

    fn lower_bodies(&mut self) -> Result<()> {
        let compact = self.compact;
        let files = self.unit.source_list.clone();
        let mut instances: Vec<_> = self
            .index
            .instances
            .iter()
            .map(|((ctx, def), fid)| (*fid, *ctx, *def))
            .collect();
        instances.sort();

        let mut counters = std::mem::take(&mut self.unit.counters);
        let mut lowered = Vec::new();
        let mut failures = Vec::new();
        for (fid, ctx, def) in instances {
            let Some(function) = self.unit.function(fid) else {
                continue;
            };
            if !function.is_implemented {
                continue;
            }
            let uid = function.uid();
            let file = function
                .source
                .as_ref()
                .map(|s| s.file.clone())
                .unwrap_or_default();
            let Some(value) = self.index.definitions.get(&def) else {
                continue;
            };
            let definition = AstNode::new(value, compact);

            let result =
                FunctionLowering::new(&self.unit, &self.index, ctx, &files, &file, &mut counters)
                    .lower(definition);
            match result {
                Ok(body) => {
                    tracing::debug!(function = %uid, "body lowered");
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
                function.body = body;
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

/// Parses and analyzes an AST file in one go.
pub fn load_solc_unit(path: &Path, policy: FailurePolicy) -> Result<CompilationUnit> {
    let mut parser = SolcParser::from_path(path, policy)?;
    parser.parse()?;
    parser.analyze()?;
    Ok(parser.into_unit())
}

fn register_top_level(
    unit: &mut CompilationUnit,
    index: &mut SolcIndex,
    scope: ScopeId,
    file: &str,
    node: AstNode<'_>,
) -> Result<()> {
    match node.node_type() {
        "ContractDefinition" => register_contract(unit, index, scope, file, node),
        "FunctionDefinition" => {
            let id = node
                .id()
                .ok_or_else(|| TransformError::missing("id", "FunctionDefinition"))?;
            index.decls.insert(id, DeclRef::Function { declarer: None });
            index.definitions.insert(id, node.value().clone());
            index.free_functions.push(RawFreeFunction {
                scope,
                file: file.to_string(),
                def_id: id,
            });
            Ok(())
        }
        "VariableDeclaration" => {
            let id = node
                .id()
                .ok_or_else(|| TransformError::missing("id", "VariableDeclaration"))?;
            index.decls.insert(
                id,
                DeclRef::TopLevelVariable {
                    name: node.name().unwrap_or("").to_string(),
                    ty: node.ty(),
                },
            );
            index.top_level_variables.push((scope, node.value().clone()));
            Ok(())
        }
        _ => {
            register_declaration(unit, index, scope, None, node);
            Ok(())
        }
    }
}

fn register_declaration(
    unit: &mut CompilationUnit,
    index: &mut SolcIndex,
    scope: ScopeId,
    owner: Option<&str>,
    node: AstNode<'_>,
) {
    let Some(kind) = declarations::pending_kind(node) else {
        return;
    };
    let Some(name) = declarations::declaration_name(node) else {
        return;
    };
    let decl = unit.add_declaration(
        scope,
        owner,
        &name,
        kind,
        declarations::raw_capture(node),
    );
    let canonical = unit
        .declaration(decl)
        .map(|d| d.canonical_name.clone())
        .unwrap_or(name);
    if let Some(id) = node.id() {
        let reference = match node.node_type() {
            "EventDefinition" => DeclRef::Event(canonical),
            "ErrorDefinition" => DeclRef::Error(canonical),
            "StructDefinition" => DeclRef::Struct(canonical),
            "EnumDefinition" => DeclRef::Enum(canonical),
            _ => return,
        };
        index.decls.insert(id, reference);
    }
}

fn register_contract(
    unit: &mut CompilationUnit,
    index: &mut SolcIndex,
    scope: ScopeId,
    file: &str,
    node: AstNode<'_>,
) -> Result<()> {
    let name = node.required_str("name")?;
    let kind = node
        .str_attr("contractKind")
        .map(ContractKind::parse)
        .unwrap_or(ContractKind::Contract);
    let contract_id = unit.add_contract(name, kind, scope);
    let files = unit.source_list.clone();
    if let Some(contract) = unit.contract_mut(contract_id) {
        contract.is_abstract = node.bool_attr("abstract")
            || node
                .attr("fullyImplemented")
                .and_then(Value::as_bool)
                .map(|implemented| !implemented && kind == ContractKind::Contract)
                .unwrap_or(false);
        contract.ast_id = node.id();
        contract.source = node.span(&files, file);
    }
    if let Some(id) = node.id() {
        index.decls.insert(id, DeclRef::Contract(contract_id));
    }

    let mut raw = RawContract {
        id: contract_id,
        scope,
        file: file.to_string(),
        linearized: node
            .attr("linearizedBaseContracts")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default(),
        state_variables: Vec::new(),
        definitions: Vec::new(),
        inheritance: Vec::new(),
    };

    let members = if node.is_compact() {
        raw.inheritance = node
            .nodes("baseContracts")
            .into_iter()
            .map(|n| n.value().clone())
            .collect();
        node.nodes("nodes")
    } else {
        node.children()
    };

    for member in members {
        match member.node_type() {
            "InheritanceSpecifier" => raw.inheritance.push(member.value().clone()),
            "VariableDeclaration" => {
                if let Some(id) = member.id() {
                    index.decls.insert(
                        id,
                        DeclRef::StateVariable {
                            declarer: contract_id,
                            name: member.name().unwrap_or("").to_string(),
                            ty: member.ty(),
                        },
                    );
                }
                raw.state_variables.push(member.value().clone());
            }
            "FunctionDefinition" | "ModifierDefinition" => {
                let id = member
                    .id()
                    .ok_or_else(|| TransformError::missing("id", member.node_type()))?;
                let reference = if member.is("ModifierDefinition") {
                    DeclRef::Modifier {
                        declarer: contract_id,
                    }
                } else {
                    DeclRef::Function {
                        declarer: Some(contract_id),
                    }
                };
                index.decls.insert(id, reference);
                index.definitions.insert(id, member.value().clone());
                raw.definitions.push(id);
            }
            _ => register_declaration(unit, index, scope, Some(name), member),
        }
    }

    index.contracts.push(raw);
    Ok(())
}
