/*! Vyper front end.
 *
 * A Vyper file is one contract. When the compiler produces a module AST the unit is built from it
 * and every body is lowered into IR; when compilation fails the textual scanner builds the same
 * contract, functions and call lists without bodies, and the failure is kept as the unit's warning.
 */

pub mod ast;
pub mod compiled;
pub mod compiler;
pub mod fallback;
pub mod lower;

use crate::errors::Result;
use callsight_core::{
    Callee, CompilationUnit, ContractId, ContractKind, FailurePolicy, Function, FunctionId,
    Language, SourceSpan,
};
use compiled::{artifact_contract_name, module_ast, VyperAstParser};
use compiler::{detect_version_directive, rewrite_version_directive, VyperCompiler};
use std::path::{Path, PathBuf};

pub use compiler::ProcessVyperCompiler;

#[derive(Debug, Clone)]
pub struct VyperOptions {
    /// Compiler version written into the `@version` directive before compiling.
    pub version: Option<String>,
    pub compiler_bin: Option<PathBuf>,
    pub include_external_calls: bool,
    pub include_builtin_calls: bool,
}

impl Default for VyperOptions {
    fn default() -> Self {
        Self {
            version: None,
            compiler_bin: None,
            include_external_calls: true,
            include_builtin_calls: false,
        }
    }
}

impl VyperOptions {
    pub fn compiler(&self) -> ProcessVyperCompiler {
        match &self.compiler_bin {
            Some(binary) => ProcessVyperCompiler::new(binary.clone()),
            None => ProcessVyperCompiler::default(),
        }
    }
}

/// Empty unit holding one module contract for `file`.
pub(crate) fn module_unit(
    target: impl Into<String>,
    contract_name: &str,
    file: &str,
    source: &str,
) -> (CompilationUnit, ContractId) {
    let mut unit = CompilationUnit::new(target, Language::Vyper);
    unit.sources.insert(file, source);
    unit.source_list = vec![file.to_string()];
    let scope = unit.add_scope(file);
    let contract = unit.add_contract(contract_name, ContractKind::Module, scope);
    if let Some(module) = unit.contract_mut(contract) {
        module.source = Some(SourceSpan::new(file, 0, source.len()));
    }
    (unit, contract)
}

pub(crate) fn add_module_function(
    unit: &mut CompilationUnit,
    contract: ContractId,
    function: Function,
) -> FunctionId {
    let full_name = function.full_name.clone();
    let fid = unit.add_function(function);
    if let Some(module) = unit.contract_mut(contract) {
        module.functions.push(fid);
        module.functions_declared.push(fid);
        let scope = module.scope;
        if let Some(scope) = unit.scope_mut(scope) {
            scope.register_function(full_name, fid);
        }
    }
    fid
}

/// Compiles a Vyper file and builds its unit, falling back to the textual scanner on failure.
pub fn preprocess_vyper(
    path: &Path,
    options: &VyperOptions,
    compiler: &dyn VyperCompiler,
    policy: FailurePolicy,
) -> Result<CompilationUnit> {
    let source = std::fs::read_to_string(path)?;
    let target = path.display().to_string();
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| target.clone());
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Contract".to_string());

    if let Some(directive) = detect_version_directive(&source) {
        tracing::info!(file = %target, version = %directive, "vyper version directive");
    }
    let compiled_source = match &options.version {
        Some(version) => rewrite_version_directive(&source, version),
        None => source.clone(),
    };

    let compiled = match compiler.compile(&file, &compiled_source) {
        Ok(artifacts) => match module_ast(&artifacts) {
            Some(module) => Ok((
                artifact_contract_name(&artifacts).unwrap_or_else(|| stem.clone()),
                module.clone(),
            )),
            None => Err("vyper compilation failed; used source parser".to_string()),
        },
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => Err(err.to_string()),
    };

    let mut unit = match compiled {
        Ok((contract_name, module)) => {
            let mut parser =
                VyperAstParser::new(target, &contract_name, &file, &source, module, policy);
            parser.parse()?;
            parser.analyze()?;
            parser.into_unit()
        }
        Err(warning) => {
            tracing::warn!(file = %target, "vyper compilation failed, using source parser: {}", warning);
            let mut unit = fallback::build_source_unit(target, &stem, &file, &source, policy)?;
            unit.warning = Some(warning);
            unit
        }
    };
    prune_call_sites(&mut unit, options);
    Ok(unit)
}

/// Drops high-level and builtin call sites the options exclude.
pub fn prune_call_sites(unit: &mut CompilationUnit, options: &VyperOptions) {
    for function in &mut unit.functions {
        if !options.include_external_calls {
            function.calls.high_level.clear();
        }
        if !options.include_builtin_calls {
            function
                .calls
                .internal
                .retain(|callee| !matches!(callee, Callee::Builtin(_)));
        }
    }
}
