use crate::analysis::dependency::DataDependency;
use crate::contract::{Contract, ContractId, ContractKind};
use crate::declarations::{DeclId, TopLevel, TopLevelKind};
use crate::function::{Function, FunctionId};
use crate::operations::FunctionNames;
use crate::scope::{FileScope, ScopeId};
use crate::source_location::SourceFiles;
use crate::{IrError, Result};
use serde::{Deserialize, Serialize};

/// Numbering for IR-introduced operands. Indices are unique across a compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrCounters {
    temporary: u32,
    reference: u32,
    tuple: u32,
}

impl IrCounters {
    pub fn next_temporary(&mut self) -> u32 {
        let index = self.temporary;
        self.temporary += 1;
        index
    }

    pub fn next_reference(&mut self) -> u32 {
        let index = self.reference;
        self.reference += 1;
        index
    }

    pub fn next_tuple(&mut self) -> u32 {
        let index = self.tuple;
        self.tuple += 1;
        index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Solidity,
    Vyper,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    #[default]
    StopOnFirst,
    CollectAndContinue,
}

/// A recoverable failure recorded while building a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub target: String,
    pub stage: String,
    pub error: String,
}

impl ErrorRecord {
    pub fn new(target: impl Into<String>, stage: impl Into<String>, error: impl ToString) -> Self {
        Self {
            target: target.into(),
            stage: stage.into(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub target: String,
    pub language: Language,
    pub scopes: Vec<FileScope>,
    pub declarations: Vec<TopLevel>,
    pub contracts: Vec<Contract>,
    pub functions: Vec<Function>,
    pub sources: SourceFiles,
    /// Source indices used by compiler `src` attributes.
    pub source_list: Vec<String>,
    pub counters: IrCounters,
    pub data_dependency: DataDependency,
    pub errors: Vec<ErrorRecord>,
    pub warning: Option<String>,
    parsed: bool,
    analyzed: bool,
}

impl CompilationUnit {
    pub fn new(target: impl Into<String>, language: Language) -> Self {
        Self {
            target: target.into(),
            language,
            scopes: Vec::new(),
            declarations: Vec::new(),
            contracts: Vec::new(),
            functions: Vec::new(),
            sources: SourceFiles::new(),
            source_list: Vec::new(),
            counters: IrCounters::default(),
            data_dependency: DataDependency::default(),
            errors: Vec::new(),
            warning: None,
            parsed: false,
            analyzed: false,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    pub fn is_analyzed(&self) -> bool {
        self.analyzed
    }

    pub fn mark_parsed(&mut self) {
        self.parsed = true;
    }

    pub fn mark_analyzed(&mut self) -> Result<()> {
        if !self.parsed {
            return Err(IrError::Sequencing("analyze before parse".to_string()));
        }
        self.analyzed = true;
        Ok(())
    }

    pub fn add_scope(&mut self, filename: impl Into<String>) -> ScopeId {
        let filename = filename.into();
        if let Some(existing) = self.scopes.iter().find(|s| s.filename == filename) {
            return existing.id;
        }
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(FileScope::new(id, filename));
        id
    }

    pub fn scope(&self, id: ScopeId) -> Option<&FileScope> {
        self.scopes.get(id.0 as usize)
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> Option<&mut FileScope> {
        self.scopes.get_mut(id.0 as usize)
    }

    /// Registers a declaration in its scope under its canonical name.
    pub fn add_declaration(
        &mut self,
        scope: ScopeId,
        owner: Option<&str>,
        name: &str,
        kind: TopLevelKind,
        raw: Vec<serde_json::Value>,
    ) -> DeclId {
        let id = DeclId(self.declarations.len() as u32);
        let mut decl = TopLevel::new(id, scope, name, kind, raw);
        if let Some(owner) = owner {
            decl = decl.with_owner(owner);
        }
        let key = decl.canonical_name.clone();
        self.declarations.push(decl);
        if let Some(scope) = self.scope_mut(scope) {
            scope.register_declaration(key, id);
        }
        if let Some(owner) = owner {
            if let Some(contract) = self.contracts.iter_mut().find(|c| c.name == owner) {
                contract.declarations.push(id);
            }
        }
        id
    }

    pub fn declaration(&self, id: DeclId) -> Option<&TopLevel> {
        self.declarations.get(id.0 as usize)
    }

    pub fn declaration_mut(&mut self, id: DeclId) -> Option<&mut TopLevel> {
        self.declarations.get_mut(id.0 as usize)
    }

    pub fn add_contract(&mut self, name: &str, kind: ContractKind, scope: ScopeId) -> ContractId {
        let id = ContractId(self.contracts.len() as u32);
        self.contracts.push(Contract::new(id, name, kind, scope));
        if let Some(scope) = self.scope_mut(scope) {
            scope.register_contract(name, id);
        }
        id
    }

    pub fn contract(&self, id: ContractId) -> Option<&Contract> {
        self.contracts.get(id.0 as usize)
    }

    pub fn contract_mut(&mut self, id: ContractId) -> Option<&mut Contract> {
        self.contracts.get_mut(id.0 as usize)
    }

    pub fn contract_by_name(&self, name: &str) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.name == name)
    }

    pub fn next_function_id(&self) -> FunctionId {
        FunctionId(self.functions.len() as u32)
    }

    /// Appends a function, assigning it the next id.
    pub fn add_function(&mut self, mut function: Function) -> FunctionId {
        let id = self.next_function_id();
        function.id = id;
        self.functions.push(function);
        id
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id.0 as usize)
    }

    pub fn function_by_uid(&self, uid: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.uid() == uid)
    }

    pub fn functions_of<'a>(
        &'a self,
        contract: &'a Contract,
    ) -> impl Iterator<Item = &'a Function> {
        contract
            .functions
            .iter()
            .filter_map(move |id| self.function(*id))
    }

    pub fn record_error(&mut self, record: ErrorRecord) {
        tracing::warn!(
            failed = %record.target,
            stage = %record.stage,
            "recoverable failure: {}",
            record.error
        );
        self.errors.push(record);
    }
}

impl FunctionNames for CompilationUnit {
    fn function_label(&self, id: FunctionId) -> String {
        self.function(id)
            .map(|f| f.display_name())
            .unwrap_or_else(|| id.to_string())
    }
}
