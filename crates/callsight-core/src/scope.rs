use crate::contract::{ContractId, StateVariable};
use crate::declarations::DeclId;
use crate::function::FunctionId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

/// Name tables of one source file, used to resolve identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileScope {
    pub id: ScopeId,
    pub filename: String,
    pub declarations: IndexMap<String, DeclId>,
    pub contracts: IndexMap<String, ContractId>,
    pub functions: IndexMap<String, FunctionId>,
    /// File-level constants.
    pub variables: IndexMap<String, StateVariable>,
}

impl FileScope {
    pub fn new(id: ScopeId, filename: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
            declarations: IndexMap::new(),
            contracts: IndexMap::new(),
            functions: IndexMap::new(),
            variables: IndexMap::new(),
        }
    }

    pub fn register_declaration(&mut self, name: impl Into<String>, id: DeclId) {
        self.declarations.insert(name.into(), id);
    }

    pub fn register_contract(&mut self, name: impl Into<String>, id: ContractId) {
        self.contracts.insert(name.into(), id);
    }

    pub fn register_function(&mut self, full_name: impl Into<String>, id: FunctionId) {
        self.functions.insert(full_name.into(), id);
    }

    pub fn register_variable(&mut self, variable: StateVariable) {
        self.variables.insert(variable.name.clone(), variable);
    }

    pub fn variable(&self, name: &str) -> Option<&StateVariable> {
        self.variables.get(name)
    }

    pub fn declaration(&self, name: &str) -> Option<DeclId> {
        self.declarations.get(name).copied()
    }

    pub fn contract(&self, name: &str) -> Option<ContractId> {
        self.contracts.get(name).copied()
    }
}
