use crate::declarations::DeclId;
use crate::function::{FunctionId, Visibility};
use crate::scope::ScopeId;
use crate::source_location::SourceSpan;
use crate::types::Type;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractId(pub u32);

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "contract{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
    /// A Vyper source file.
    Module,
}

impl ContractKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "interface" => ContractKind::Interface,
            "library" => ContractKind::Library,
            _ => ContractKind::Contract,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::Contract => "contract",
            ContractKind::Interface => "interface",
            ContractKind::Library => "library",
            ContractKind::Module => "module",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVariable {
    pub name: String,
    pub ty: Type,
    pub visibility: Visibility,
    pub declarer: String,
    pub is_constant: bool,
    pub is_immutable: bool,
    pub ast_id: Option<i64>,
}

impl StateVariable {
    pub fn new(name: impl Into<String>, ty: Type, declarer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            visibility: Visibility::Internal,
            declarer: declarer.into(),
            is_constant: false,
            is_immutable: false,
            ast_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub name: String,
    pub kind: ContractKind,
    pub is_abstract: bool,
    pub scope: ScopeId,
    /// C3 linearization, most derived (this contract) first.
    pub linearization: Vec<ContractId>,
    /// Every function callable in this contract's context, inherited ones included.
    pub functions: Vec<FunctionId>,
    pub functions_declared: Vec<FunctionId>,
    pub state_variables: Vec<StateVariable>,
    pub declarations: Vec<DeclId>,
    pub source: Option<SourceSpan>,
    pub ast_id: Option<i64>,
}

impl Contract {
    pub fn new(
        id: ContractId,
        name: impl Into<String>,
        kind: ContractKind,
        scope: ScopeId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            is_abstract: false,
            scope,
            linearization: vec![id],
            functions: Vec::new(),
            functions_declared: Vec::new(),
            state_variables: Vec::new(),
            declarations: Vec::new(),
            source: None,
            ast_id: None,
        }
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables.iter().find(|v| v.name == name)
    }

    pub fn is_library(&self) -> bool {
        self.kind == ContractKind::Library
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ContractKind::Interface
    }

    /// Bases in linearization order, excluding this contract.
    pub fn bases(&self) -> impl Iterator<Item = &ContractId> {
        self.linearization.iter().filter(move |id| **id != self.id)
    }
}
