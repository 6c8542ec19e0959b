//! AST-id index built during parse and consulted while resolving references.

use callsight_core::{CompilationUnit, ContractId, FunctionId, ScopeId, Type};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum DeclRef {
    Contract(ContractId),
    /// `declarer` is `None` for free functions.
    Function { declarer: Option<ContractId> },
    Modifier { declarer: ContractId },
    StateVariable { declarer: ContractId, name: String, ty: Type },
    /// File-level constant.
    TopLevelVariable { name: String, ty: Type },
    Event(String),
    Error(String),
    Struct(String),
    Enum(String),
}

/// A contract definition as captured at parse time.
#[derive(Debug, Clone)]
pub struct RawContract {
    pub id: ContractId,
    pub scope: ScopeId,
    pub file: String,
    /// `linearizedBaseContracts`, most derived first.
    pub linearized: Vec<i64>,
    pub state_variables: Vec<Value>,
    /// Function and modifier definitions in declaration order.
    pub definitions: Vec<i64>,
    pub inheritance: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct RawFreeFunction {
    pub scope: ScopeId,
    pub file: String,
    pub def_id: i64,
}

#[derive(Debug, Default)]
pub struct SolcIndex {
    pub decls: HashMap<i64, DeclRef>,
    pub definitions: HashMap<i64, Value>,
    pub contracts: Vec<RawContract>,
    pub free_functions: Vec<RawFreeFunction>,
    /// File-level variable declarations with the scope that holds them.
    pub top_level_variables: Vec<(ScopeId, Value)>,
    /// Function instance per `(contract context, definition id)`.
    pub instances: HashMap<(Option<ContractId>, i64), FunctionId>,
}

impl SolcIndex {
    pub fn decl(&self, id: Option<i64>) -> Option<&DeclRef> {
        self.decls.get(&id?)
    }

    pub fn instance(&self, ctx: Option<ContractId>, def_id: i64) -> Option<FunctionId> {
        self.instances.get(&(ctx, def_id)).copied()
    }

    pub fn raw_contract(&self, id: ContractId) -> Option<&RawContract> {
        self.contracts.iter().find(|c| c.id == id)
    }

    pub fn contract_of(&self, ast_id: i64) -> Option<ContractId> {
        match self.decls.get(&ast_id) {
            Some(DeclRef::Contract(id)) => Some(*id),
            _ => None,
        }
    }
}

/// Most-derived implementation of `full_name` visible in `ctx`.
pub fn dispatch(unit: &CompilationUnit, ctx: ContractId, full_name: &str) -> Option<FunctionId> {
    let contract = unit.contract(ctx)?;
    unit.functions_of(contract)
        .find(|f| !f.is_modifier() && !f.is_shadowed && f.full_name == full_name)
        .or_else(|| {
            unit.functions_of(contract)
                .find(|f| !f.is_modifier() && f.full_name == full_name)
        })
        .map(|f| f.id)
}

/// Most-derived modifier named `name` visible in `ctx`.
pub fn dispatch_modifier(
    unit: &CompilationUnit,
    ctx: ContractId,
    name: &str,
) -> Option<FunctionId> {
    let contract = unit.contract(ctx)?;
    unit.functions_of(contract)
        .find(|f| f.is_modifier() && !f.is_shadowed && f.name == name)
        .map(|f| f.id)
}
