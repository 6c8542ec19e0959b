/*! Core IR, SSA and call-graph model for contract analysis.
 *
 * Solidity and Vyper express the same interactions (internal calls, library calls, calls into other
 * contracts, modifiers) through very different syntax. This crate holds the language-agnostic model
 * that both front ends lower into: typed operands, a small closed set of IR operations, SSA versions,
 * top-level declarations, and the classifier that turns resolved call sites into a deterministic
 * call graph.
 */

pub mod analysis;
pub mod block;
pub mod callgraph;
pub mod contract;
pub mod declarations;
pub mod function;
pub mod operations;
pub mod scope;
pub mod source_location;
pub mod types;
pub mod unit;
pub mod values;

pub use analysis::{compute_dependency, convert_to_ssa, DataDependency};
pub use block::{Node, NodeId, Phi, Terminator};
pub use callgraph::{
    build_function_call_edges, contract_functions_by_visibility, iter_call_targets,
    transitive_bundle, Bundle, BundleLeaf, CallEntry, CallFilters, CallTarget, EdgeKind,
    FunctionNode, LeafKind, TargetKind, TargetRef, VisibilityQuery,
};
pub use contract::{Contract, ContractId, ContractKind, StateVariable};
pub use declarations::{DeclId, EventParam, StructureElems, TopLevel, TopLevelKind, UsingForEntry};
pub use function::{
    CallSites, Function, FunctionBody, FunctionId, FunctionKind, Parameter, Visibility,
};
pub use operations::{
    CallArgs, CallOperation, Callee, FunctionNames, HighLevelTarget, Intrinsic, Operation,
    UnaryOp, UnresolvedEdge,
};
pub use scope::{FileScope, ScopeId};
pub use source_location::{SourceFiles, SourceSpan};
pub use types::Type;
pub use unit::{CompilationUnit, ErrorRecord, FailurePolicy, IrCounters, Language};
pub use values::{Constant, Operand, OperandArena, OperandId, OperandKind, SsaLink};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("Invalid lvalue: {operand} is a {kind} operand")]
    InvalidLvalue { operand: String, kind: &'static str },
    #[error("Invalid rvalue: {operand} is a {kind} operand")]
    InvalidRvalue { operand: String, kind: &'static str },
    #[error("Unknown unary operator: {0}")]
    UnknownUnaryOperator(String),
    #[error("Reference chain from {operand} exceeds {bound} hops")]
    ReferenceCycle { operand: String, bound: usize },
    #[error("Unknown operand id: {0}")]
    UnknownOperand(u32),
    #[error("Sequencing error: {0}")]
    Sequencing(String),
    #[error("Resolution error: {0}")]
    Resolution(String),
}

impl IrError {
    /// Contract violations come from a defective front end and are never recoverable.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            IrError::InvalidLvalue { .. }
                | IrError::InvalidRvalue { .. }
                | IrError::UnknownUnaryOperator(_)
                | IrError::ReferenceCycle { .. }
                | IrError::UnknownOperand(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IrError>;

#[cfg(test)]
mod tests;
