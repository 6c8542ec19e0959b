/*! Unified interface for contract call-graph extraction.
 *
 * One import for the whole pipeline: load solc or Vyper output into a compilation unit, classify
 * every call site, and emit reports, diagrams or source bundles from the result.
 */

pub use callsight_core as core;
pub use callsight_emit as emit;
pub use callsight_transform as transform;

pub use callsight_core::{
    build_function_call_edges, contract_functions_by_visibility, transitive_bundle, CallEntry,
    CallFilters, CompilationUnit, Contract, EdgeKind, FailurePolicy, Function, FunctionNode,
    Visibility, VisibilityQuery,
};

pub use callsight_emit::{
    build_compilation, render_callgraph_dot, report_to_json, BundleWriter, IrTextEmitter, Report,
    ReportOptions,
};

pub use callsight_transform::{load_solc_unit, preprocess_vyper, VyperOptions};
