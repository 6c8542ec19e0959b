/*! Call-graph classification over resolved call sites.
 *
 * Every function records five pre-classified call lists. This module turns them into typed call
 * targets, filters and deduplicates them into deterministic per-function records, expands
 * transitive bundles from entry points, and groups a contract's functions by visibility.
 */

pub mod bundle;
pub mod edges;
pub mod grouping;
pub mod targets;

pub use bundle::{transitive_bundle, Bundle, BundleLeaf, LeafKind};
pub use edges::{build_function_call_edges, CallEntry, CallFilters, FunctionNode};
pub use grouping::{contract_functions_by_visibility, VisibilityQuery};
pub use targets::{iter_call_targets, CallTarget, EdgeKind, TargetKind, TargetRef};
