/*! Passes run over lowered bodies once a unit has been parsed.
 *
 * Call-site collection fills the per-function call lists the call graph is built from. SSA conversion
 * and data dependency run afterwards and never change call sites.
 */

pub mod call_sites;
pub mod dependency;
pub mod ssa;

pub use call_sites::collect_call_sites;
pub use dependency::{compute_dependency, function_dependencies, DataDependency, DependencyMap};
pub use ssa::convert_to_ssa;
