/*! Front ends lowering compiler output into callsight IR.
 *
 * The same call can be written many ways: `L.f(x)` or `x.f()` through `using for`, `super.f()`,
 * `self.f()` in Vyper. Each front end resolves those spellings against the compiler's AST and emits
 * the closed operation set of `callsight-core`, so the call graph never depends on surface syntax.
 * Solidity input is solc AST JSON in either dialect; Vyper input is a source file compiled through
 * `vyper --standard-json`, with a textual fallback when no compiler is available.
 */

pub mod errors;
pub mod lowering;
pub mod passes;
pub mod solc;
pub mod vyper;

pub use errors::{Result, TransformError};
pub use passes::{AnalysisPipeline, UnitPass};
pub use solc::{extract_source_units, load_solc_unit, SolcParser, SourceUnitJson};
pub use vyper::compiler::VyperCompiler;
pub use vyper::{preprocess_vyper, ProcessVyperCompiler, VyperOptions};

#[cfg(test)]
mod tests;
