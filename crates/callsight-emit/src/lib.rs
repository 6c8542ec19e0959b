/*! Turn analyzed compilation units into files people read.
 *
 * A call graph is only useful once it leaves the process: as a JSON report another tool consumes,
 * as a DOT diagram, as one text bundle per entry point holding every reachable function's source,
 * or as an IR listing when a lowering needs debugging. Every emitter here is a pure projection of
 * a `CompilationUnit` or of the report built from it.
 */

pub mod bundle;
pub mod dot;
pub mod emitter;
pub mod ir_text;
pub mod report;

pub use bundle::{
    render_bundle, safe_fs_name, source_extension, write_external_bundles, BundleWriter,
};
pub use dot::render_callgraph_dot;
pub use emitter::{EmitContext, EmitHelper, EmitResult, Emitter};
pub use ir_text::IrTextEmitter;
pub use report::{
    build_compilation, report_to_json, CompilationReport, ContractReport, Report, ReportOptions,
    TOOL_NAME,
};
