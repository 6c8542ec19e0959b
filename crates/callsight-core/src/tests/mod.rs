/*! Unit coverage for the operand model, operations, SSA, dependencies and call-graph classification.
 *
 * Front ends are expected to hand over well-formed bodies, so most tests build small bodies by hand
 * and check the invariants the analyses rely on.
 */

#![allow(unused_imports)]

mod callgraph_tests;
mod dependency_tests;
mod operand_tests;
mod ssa_tests;
mod type_tests;
