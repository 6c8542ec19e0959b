//! Unit-level passes run once every body has been lowered.

use crate::errors::{Result, TransformError};
use callsight_core::analysis::collect_call_sites;
use callsight_core::{
    compute_dependency, convert_to_ssa, CompilationUnit, ErrorRecord, FailurePolicy,
};

pub trait UnitPass {
    fn name(&self) -> &str;

    fn run(&mut self, unit: &mut CompilationUnit, policy: FailurePolicy) -> Result<()>;

    fn check_prerequisites(&self, unit: &CompilationUnit) -> Result<()> {
        if unit.is_parsed() {
            Ok(())
        } else {
            Err(TransformError::Sequencing(format!(
                "{} before parse",
                self.name()
            )))
        }
    }
}

/// Refills every function's internal, library and high-level call lists from its body.
pub struct CallSitePass;

impl UnitPass for CallSitePass {
    fn name(&self) -> &str {
        "call-sites"
    }

    fn run(&mut self, unit: &mut CompilationUnit, _policy: FailurePolicy) -> Result<()> {
        for function in &mut unit.functions {
            collect_call_sites(function);
        }
        Ok(())
    }
}

pub struct SsaPass;

impl UnitPass for SsaPass {
    fn name(&self) -> &str {
        "ssa"
    }

    fn run(&mut self, unit: &mut CompilationUnit, policy: FailurePolicy) -> Result<()> {
        let mut failures = Vec::new();
        for function in &mut unit.functions {
            let uid = function.uid();
            let Some(body) = function.body.as_mut() else {
                continue;
            };
            match convert_to_ssa(body) {
                Ok(()) => tracing::debug!(function = %uid, nodes = body.nodes.len(), "converted to SSA"),
                Err(err) => {
                    let err = TransformError::from(err);
                    if err.is_fatal() || policy == FailurePolicy::StopOnFirst {
                        return Err(err);
                    }
                    function.body = None;
                    failures.push(ErrorRecord::new(uid, "ssa", err));
                }
            }
        }
        for failure in failures {
            unit.record_error(failure);
        }
        Ok(())
    }
}

pub struct DependencyPass;

impl UnitPass for DependencyPass {
    fn name(&self) -> &str {
        "data-dependency"
    }

    fn run(&mut self, unit: &mut CompilationUnit, _policy: FailurePolicy) -> Result<()> {
        compute_dependency(unit)?;
        Ok(())
    }
}

pub struct AnalysisPipeline {
    passes: Vec<Box<dyn UnitPass>>,
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new()
            .with_pass(Box::new(CallSitePass))
            .with_pass(Box::new(SsaPass))
            .with_pass(Box::new(DependencyPass))
    }
}

impl AnalysisPipeline {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn with_pass(mut self, pass: Box<dyn UnitPass>) -> Self {
        self.passes.push(pass);
        self
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn run(&mut self, unit: &mut CompilationUnit, policy: FailurePolicy) -> Result<()> {
        for pass in &mut self.passes {
            pass.check_prerequisites(unit)?;
            tracing::debug!(pass = pass.name(), unit = %unit.target, "running pass");
            pass.run(unit, policy)?;
        }
        Ok(())
    }
}
