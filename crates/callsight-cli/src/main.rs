use anyhow::{bail, Context, Result};
use callsight_core::{
    CallFilters, CompilationUnit, ErrorRecord, FailurePolicy, Visibility, VisibilityQuery,
};
use callsight_emit::{
    build_compilation, render_callgraph_dot, report_to_json, safe_fs_name, write_external_bundles,
    BundleWriter, IrTextEmitter, Report, ReportOptions,
};
use callsight_transform::{load_solc_unit, preprocess_vyper, VyperOptions};
use clap::Parser;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "callsight")]
#[command(about = "Per-function call edges (A -> B) of Solidity and Vyper contracts")]
#[command(version)]
#[command(author = "Gianluca Brigandi <gbrigand@gmail.com>")]
struct Cli {
    /// solc AST JSON files or Vyper sources.
    targets: Vec<String>,

    /// File with one target per line; blank lines and `#` comments are skipped.
    #[arg(long)]
    targets_file: Option<PathBuf>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write one source bundle per external function under this directory.
    #[arg(long)]
    dump_external_dir: Option<PathBuf>,

    #[arg(long, requires = "output")]
    emit_callgraph: bool,

    /// Write the IR listing of every compilation next to the report.
    #[arg(long, requires = "output")]
    emit_ir: bool,

    /// Comma-separated visibilities to report.
    #[arg(long, value_delimiter = ',')]
    only_visibility: Option<Vec<String>>,

    #[arg(long)]
    declared_only: bool,

    #[arg(long)]
    include_shadowed: bool,

    #[arg(long)]
    no_external_calls: bool,

    #[arg(long)]
    no_library_calls: bool,

    #[arg(long)]
    no_modifiers: bool,

    #[arg(long)]
    no_base_constructors: bool,

    #[arg(long)]
    include_solidity_calls: bool,

    /// Record failures in the report and keep going.
    #[arg(long)]
    no_fail: bool,

    #[arg(long)]
    vyper_version: Option<String>,

    #[arg(long)]
    vyper_bin: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn filters(&self) -> CallFilters {
        CallFilters {
            include_external_calls: !self.no_external_calls,
            include_library_calls: !self.no_library_calls,
            include_solidity_calls: self.include_solidity_calls,
            include_modifiers: !self.no_modifiers,
            include_base_constructors: !self.no_base_constructors,
        }
    }

    fn query(&self) -> Result<VisibilityQuery> {
        let visibilities = match &self.only_visibility {
            Some(names) => {
                let mut parsed = Vec::new();
                for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
                    match Visibility::parse(name) {
                        Some(visibility) => parsed.push(visibility),
                        None => bail!("unknown visibility `{}`", name),
                    }
                }
                Some(parsed)
            }
            None => None,
        };
        Ok(VisibilityQuery {
            include_inherited: !self.declared_only,
            include_shadowed: self.include_shadowed,
            visibilities,
        })
    }

    fn vyper_options(&self) -> VyperOptions {
        VyperOptions {
            version: self.vyper_version.clone(),
            compiler_bin: self.vyper_bin.clone(),
            include_external_calls: !self.no_external_calls,
            include_builtin_calls: self.include_solidity_calls,
        }
    }

    fn policy(&self) -> FailurePolicy {
        if self.no_fail {
            FailurePolicy::CollectAndContinue
        } else {
            FailurePolicy::StopOnFirst
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Targets from the targets file followed by the positional ones, first occurrence kept.
fn load_targets(cli: &Cli) -> Result<Vec<String>> {
    let mut targets = Vec::new();
    if let Some(file) = &cli.targets_file {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("reading targets file {}", file.display()))?;
        targets.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    targets.extend(cli.targets.iter().cloned());

    let mut seen = HashSet::new();
    targets.retain(|target| seen.insert(target.clone()));
    Ok(targets)
}

fn is_vyper(path: &Path) -> bool {
    path.extension().map(|ext| ext == "vy").unwrap_or(false)
}

fn load_unit(cli: &Cli, target: &str) -> Result<CompilationUnit> {
    let path = Path::new(target);
    if !path.is_file() {
        bail!("{} is not a file", target);
    }
    if is_vyper(path) {
        let options = cli.vyper_options();
        let compiler = options.compiler();
        return Ok(preprocess_vyper(path, &options, &compiler, cli.policy())?);
    }
    Ok(load_solc_unit(path, cli.policy())?)
}

fn stage_of(target: &str) -> &'static str {
    if is_vyper(Path::new(target)) {
        "vyper"
    } else {
        "contract_preprocess"
    }
}

fn record_failure(
    report: &mut Report,
    cli: &Cli,
    target: &str,
    stage: &str,
    error: anyhow::Error,
) -> Result<()> {
    if !cli.no_fail {
        return Err(error.context(format!("{} failed for {}", stage, target)));
    }
    tracing::warn!(failed = %target, stage = %stage, "{:#}", error);
    report
        .errors
        .push(ErrorRecord::new(target, stage, format!("{:#}", error)));
    Ok(())
}

fn write_callgraphs(report: &Report, output: &Path) -> Result<()> {
    match report.compilations.as_slice() {
        [] => {}
        [only] => {
            let path = output.with_extension("callgraph.dot");
            std::fs::write(&path, render_callgraph_dot(only))
                .with_context(|| format!("writing {}", path.display()))?;
        }
        many => {
            let stem = output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report".to_string());
            let dir = output
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(format!("{}.callgraph", stem));
            std::fs::create_dir_all(&dir)?;
            for (idx, compilation) in many.iter().enumerate() {
                let path = dir.join(format!("{:03}.{}.dot", idx, safe_fs_name(&compilation.target)));
                std::fs::write(&path, render_callgraph_dot(compilation))
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }
    }
    Ok(())
}

fn write_ir(units: &[(String, CompilationUnit)], output: &Path) -> Result<()> {
    let emitter = IrTextEmitter::new();
    let mut text = String::new();
    for (target, unit) in units {
        text.push_str(&format!("// target: {}\n", target));
        text.push_str(&emitter.render(unit)?);
    }
    let path = output.with_extension("ir");
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let targets = load_targets(&cli)?;
    if targets.is_empty() {
        bail!("No targets provided. Pass targets as arguments or via --targets-file.");
    }

    let options = ReportOptions {
        filters: cli.filters(),
        query: cli.query()?,
    };
    let mut report = Report::new(targets.clone());
    let mut units = Vec::new();

    for target in &targets {
        let unit = match load_unit(&cli, target) {
            Ok(unit) => unit,
            Err(error) => {
                record_failure(&mut report, &cli, target, stage_of(target), error)?;
                continue;
            }
        };
        tracing::info!(file = %target, functions = unit.functions.len(), "loaded compilation unit");
        report.errors.extend(unit.errors.iter().cloned());

        report
            .compilations
            .push(build_compilation(&unit, target, &options)?);

        if let Some(base) = &cli.dump_external_dir {
            let dir = if targets.len() > 1 {
                base.join(safe_fs_name(target))
            } else {
                base.clone()
            };
            let writer = BundleWriter::new(dir, options.filters);
            if let Err(error) = write_external_bundles(&unit, &writer, &options.query) {
                record_failure(&mut report, &cli, target, "dump-external", error)?;
            }
        }
        units.push((target.clone(), unit));
    }

    let json = report_to_json(&report)?;
    match &cli.output {
        Some(output) => {
            std::fs::write(output, &json)
                .with_context(|| format!("writing {}", output.display()))?;
            if cli.emit_callgraph {
                write_callgraphs(&report, output)?;
            }
            if cli.emit_ir {
                write_ir(&units, output)?;
            }
            if cli.verbose {
                use colored::*;
                eprintln!(
                    " {} {} compilation(s), {} error(s) -> {}",
                    "SUCCESS:".bright_green().bold(),
                    report.compilations.len(),
                    report.errors.len(),
                    output.display()
                );
            }
        }
        None => print!("{}", json),
    }

    Ok(())
}
