/*! Source bundles: one text file per entry function.
 *
 * A bundle starts with the entry function's source, lists the call targets that have no code
 * (interfaces, builtins, variables) and then appends the source of every function reachable from
 * the entry. Reviewing a bundle means reading everything an external caller can make the contract
 * execute, without following calls by hand.
 */

use anyhow::{anyhow, Context, Result};
use callsight_core::{
    contract_functions_by_visibility, transitive_bundle, CallFilters, CompilationUnit, Function,
    FunctionId, Visibility, VisibilityQuery,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static UNSAFE_FS_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

/// Maps an arbitrary identifier to a portable file name.
pub fn safe_fs_name(value: &str) -> String {
    let cleaned = value.replace("::", "__");
    let cleaned = UNSAFE_FS_CHARS.replace_all(&cleaned, "_");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_' || c == '-');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Extension of the file `function` was written in, `.sol` when unknown.
pub fn source_extension(function: &Function) -> String {
    function
        .source
        .as_ref()
        .and_then(|span| Path::new(&span.file).extension())
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".sol".to_string())
}

fn source_hint(unit: &CompilationUnit, function: &Function) -> Option<String> {
    let span = function.source.as_ref()?;
    match unit.sources.line_range(span) {
        Some((first, last)) => Some(format!("{}:L{}-L{}", span.file, first, last)),
        None => Some(span.file.clone()),
    }
}

fn push_source(sections: &mut Vec<String>, unit: &CompilationUnit, function: &Function) {
    if let Some(hint) = source_hint(unit, function) {
        sections.push(format!("// source: {}", hint));
    }
    let content = function
        .source
        .as_ref()
        .and_then(|span| unit.sources.snippet(span))
        .map(|text| text.trim_matches('\n'))
        .filter(|text| !text.is_empty());
    match content {
        Some(text) => sections.push(text.to_string()),
        None => sections.push("// <no source mapping available>".to_string()),
    }
}

/// Renders the bundle of `entry` under `filters`.
pub fn render_bundle(
    unit: &CompilationUnit,
    entry: FunctionId,
    filters: &CallFilters,
) -> Result<String> {
    let function = unit
        .function(entry)
        .ok_or_else(|| anyhow!("no function with id {}", entry))?;
    let bundle = transitive_bundle(unit, entry, filters)?;

    let mut sections = vec![format!(
        "// entry ({}): {}",
        function.visibility,
        function.display_name()
    )];
    push_source(&mut sections, unit, function);

    if !bundle.leaves.is_empty() {
        sections.push(String::new());
        sections.push("// leaf targets (no body):".to_string());
        for leaf in &bundle.leaves {
            sections.push(format!(
                "//   - ({}) [{}]: {}",
                leaf.edge,
                leaf.kind.as_str(),
                leaf.label
            ));
        }
    }

    for (edge, id) in &bundle.reachable {
        let Some(callee) = unit.function(*id) else {
            continue;
        };
        sections.push(String::new());
        sections.push(format!(
            "// ---- reachable ({}) [{}]: {}",
            edge,
            callee.visibility,
            callee.display_name()
        ));
        push_source(&mut sections, unit, callee);
    }

    let mut text = sections.join("\n").trim_end().to_string();
    text.push('\n');
    Ok(text)
}

/// Writes bundles as `<out_dir>/<Contract>/<uid><ext>`.
#[derive(Debug, Clone)]
pub struct BundleWriter {
    pub out_dir: PathBuf,
    pub filters: CallFilters,
}

impl BundleWriter {
    pub fn new(out_dir: impl Into<PathBuf>, filters: CallFilters) -> Self {
        Self {
            out_dir: out_dir.into(),
            filters,
        }
    }

    pub fn path_for(&self, function: &Function) -> PathBuf {
        let contract = function
            .contract_context
            .as_deref()
            .or(function.declarer.as_deref())
            .unwrap_or("UnknownContract");
        self.out_dir.join(safe_fs_name(contract)).join(format!(
            "{}{}",
            safe_fs_name(&function.uid()),
            source_extension(function)
        ))
    }

    pub fn write(&self, unit: &CompilationUnit, entry: FunctionId) -> Result<PathBuf> {
        let function = unit
            .function(entry)
            .ok_or_else(|| anyhow!("no function with id {}", entry))?;
        let path = self.path_for(function);
        let text = render_bundle(unit, entry, &self.filters)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote bundle");
        Ok(path)
    }
}

/// Writes one bundle per external function of every contract in `unit`.
///
/// `query` controls inheritance and shadowing; its visibility selection is replaced by `external`.
pub fn write_external_bundles(
    unit: &CompilationUnit,
    writer: &BundleWriter,
    query: &VisibilityQuery,
) -> Result<Vec<PathBuf>> {
    let query = VisibilityQuery {
        visibilities: Some(vec![Visibility::External]),
        ..query.clone()
    };
    let mut written = Vec::new();
    for contract in &unit.contracts {
        let groups = contract_functions_by_visibility(unit, contract, &query);
        for id in groups.get(&Visibility::External).into_iter().flatten() {
            written.push(writer.write(unit, *id)?);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_fs_name() {
        assert_eq!(safe_fs_name("Vault::Vault.deposit(uint256)"), "Vault__Vault.deposit_uint256");
        assert_eq!(safe_fs_name("src/a b.sol"), "src_a_b.sol");
        assert_eq!(safe_fs_name("..."), "unnamed");
        assert_eq!(safe_fs_name("Pay::__default__"), "Pay____default");
    }
}
