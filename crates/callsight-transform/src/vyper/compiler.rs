//! Vyper compiler boundary: standard-json invocation and version directives.

use crate::errors::{Result, TransformError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Lines scanned for a version directive.
const HEADER_LINES: usize = 50;

static VERSION_DIRECTIVES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)^\s*#\s*@version\s+(?P<spec>[^#\s]+)\s*$").expect("valid regex"),
        Regex::new(r"(?i)^\s*#\s*pragma\s+version\s+(?P<spec>[^#\s]+)\s*$").expect("valid regex"),
    ]
});

static VERSION_PREFIXES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)^(?P<prefix>\s*#\s*)@version\s+[^#\s]+\s*$").expect("valid regex"),
        Regex::new(r"(?i)^(?P<prefix>\s*#\s*)pragma\s+version\s+[^#\s]+\s*$").expect("valid regex"),
    ]
});

pub trait VyperCompiler {
    /// Compiles one source and returns the standard-json output.
    fn compile(&self, file_name: &str, source: &str) -> Result<Value>;
}

/// Runs `<binary> --standard-json` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessVyperCompiler {
    binary: PathBuf,
}

impl Default for ProcessVyperCompiler {
    fn default() -> Self {
        Self::new("vyper")
    }
}

impl ProcessVyperCompiler {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }
}

impl VyperCompiler for ProcessVyperCompiler {
    fn compile(&self, file_name: &str, source: &str) -> Result<Value> {
        let request = standard_json_request(file_name, source);
        tracing::debug!(binary = %self.binary.display(), file = file_name, "invoking vyper");

        let mut child = Command::new(&self.binary)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                TransformError::Compiler(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    err
                ))
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(serde_json::to_string(&request)?.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let artifacts: Value = if stdout.is_empty() {
            json!({})
        } else {
            serde_json::from_str(&stdout).map_err(|_| {
                TransformError::Compiler(format!(
                    "vyper did not return JSON.\nstdout:\n{}\nstderr:\n{}",
                    stdout,
                    String::from_utf8_lossy(&output.stderr)
                ))
            })?
        };
        if let Some(errors) = compile_errors(&artifacts) {
            return Err(TransformError::Compiler(errors));
        }
        Ok(artifacts)
    }
}

pub fn standard_json_request(file_name: &str, source: &str) -> Value {
    json!({
        "language": "Vyper",
        "sources": { file_name: { "content": source } },
        "settings": {
            "outputSelection": {
                "*": {
                    "*": [
                        "abi",
                        "devdoc",
                        "userdoc",
                        "evm.bytecode",
                        "evm.deployedBytecode",
                        "evm.deployedBytecode.sourceMap"
                    ],
                    "": ["ast"]
                }
            }
        }
    })
}

/// Diagnostics of any severity other than `warning`, joined by blank lines.
pub fn compile_errors(artifacts: &Value) -> Option<String> {
    let diagnostics = artifacts.get("errors")?.as_array()?;
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.get("severity").and_then(Value::as_str) != Some("warning"))
        .map(|d| {
            d.get("formattedMessage")
                .or_else(|| d.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| d.to_string())
        })
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("\n\n"))
    }
}

/// Version spec from a `# @version` or `# pragma version` header line, without a leading `v`.
pub fn detect_version_directive(source: &str) -> Option<String> {
    for line in source.lines().take(HEADER_LINES) {
        for pattern in VERSION_DIRECTIVES.iter() {
            let Some(captures) = pattern.captures(line) else {
                continue;
            };
            let spec = captures.name("spec").map(|m| m.as_str().trim()).unwrap_or("");
            let spec = spec.strip_prefix('v').unwrap_or(spec);
            return (!spec.is_empty()).then(|| spec.to_string());
        }
    }
    None
}

/// Rewrites the first version directive to `@version <version>`, keeping its comment prefix.
pub fn rewrite_version_directive(source: &str, version: &str) -> String {
    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    for position in 0..lines.len().min(HEADER_LINES) {
        let rewritten = VERSION_PREFIXES.iter().find_map(|pattern| {
            pattern.captures(&lines[position]).map(|captures| {
                let prefix = captures.name("prefix").map(|m| m.as_str()).unwrap_or("# ");
                format!("{}@version {}", prefix, version)
            })
        });
        if let Some(line) = rewritten {
            lines[position] = line;
            let mut text = lines.join("\n");
            if source.ends_with('\n') {
                text.push('\n');
            }
            return text;
        }
    }
    source.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_version_directives() {
        assert_eq!(
            detect_version_directive("# @version ^0.3.9\n"),
            Some("^0.3.9".to_string())
        );
        assert_eq!(
            detect_version_directive("\n#pragma version v0.4.0\n"),
            Some("0.4.0".to_string())
        );
        assert_eq!(
            detect_version_directive("# @VERSION 0.2.16"),
            Some("0.2.16".to_string())
        );
        assert_eq!(detect_version_directive("x: uint256\n"), None);
    }

    #[test]
    fn test_directive_past_header_is_ignored() {
        let mut source = "\n".repeat(HEADER_LINES);
        source.push_str("# @version 0.3.10\n");
        assert_eq!(detect_version_directive(&source), None);
    }

    #[test]
    fn test_rewrite_keeps_prefix_and_trailing_newline() {
        let source = "  #  pragma version ^0.3.0\nx: uint256\n";
        assert_eq!(
            rewrite_version_directive(source, "0.3.10"),
            "  #  @version 0.3.10\nx: uint256\n"
        );
        assert_eq!(rewrite_version_directive("x: uint256", "0.3.10"), "x: uint256");
    }

    #[test]
    fn test_compile_errors_skip_warnings() {
        let artifacts = json!({
            "errors": [
                {"severity": "warning", "message": "unused"},
                {"severity": "error", "formattedMessage": "E1", "message": "ignored"},
                {"severity": "error", "message": "E2"}
            ]
        });
        assert_eq!(compile_errors(&artifacts), Some("E1\n\nE2".to_string()));
        assert_eq!(compile_errors(&json!({})), None);
    }

    #[test]
    fn test_request_shape() {
        let request = standard_json_request("Vault.vy", "x: uint256");
        assert_eq!(request["language"], "Vyper");
        assert_eq!(request["sources"]["Vault.vy"]["content"], "x: uint256");
        assert_eq!(request["settings"]["outputSelection"]["*"][""][0], "ast");
    }
}
