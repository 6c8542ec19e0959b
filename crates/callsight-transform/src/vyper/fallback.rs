//! Textual Vyper front end, used when no compiler output is available.
//!
//! Functions are found by indentation and their call sites by pattern. The resulting unit has the
//! same contracts, functions and call lists as the compiled path, without bodies.

use super::ast::line_offset;
use super::{add_module_function, module_unit};
use crate::errors::Result;
use crate::passes::AnalysisPipeline;
use callsight_core::{
    Callee, CompilationUnit, FailurePolicy, Function, FunctionId, FunctionKind, HighLevelTarget,
    SourceSpan, UnresolvedEdge, Visibility,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const TAB_WIDTH: usize = 4;

static DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)def\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex")
});

static INTERNAL_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bself\.(?P<fn>[A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex")
});

static EXTERNAL_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<obj>[A-Za-z_][A-Za-z0-9_]*)\.(?P<fn>[A-Za-z_][A-Za-z0-9_]*)\s*\(")
        .expect("valid regex")
});

static BARE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex"));

/// Words that precede a parenthesis without being calls.
const NOT_CALLS: &[&str] = &[
    "def", "self", "if", "elif", "while", "for", "in", "not", "and", "or", "assert", "return",
    "raise", "log", "extcall", "staticcall",
];

/// A `def` found in the source text, with 1-based line numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFunction {
    pub name: String,
    pub visibility: Option<Visibility>,
    pub start_line: usize,
    pub end_line: usize,
    pub body: Vec<String>,
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("")
}

fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH - width % TAB_WIDTH,
            _ => break,
        }
    }
    width
}

/// Top-level and nested `def`s with their decorators and indented bodies.
///
/// Signatures inside an `interface` block declare other contracts and are skipped.
pub fn scan_functions(source: &str) -> Vec<SourceFunction> {
    let lines: Vec<&str> = source.lines().collect();
    let mut functions = Vec::new();
    let mut decorators: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let raw = lines[i];
        let stripped = raw.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            i += 1;
            continue;
        }
        if indent_width(raw) == 0 && stripped.starts_with("interface ") {
            decorators.clear();
            i += 1;
            while i < lines.len() && (lines[i].trim().is_empty() || indent_width(lines[i]) > 0) {
                i += 1;
            }
            continue;
        }
        if stripped.starts_with('@') {
            decorators.push(stripped);
            i += 1;
            continue;
        }
        let Some(captures) = DEF.captures(raw) else {
            decorators.clear();
            i += 1;
            continue;
        };

        let def_indent = indent_width(captures.name("indent").map(|m| m.as_str()).unwrap_or(""));
        let name = captures.name("name").map(|m| m.as_str()).unwrap_or("").to_string();
        let visibility = if decorators.iter().any(|d| d.starts_with("@internal")) {
            Some(Visibility::Internal)
        } else if decorators.iter().any(|d| d.starts_with("@external")) {
            Some(Visibility::External)
        } else {
            None
        };
        decorators.clear();

        let start_line = i + 1;
        i += 1;
        let mut body = Vec::new();
        let mut end_line = start_line;
        while i < lines.len() {
            let line = lines[i];
            if !line.trim().is_empty() {
                if indent_width(line) <= def_indent {
                    break;
                }
                end_line = i + 1;
            }
            body.push(line.to_string());
            i += 1;
        }
        functions.push(SourceFunction {
            name,
            visibility,
            start_line,
            end_line,
            body,
        });
    }
    functions
}

/// Names called as bare functions on `code`, skipping method calls and keywords.
pub fn bare_calls(code: &str) -> Vec<&str> {
    BARE_CALL
        .captures_iter(code)
        .filter_map(|captures| captures.name("name"))
        .filter(|m| !code[..m.start()].ends_with('.'))
        .map(|m| m.as_str())
        .filter(|name| !NOT_CALLS.contains(name))
        .collect()
}

fn push_unique(list: &mut Vec<Callee>, callee: Callee) {
    if !list.contains(&callee) {
        list.push(callee);
    }
}

/// Builds an analyzed unit for one Vyper file without compiling it.
pub fn build_source_unit(
    target: impl Into<String>,
    contract_name: &str,
    file: &str,
    source: &str,
    policy: FailurePolicy,
) -> Result<CompilationUnit> {
    let (mut unit, contract) = module_unit(target, contract_name, file, source);
    let scanned = scan_functions(source);

    let mut by_name: HashMap<String, FunctionId> = HashMap::new();
    let mut ids = Vec::new();
    for found in &scanned {
        let kind = if found.name == "__default__" {
            FunctionKind::Fallback
        } else {
            FunctionKind::Function
        };
        let mut function = Function::new(FunctionId(0), found.name.as_str(), kind);
        function.contract_context = Some(contract_name.to_string());
        function.declarer = Some(contract_name.to_string());
        match found.visibility {
            Some(visibility) => function.visibility = visibility,
            None => {
                function.visibility = Visibility::External;
                function.visibility_defaulted = true;
            }
        }
        function.is_implemented = true;
        function.set_bare_names();
        let start = line_offset(source, found.start_line as u32);
        let end = line_offset(source, found.end_line as u32 + 1);
        function.source = Some(
            SourceSpan::new(file, start, end.saturating_sub(start))
                .with_lines(found.start_line as u32, found.end_line as u32),
        );

        let fid = add_module_function(&mut unit, contract, function);
        by_name.insert(found.name.clone(), fid);
        ids.push(fid);
    }

    for (found, fid) in scanned.iter().zip(ids) {
        let mut internal = Vec::new();
        let mut high_level = Vec::new();
        for line in &found.body {
            let code = strip_comment(line);
            for captures in INTERNAL_CALL.captures_iter(code) {
                let callee = captures.name("fn").map(|m| m.as_str()).unwrap_or("");
                let call = match by_name.get(callee) {
                    Some(id) => Callee::Internal(*id),
                    None => Callee::Unresolved {
                        edge: UnresolvedEdge::Internal,
                        label: format!("{}.{}", contract_name, callee),
                    },
                };
                push_unique(&mut internal, call);
            }
            for captures in EXTERNAL_CALL.captures_iter(code) {
                let object = captures.name("obj").map(|m| m.as_str()).unwrap_or("");
                if object == "self" {
                    continue;
                }
                let method = captures.name("fn").map(|m| m.as_str()).unwrap_or("");
                push_unique(
                    &mut high_level,
                    Callee::HighLevel {
                        contract: None,
                        target: HighLevelTarget::Unresolved(format!("{}.{}", object, method)),
                    },
                );
            }
            for name in bare_calls(code) {
                push_unique(&mut internal, Callee::Builtin(name.to_string()));
            }
        }
        if let Some(function) = unit.function_mut(fid) {
            function.calls.internal = internal;
            function.calls.high_level = high_level;
        }
    }

    unit.mark_parsed();
    AnalysisPipeline::default().run(&mut unit, policy)?;
    unit.mark_analyzed()?;
    tracing::info!(
        target_unit = %unit.target,
        functions = unit.functions.len(),
        "vyper source parsed without compiler"
    );
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "\
# @version ^0.3.9
interface Token:
    def transfer(to: address, amount: uint256) -> bool: nonpayable

balance: uint256

@internal
def _check(x: uint256):
    assert x > 0  # self.ignored()

@external
@nonreentrant(\"lock\")
def pay(token: address, x: uint256):
\tself._check(x)

    self.token.transfer(msg.sender, convert(x, uint256))

def __default__():
    pass
";

    #[test]
    fn test_scan_functions_skips_interfaces() {
        let functions = scan_functions(SOURCE);
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["_check", "pay", "__default__"]);
        assert_eq!(functions[0].visibility, Some(Visibility::Internal));
        assert_eq!(functions[1].visibility, Some(Visibility::External));
        assert_eq!(functions[2].visibility, None);
        assert_eq!((functions[1].start_line, functions[1].end_line), (13, 16));
    }

    #[test]
    fn test_tabs_expand_to_four_columns() {
        assert_eq!(indent_width("\tx"), 4);
        assert_eq!(indent_width("  \tx"), 4);
        assert_eq!(indent_width("    \t x"), 9);
    }

    #[test]
    fn test_bare_calls_skip_methods_and_keywords() {
        assert_eq!(
            bare_calls("assert (len(xs) > 0) and self.f(convert(x, uint256)) or a.b()"),
            vec!["len", "convert"]
        );
        assert_eq!(bare_calls("log Transfer(msg.sender, x)"), vec!["Transfer"]);
    }

    #[test]
    fn test_source_unit_call_lists() {
        let unit = build_source_unit("Pay.vy", "Pay", "Pay.vy", SOURCE, FailurePolicy::StopOnFirst)
            .unwrap();
        assert!(unit.is_analyzed());
        let pay = unit.function_by_uid("Pay::pay").unwrap();
        let check = unit.function_by_uid("Pay::_check").unwrap();
        assert!(pay.calls.internal.contains(&Callee::Internal(check.id)));
        assert!(pay.calls.internal.contains(&Callee::Builtin("convert".to_string())));
        assert_eq!(
            pay.calls.high_level,
            vec![Callee::HighLevel {
                contract: None,
                target: HighLevelTarget::Unresolved("token.transfer".to_string()),
            }]
        );
        assert!(check.calls.internal.is_empty());
        let fallback = unit.function_by_uid("Pay::__default__").unwrap();
        assert!(fallback.is_fallback());
        assert!(fallback.visibility_defaulted);
    }
}
