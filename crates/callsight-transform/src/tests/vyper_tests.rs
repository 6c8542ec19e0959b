use super::{edge_summary, row};
use crate::errors::{Result, TransformError};
use crate::vyper::compiler::VyperCompiler;
use crate::vyper::{preprocess_vyper, VyperOptions};
use callsight_core::{CallFilters, CompilationUnit, FailurePolicy, Type, Visibility};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::path::PathBuf;

const SOURCE: &str = "\
# @version ^0.3.9
interface Token:
    def transfer(to: address, amount: uint256) -> bool: nonpayable

event Paid:
    sender: indexed(address)
    amount: uint256

balance: public(uint256)

@internal
def _check(x: uint256):
    assert x > 0

@external
def pay(token: Token, x: uint256):
    self._check(x)
    token.transfer(msg.sender, convert(x, uint256))
    log Paid(msg.sender, x)

@external
def __default__():
    pass
";

const UIDS: [&str; 3] = ["Pay::_check", "Pay::pay", "Pay::__default__"];

fn name(id: &str) -> Value {
    json!({"ast_type": "Name", "id": id})
}

fn attribute(base: &str, attr: &str) -> Value {
    json!({"ast_type": "Attribute", "value": name(base), "attr": attr})
}

fn call(func: Value, args: Vec<Value>) -> Value {
    json!({"ast_type": "Call", "func": func, "args": args, "keywords": []})
}

fn arg(id: &str, annotation: &str) -> Value {
    json!({"ast_type": "arg", "arg": id, "annotation": name(annotation)})
}

/// Module AST the compiler returns for `SOURCE`.
fn module() -> Value {
    json!({
        "ast_type": "Module",
        "body": [
            {"ast_type": "InterfaceDef", "name": "Token", "body": []},
            {
                "ast_type": "EventDef",
                "name": "Paid",
                "body": [
                    {"ast_type": "AnnAssign", "target": name("sender"), "annotation": call(name("indexed"), vec![name("address")])},
                    {"ast_type": "AnnAssign", "target": name("amount"), "annotation": name("uint256")}
                ]
            },
            {
                "ast_type": "VariableDecl",
                "target": name("balance"),
                "annotation": call(name("public"), vec![name("uint256")]),
                "is_public": true
            },
            {
                "ast_type": "FunctionDef",
                "name": "_check",
                "lineno": 12,
                "end_lineno": 13,
                "decorator_list": [name("internal")],
                "args": {"ast_type": "arguments", "args": [arg("x", "uint256")]},
                "body": [{
                    "ast_type": "Assert",
                    "test": {
                        "ast_type": "Compare",
                        "left": name("x"),
                        "op": {"ast_type": "Gt"},
                        "right": {"ast_type": "Int", "value": 0}
                    }
                }]
            },
            {
                "ast_type": "FunctionDef",
                "name": "pay",
                "lineno": 16,
                "end_lineno": 19,
                "decorator_list": [name("external")],
                "args": {"ast_type": "arguments", "args": [arg("token", "Token"), arg("x", "uint256")]},
                "body": [
                    {"ast_type": "Expr", "value": call(attribute("self", "_check"), vec![name("x")])},
                    {
                        "ast_type": "Expr",
                        "value": call(
                            attribute("token", "transfer"),
                            vec![
                                attribute("msg", "sender"),
                                call(name("convert"), vec![name("x"), name("uint256")])
                            ]
                        )
                    },
                    {"ast_type": "Log", "value": call(name("Paid"), vec![attribute("msg", "sender"), name("x")])}
                ]
            },
            {
                "ast_type": "FunctionDef",
                "name": "__default__",
                "lineno": 22,
                "end_lineno": 23,
                "decorator_list": [name("external")],
                "args": {"ast_type": "arguments", "args": []},
                "body": [{"ast_type": "Pass"}]
            }
        ]
    })
}

fn artifacts() -> Value {
    json!({
        "contracts": {"Pay.vy": {"Pay": {}}},
        "sources": {"Pay.vy": {"id": 0, "ast": module()}}
    })
}

/// Compiler stand-in that records the sources it was handed.
struct StubCompiler {
    output: Option<Value>,
    seen: RefCell<Vec<String>>,
}

impl StubCompiler {
    fn returning(output: Value) -> Self {
        Self {
            output: Some(output),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            output: None,
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl VyperCompiler for StubCompiler {
    fn compile(&self, _file_name: &str, source: &str) -> Result<Value> {
        self.seen.borrow_mut().push(source.to_string());
        self.output
            .clone()
            .ok_or_else(|| TransformError::Compiler("vyper: command not found".to_string()))
    }
}

fn write_source(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("Pay.vy");
    std::fs::write(&path, SOURCE).unwrap();
    path
}

fn preprocess(compiler: &StubCompiler, options: &VyperOptions) -> CompilationUnit {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir);
    preprocess_vyper(&path, options, compiler, FailurePolicy::StopOnFirst).unwrap()
}

#[test]
fn test_compiled_and_source_units_agree() {
    let options = VyperOptions {
        include_builtin_calls: true,
        ..VyperOptions::default()
    };
    let compiled = preprocess(&StubCompiler::returning(artifacts()), &options);
    let scanned = preprocess(&StubCompiler::failing(), &options);
    assert!(compiled.warning.is_none());
    assert!(scanned.warning.is_some());

    let filters = CallFilters {
        include_solidity_calls: true,
        ..CallFilters::default()
    };
    for uid in UIDS {
        let left = compiled.function_by_uid(uid).unwrap();
        let right = scanned.function_by_uid(uid).unwrap();
        assert_eq!(left.visibility, right.visibility, "{}", uid);
        assert_eq!(left.visibility_defaulted, right.visibility_defaulted, "{}", uid);
        assert_eq!(left.kind, right.kind, "{}", uid);
        assert_eq!(left.source, right.source, "{}", uid);
        assert_eq!(
            edge_summary(&compiled, uid, &filters),
            edge_summary(&scanned, uid, &filters),
            "{}",
            uid
        );
    }
    assert_eq!(compiled.functions.len(), scanned.functions.len());
}

#[test]
fn test_pay_edges() {
    let unit = preprocess(&StubCompiler::returning(artifacts()), &VyperOptions::default());
    assert_eq!(
        edge_summary(&unit, "Pay::pay", &CallFilters::default()),
        vec![
            row("external", "unknown", "token.transfer"),
            row("internal", "function", "Pay._check"),
        ]
    );
    let pay = unit.function_by_uid("Pay::pay").unwrap();
    assert_eq!(pay.visibility, Visibility::External);
    assert!(!pay.visibility_defaulted);
    assert!(pay.body.as_ref().map(|b| b.is_ssa).unwrap_or(false));
}

#[test]
fn test_external_calls_can_be_excluded() {
    let options = VyperOptions {
        include_external_calls: false,
        ..VyperOptions::default()
    };
    for compiler in [StubCompiler::returning(artifacts()), StubCompiler::failing()] {
        let unit = preprocess(&compiler, &options);
        assert_eq!(
            edge_summary(&unit, "Pay::pay", &CallFilters::default()),
            vec![row("internal", "function", "Pay._check")]
        );
    }
}

#[test]
fn test_compiler_failure_falls_back_with_warning() {
    let compiler = StubCompiler::failing();
    let unit = preprocess(&compiler, &VyperOptions::default());
    assert_eq!(
        unit.warning.as_deref(),
        Some("Compiler error: vyper: command not found")
    );
    assert!(unit.is_analyzed());
    assert!(unit.functions.iter().all(|f| f.body.is_none()));
    assert_eq!(unit.contracts.len(), 1);
    assert_eq!(unit.contracts[0].name, "Pay");
}

#[test]
fn test_artifacts_without_module_fall_back() {
    let compiler = StubCompiler::returning(json!({"contracts": {}, "sources": {}}));
    let unit = preprocess(&compiler, &VyperOptions::default());
    assert_eq!(
        unit.warning.as_deref(),
        Some("vyper compilation failed; used source parser")
    );
    assert!(unit.function_by_uid("Pay::pay").is_some());
}

#[test]
fn test_version_override_rewrites_directive() {
    let compiler = StubCompiler::returning(artifacts());
    let options = VyperOptions {
        version: Some("0.3.10".to_string()),
        ..VyperOptions::default()
    };
    let unit = preprocess(&compiler, &options);
    let seen = compiler.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("# @version 0.3.10\ninterface Token:"));
    assert_eq!(unit.sources.get("Pay.vy"), Some(SOURCE));
}

#[test]
fn test_compiled_declarations() {
    let unit = preprocess(&StubCompiler::returning(artifacts()), &VyperOptions::default());
    let event = unit
        .declarations
        .iter()
        .find(|d| d.canonical_name == "Pay.Paid")
        .unwrap();
    let params: Vec<(&str, &Type, bool)> = event
        .event_elems()
        .unwrap()
        .iter()
        .map(|p| (p.name.as_str(), &p.ty, p.indexed))
        .collect();
    assert_eq!(
        params,
        vec![
            ("sender", &Type::address(), true),
            ("amount", &Type::uint256(), false)
        ]
    );

    let balance = unit.contracts[0].state_variable("balance").unwrap();
    assert_eq!(balance.visibility, Visibility::Public);
    assert_eq!(balance.ty, Type::uint256());
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = preprocess_vyper(
        &dir.path().join("Missing.vy"),
        &VyperOptions::default(),
        &StubCompiler::failing(),
        FailurePolicy::StopOnFirst,
    );
    assert!(matches!(result, Err(TransformError::Io(_))));
}

const POINTS: &str = "\
struct P:
    a: uint256

@internal
def g() -> uint256:
    return 1

@external
def f():
    self.g()
    p: P = P({a: 1})
";

/// Compiles `POINTS` through a stub returning `module`.
fn points_unit(module: Value) -> CompilationUnit {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Points.vy");
    std::fs::write(&path, POINTS).unwrap();
    let compiler = StubCompiler::returning(json!({
        "contracts": {"Points.vy": {"Points": {}}},
        "sources": {"Points.vy": {"id": 0, "ast": module}}
    }));
    preprocess_vyper(&path, &VyperOptions::default(), &compiler, FailurePolicy::StopOnFirst)
        .unwrap()
}

fn points_module(f_body: Vec<Value>) -> Value {
    json!({
        "ast_type": "Module",
        "body": [
            {
                "ast_type": "StructDef",
                "name": "P",
                "body": [{"ast_type": "AnnAssign", "target": name("a"), "annotation": name("uint256")}]
            },
            {
                "ast_type": "FunctionDef",
                "name": "g",
                "decorator_list": [name("internal")],
                "args": {"ast_type": "arguments", "args": []},
                "returns": name("uint256"),
                "body": [{"ast_type": "Return", "value": {"ast_type": "Int", "value": 1}}]
            },
            {
                "ast_type": "FunctionDef",
                "name": "f",
                "decorator_list": [name("external")],
                "args": {"ast_type": "arguments", "args": []},
                "body": f_body
            }
        ]
    })
}

#[test]
fn test_struct_literal_keeps_sibling_calls() {
    let unit = points_unit(points_module(vec![
        json!({"ast_type": "Expr", "value": call(attribute("self", "g"), vec![])}),
        json!({
            "ast_type": "AnnAssign",
            "target": name("p"),
            "annotation": name("P"),
            "value": call(name("P"), vec![json!({
                "ast_type": "Dict",
                "keys": [name("a")],
                "values": [{"ast_type": "Int", "value": 1}]
            })])
        }),
    ]));

    assert!(unit.errors.is_empty());
    assert_eq!(
        edge_summary(&unit, "Points::f", &CallFilters::default()),
        vec![row("internal", "function", "Points.g")]
    );
    let body = unit.function_by_uid("Points::f").unwrap().body.as_ref().unwrap();
    let structure = body
        .operations()
        .find_map(|op| match op {
            callsight_core::Operation::NewStructure { structure, args, .. } => {
                Some((structure.clone(), args.names.clone()))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(structure, ("P".to_string(), Some(vec!["a".to_string()])));
}

#[test]
fn test_unlisted_nodes_keep_nested_calls() {
    let unit = points_unit(points_module(vec![
        json!({
            "ast_type": "Expr",
            "value": {
                "ast_type": "NamedExpr",
                "target": name("y"),
                "value": call(attribute("self", "g"), vec![])
            }
        }),
        json!({
            "ast_type": "Unchecked",
            "body": [{"ast_type": "Expr", "value": call(attribute("token", "sync"), vec![])}]
        }),
    ]));

    assert!(unit.errors.is_empty());
    assert_eq!(
        edge_summary(&unit, "Points::f", &CallFilters::default()),
        vec![
            row("external", "unknown", "token.sync"),
            row("internal", "function", "Points.g"),
        ]
    );
}
