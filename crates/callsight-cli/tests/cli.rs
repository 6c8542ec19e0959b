#![allow(unused_imports)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

const PAY: &str = "\
# @version ^0.3.9
@internal
def _check(x: uint256):
    assert x > 0

@external
def pay(x: uint256):
    self._check(x)

@external
def __default__():
    pass
";

fn vault_fixture() -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../callsight-transform/tests/fixtures/vault_compact.json")
        .display()
        .to_string()
}

fn callsight() -> Command {
    let mut cmd = Command::cargo_bin("callsight").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn write_pay(dir: &Path) -> String {
    let path = dir.join("Pay.vy");
    std::fs::write(&path, PAY).unwrap();
    path.display().to_string()
}

#[test]
fn test_no_targets_is_an_error() {
    callsight()
        .assert()
        .failure()
        .stderr(predicate::str::contains("No targets provided"));
}

#[test]
fn test_vault_report_on_stdout() {
    let fixture = vault_fixture();
    let report = run_json(callsight().arg(&fixture));

    assert_eq!(report["tool"], "callsight");
    assert_eq!(report["targets"], serde_json::json!([fixture]));
    let contracts: Vec<&str> = report["compilations"][0]["contracts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(contracts, vec!["SafeMath", "Vault"]);
    assert!(report.get("errors").is_none());
}

#[test]
fn test_targets_are_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = vault_fixture();
    let list = dir.path().join("targets.txt");
    std::fs::write(&list, format!("# vault\n\n{}\n", fixture)).unwrap();

    let report = run_json(
        callsight()
            .arg("--targets-file")
            .arg(&list)
            .arg(&fixture)
            .arg(&fixture),
    );
    assert_eq!(report["targets"].as_array().unwrap().len(), 1);
    assert_eq!(report["compilations"].as_array().unwrap().len(), 1);
}

#[test]
fn test_filters_reach_the_report() {
    let report = run_json(
        callsight()
            .arg(vault_fixture())
            .arg("--no-external-calls")
            .arg("--no-modifiers")
            .arg("--only-visibility")
            .arg("external"),
    );
    let vault = &report["compilations"][0]["contracts"][0];
    assert_eq!(vault["name"], "Vault");
    assert_eq!(vault["functions"]["internal"], serde_json::json!([]));

    let edges: Vec<&str> = vault["functions"]["external"][0]["calls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["edge"].as_str().unwrap())
        .collect();
    assert_eq!(edges, vec!["internal", "library"]);
}

#[test]
fn test_unknown_visibility_is_rejected() {
    callsight()
        .arg(vault_fixture())
        .arg("--only-visibility")
        .arg("external,hidden")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown visibility `hidden`"));
}

#[test]
fn test_emit_callgraph_requires_output() {
    callsight()
        .arg(vault_fixture())
        .arg("--emit-callgraph")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn test_output_with_callgraph_and_ir() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.json");
    callsight()
        .arg(vault_fixture())
        .arg("-o")
        .arg(&out)
        .arg("--emit-callgraph")
        .arg("--emit-ir")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["tool"], "callsight");

    let dot = std::fs::read_to_string(dir.path().join("report.callgraph.dot")).unwrap();
    assert!(dot.starts_with("digraph \"callgraph\" {"));
    let ir = std::fs::read_to_string(dir.path().join("report.ir")).unwrap();
    assert!(ir.contains("contract Vault {"));
}

#[test]
fn test_callgraph_per_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let pay = write_pay(dir.path());
    let out = dir.path().join("report.json");
    callsight()
        .arg(vault_fixture())
        .arg(&pay)
        .arg("--vyper-bin")
        .arg(dir.path().join("missing-vyper"))
        .arg("-o")
        .arg(&out)
        .arg("--emit-callgraph")
        .assert()
        .success();

    let graphs = dir.path().join("report.callgraph");
    let mut names: Vec<String> = std::fs::read_dir(&graphs)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("000."));
    assert!(names[1].starts_with("001.") && names[1].ends_with("Pay.vy.dot"));
}

#[test]
fn test_missing_target_with_no_fail() {
    let report = run_json(
        callsight()
            .arg("does/not/exist.json")
            .arg(vault_fixture())
            .arg("--no-fail"),
    );
    assert_eq!(report["errors"][0]["target"], "does/not/exist.json");
    assert_eq!(report["errors"][0]["stage"], "contract_preprocess");
    assert_eq!(report["compilations"].as_array().unwrap().len(), 1);
}

#[test]
fn test_missing_target_fails_by_default() {
    callsight()
        .arg("does/not/exist.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does/not/exist.json"));
}

#[test]
fn test_vyper_target_uses_source_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let pay = write_pay(dir.path());
    let report = run_json(
        callsight()
            .arg(&pay)
            .arg("--vyper-bin")
            .arg(dir.path().join("missing-vyper")),
    );

    let module = &report["compilations"][0]["contracts"][0];
    assert_eq!(module["name"], "Pay");
    let external: Vec<&str> = module["functions"]["external"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap())
        .collect();
    assert_eq!(external, vec!["Pay::__default__", "Pay::pay"]);
    assert_eq!(
        module["functions"]["external"][1]["calls"][0]["display"],
        "Pay._check"
    );
}

#[test]
fn test_dump_external_bundles() {
    let dir = tempfile::tempdir().unwrap();
    let bundles = dir.path().join("bundles");
    callsight()
        .arg(vault_fixture())
        .arg("--dump-external-dir")
        .arg(&bundles)
        .assert()
        .success();

    let text = std::fs::read_to_string(bundles.join("Vault/Vault__Vault.deposit_uint256.sol")).unwrap();
    assert!(text.starts_with("// entry (external): Vault.deposit(uint256)\n"));
    assert!(text.contains("// ---- reachable (internal) [internal]: Vault._record(uint256)"));
}
