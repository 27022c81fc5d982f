//! End-to-end tests for the Aven compiler.
//!
//! Each test writes a `.aven` source file, invokes the real `avenc`
//! binary, and asserts the exit status, diagnostics, and AIR output.

use std::path::PathBuf;
use std::process::{Command, Output};

/// Find the avenc binary next to the test executable.
fn find_avenc() -> PathBuf {
    let mut path = std::env::current_exe()
        .expect("cannot find current exe")
        .parent()
        .expect("cannot find parent dir")
        .to_path_buf();
    // test binaries live in target/debug/deps; avenc sits one level up
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("avenc");
    path.set_extension(std::env::consts::EXE_EXTENSION);
    path
}

/// Run `avenc <subcommand> <file>` over the given source.
fn run_avenc(subcommand: &str, source: &str, extra: &[&str]) -> Output {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join("main.aven");
    std::fs::write(&file, source).expect("failed to write source");
    Command::new(find_avenc())
        .arg(subcommand)
        .args(extra)
        .arg(&file)
        .output()
        .expect("failed to invoke avenc")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ── check ───────────────────────────────────────────────────────────────

#[test]
fn check_accepts_a_clean_program() {
    let output = run_avenc("check", "let x = 42\n", &[]);
    assert!(
        output.status.success(),
        "stderr: {}",
        stderr_of(&output)
    );
}

#[test]
fn check_rejects_move_of_constant() {
    let output = run_avenc("check", "let x: @cst Int = 0\nx <- 3\n", &[]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("E0403"), "stderr: {stderr}");
    assert!(stderr.contains("`<-`"), "stderr: {stderr}");
}

#[test]
fn check_reports_undefined_symbols() {
    let output = run_avenc("check", "y <- 2\n", &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("undefined symbol `y`"));
}

#[test]
fn check_reports_parse_errors_and_recovers() {
    let output = run_avenc("check", "let $ = 1\nlet y = 2\n", &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("E0101"));
}

#[test]
fn check_json_emits_machine_readable_issues() {
    let output = run_avenc("check", "let x: @cst Int = 0\nx <- 3\n", &["--json"]);
    assert_eq!(output.status.code(), Some(1));
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("valid JSON diagnostics");
    let issues = parsed.as_array().expect("array of issues");
    assert!(issues
        .iter()
        .any(|i| i["code"] == "E0403" && i["severity"] == "Error"));
}

#[test]
fn missing_file_exits_with_usage_error() {
    let output = Command::new(find_avenc())
        .args(["check", "/no/such/file.aven"])
        .output()
        .expect("failed to invoke avenc");
    assert_eq!(output.status.code(), Some(2));
}

// ── air ─────────────────────────────────────────────────────────────────

#[test]
fn air_prints_literal_binding() {
    let output = run_avenc("air", "let x = 42\n", &[]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("fun @main()"), "stdout: {stdout}");
    assert!(stdout.contains("make_ref @cst Int"), "stdout: {stdout}");
    assert!(stdout.contains("copy 42, %"), "stdout: {stdout}");
}

#[test]
fn air_prints_move_binding() {
    let output = run_avenc("air", "let x: @mut Int = 0\nx <- 3\n", &[]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("move 3, %"), "stdout: {stdout}");
}

#[test]
fn air_emits_both_specializations() {
    let source = "fun id<T>(_ v: T) -> T { return = v }\nlet a = id(1)\nlet b = id(\"x\")\n";
    let output = run_avenc("air", source, &[]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("_T_i"), "stdout: {stdout}");
    assert!(stdout.contains("_T_s"), "stdout: {stdout}");
}

#[test]
fn air_extracts_struct_members() {
    let source = "struct Pair<A, B> { let fst: A\nlet snd: B }\nlet p = Pair(fst := 1, snd := true)\np.fst\n";
    let output = run_avenc("air", source, &[]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("extract"), "stdout: {stdout}");
    assert!(stdout.contains(", 0, @cst Int"), "stdout: {stdout}");
}

#[test]
fn air_is_not_printed_for_failing_programs() {
    let output = run_avenc("air", "let x: @cst Int = 0\nx <- 3\n", &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!stdout_of(&output).contains("fun @main"));
}
