//! End-to-end scenarios: each writes a `.wisp` script to a temp file,
//! runs the built `wisp` binary against it, and checks stdout/stderr/exit
//! code the way a user would observe them.

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

fn run(source: &str) -> (String, String, i32) {
    let mut file = NamedTempFile::new().expect("create temp script");
    write!(file, "{source}").expect("write temp script");

    let output = Command::new(env!("CARGO_BIN_EXE_wisp"))
        .arg(file.path())
        .output()
        .expect("run wisp binary");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

#[test]
fn prints_the_sum_of_two_numbers() {
    let (stdout, _, code) = run("print 1 + 2;");
    assert_eq!(stdout.trim(), "3");
    assert_eq!(code, 0);
}

#[test]
fn concatenates_two_strings() {
    let (stdout, _, code) = run(r#"print "foo" + "bar";"#);
    assert_eq!(stdout.trim(), "foobar");
    assert_eq!(code, 0);
}

#[test]
fn block_scope_shadows_then_restores_the_outer_binding() {
    let (stdout, _, code) = run("var a = 1; { var a = 2; print a; } print a;");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["2", "1"]);
    assert_eq!(code, 0);
}

#[test]
fn bool_coerces_to_a_number_under_addition() {
    let (stdout, _, code) = run("print true + 1;");
    assert_eq!(stdout.trim(), "2");
    assert_eq!(code, 0);
}

#[test]
fn undefined_global_is_a_runtime_error_with_exit_code_70() {
    let (_, stderr, code) = run("print undefined_name;");
    assert_eq!(code, 70);
    assert!(stderr.contains("Undefined variable 'undefined_name'"));
}

#[test]
fn self_referencing_initializer_is_a_compile_error_with_exit_code_65() {
    let (_, stderr, code) = run("{ var x = x; }");
    assert_eq!(code, 65);
    assert!(stderr.contains("own initializer"));
}

#[test]
fn comparison_binds_tighter_than_equality() {
    let (stdout, _, code) = run("print 1 < 2 == true;");
    assert_eq!(stdout.trim(), "true");
    assert_eq!(code, 0);
}
