//! End-to-end scenarios (spec.md §8): source text through every pass to
//! observable `print` output.
use std::cell::RefCell;
use std::rc::Rc;

use stackscript::config::{CompileOptions, VmOptions};
use stackscript::diagnostics::DiagnosticKind;

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl std::io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run_source(source: &str) -> String {
    let program = stackscript::compile(source, &CompileOptions::default())
        .unwrap_or_else(|d| panic!("unexpected compile failure: {:?}", d.first()));
    let buffer = SharedBuffer::default();
    stackscript::run_with_writer(program, &VmOptions::default(), Box::new(buffer.clone()))
        .expect("vm run failed");
    String::from_utf8(buffer.0.borrow().clone()).unwrap()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_source("print(1 + 2 * 3);"), "7\n");
}

#[test]
fn reassignment() {
    assert_eq!(run_source("var x: int = 10; x = x - 4; print(x);"), "6\n");
}

#[test]
fn recursive_factorial() {
    let source = "var fact: fn(int) -> int = fn(n: int) -> int { if n == 0 { return 1; } return n * fact(n - 1); }; print(fact(5));";
    assert_eq!(run_source(source), "120\n");
}

#[test]
fn array_mutation_and_length() {
    let source = "var a: [int] = [3, 1, 2]; a[0] = 9; print(a[0]); print(length(a));";
    assert_eq!(run_source(source), "9\n3\n");
}

#[test]
fn to_string_builtin() {
    assert_eq!(run_source("var s: string = to_string(42); print(s);"), "42\n");
}

#[test]
fn mismatched_types_reports_diagnostic_and_emits_no_bytecode() {
    let err = stackscript::compile("var x: int = true;", &CompileOptions::default())
        .expect_err("expected a type error");
    let diagnostic = err.first().expect("diagnostic sink should not be empty");
    assert_eq!(diagnostic.kind, DiagnosticKind::MismatchedTypes);
    assert!(diagnostic.span.is_some());
}

#[test]
fn self_recursive_function_via_self_parameter() {
    let source = "var fact: fn(int) -> int = fn(self, n: int) -> int { if n == 0 { return 1; } return n * self(n - 1); }; print(fact(5));";
    assert_eq!(run_source(source), "120\n");
}

#[test]
fn clone_is_a_deep_copy_not_an_alias() {
    let source = "var a: [int] = [1, 2, 3]; var b: [int] = clone(a); b[0] = 99; print(a[0]); print(b[0]);";
    assert_eq!(run_source(source), "1\n99\n");
}

#[test]
fn append_grows_an_array_in_place() {
    let source = "var a: [int] = []; append(a, 5); append(a, 6); print(length(a)); print(a[1]);";
    assert_eq!(run_source(source), "2\n6\n");
}

#[test]
fn boolean_and_or_short_circuit_values() {
    let source = "print(true and false); print(true or false);";
    assert_eq!(run_source(source), "false\ntrue\n");
}
