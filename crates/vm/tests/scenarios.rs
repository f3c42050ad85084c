//! End-to-end scenarios: source text through the full compiler pipeline
//! and into the VM, checked against the exact stdout a run should
//! produce.

use goxlang_vm::Vm;

fn run(src: &str) -> String {
    let module = goxc::compile_source(src).expect("pipeline should succeed");
    let mut out = Vec::new();
    let mut vm = Vm::new(&module, 1024, &mut out).expect("vm should build");
    vm.run().expect("program should run to completion");
    String::from_utf8(out).unwrap()
}

fn run_err(src: &str) -> String {
    goxc::compile_source(src).expect_err("pipeline should fail").to_string()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run("var x int = 2 + 3 * 4 - 5; print x;"), "9");
}

#[test]
fn float_constants_and_host_formatting() {
    assert_eq!(run("const pi = 3.14; const r = 2.0; print pi*r*r;"), "12.56");
}

#[test]
fn recursive_style_factorial_via_while() {
    let src = "func fact(n int) int { \
                 var r int = 1; \
                 var i int = 1; \
                 while i <= n { r = r*i; i = i+1; } \
                 return r; \
               } \
               print fact(5);";
    assert_eq!(run(src), "120");
}

#[test]
fn if_else_branches_on_bool() {
    assert_eq!(run("var b bool = true; if b { print 1; } else { print 0; }"), "1");
}

#[test]
fn memory_dereference_round_trip() {
    assert_eq!(run("var p int = ^16; `p = 42; print `p;"), "42");
}

#[test]
fn missing_return_branch_is_a_checker_error() {
    let msg = run_err("func f() int { if true { return 1; } }");
    assert!(msg.contains("FunctionError"), "{msg}");
}
