//! End-to-end scenarios (§8): each mirrors one of the concrete walkthroughs in
//! the language spec, run against the real façade rather than its internals.

use std::{cell::RefCell, rc::Rc};

use scriptlang::Script;

fn run_ok(code: &str) {
    let script = Script::from_source("test.script", code).unwrap();
    script.run().expect("script should run without error");
}

#[test]
fn arithmetic_and_assertion() {
    run_ok("x = 3; y = 4; assert(x * y == 12);");
}

#[test]
fn host_variable_link_and_host_function_call() {
    let a = Rc::new(RefCell::new(0_i32));
    let x = Rc::new(RefCell::new(10_i32));
    let y = Rc::new(RefCell::new(4_i32));

    let script = Script::from_source("test.script", "a = f(x, y);").unwrap();
    script.link("a", a.clone());
    script.link("x", x);
    script.link("y", y);
    script.link_function("f", |a: i32, b: i32| a - b);

    script.run().unwrap();
    assert_eq!(*a.borrow(), 6);
}

#[test]
fn method_on_map_binds_this() {
    run_ok("p = { n: 5, sq: function() { return this.n * this.n; } }; assert(p.sq() == 25);");
}

#[test]
fn for_loop_over_list_sums_elements() {
    run_ok("xs = [1, 2, 3, 4]; s = 0; for (v in xs) { s = s + v; } assert(s == 10);");
}

#[test]
fn range_iteration_sums_elements() {
    run_ok("s = 0; for (i in [1..5]) { s = s + i; } assert(s == 15);");
}

#[test]
fn diagnostic_reports_precise_line_and_column() {
    let code = "x = 1;\ny = 2;\nassert(1/0 == 0);";
    let script = Script::from_source("test.script", code).unwrap();
    let err = script.run().unwrap_err().to_string();
    let first_line = err.lines().next().unwrap();
    assert!(first_line.ends_with(":3:8:error: division by zero"), "{first_line}");
    assert_eq!(err.lines().nth(1).unwrap(), "assert(1/0 == 0);");
}
