//! Boundary behaviours and cross-cutting invariants from §8 that are not already
//! covered by one of the named end-to-end scenarios.

use std::{cell::RefCell, rc::Rc};

use scriptlang::{Limits, Script};

fn run_ok(code: &str) {
    Script::from_source("test.script", code).unwrap().run().unwrap();
}

#[test]
fn auto_vivification_promotes_none_to_map_at_assignment() {
    run_ok(
        r"
        m.a.b = 1;
        assert(m.a.b == 1);
        ",
    );
}

#[test]
fn maps_are_shared_by_reference_not_copied() {
    run_ok(
        r"
        a = { x: 1 };
        b = a;
        a.x = 7;
        assert(b.x == 7);
        ",
    );
}

#[test]
fn lists_are_shared_by_reference_not_copied() {
    run_ok(
        r"
        a = [1, 2];
        b = a;
        a[0] = 9;
        assert(b[0] == 9);
        ",
    );
}

#[test]
fn extern_write_through_is_observed_by_host_immediately() {
    let x = Rc::new(RefCell::new(1_i32));
    let script = Script::from_source("test.script", "x = x + 1; y = x;").unwrap();
    script.link("x", x.clone());
    script.run().unwrap();
    assert_eq!(*x.borrow(), 2);
}

#[test]
fn for_over_empty_list_runs_body_zero_times() {
    run_ok(
        r"
        count = 0;
        for (v in []) { count = count + 1; }
        assert(count == 0);
        ",
    );
}

#[test]
fn return_stops_remaining_statements_in_block_and_loop() {
    run_ok(
        r"
        f = function() {
            for (i in [1, 2, 3]) {
                if (i == 2) { return i; }
            }
            return -1;
        };
        assert(f() == 2);
        ",
    );
}

#[test]
fn int_float_promotion_yields_float_through_the_evaluator() {
    run_ok(
        r"
        a = 3;
        b = 4.0;
        assert(a + b == 7.0);
        ",
    );
}

#[test]
fn recursion_beyond_the_configured_limit_is_rejected() {
    let script = Script::from_source(
        "test.script",
        r"
        f = function(n) { return f(n + 1); };
        f(0);
        ",
    )
    .unwrap()
    .with_limits(Limits { max_call_depth: 16 });

    let err = script.run().unwrap_err();
    assert!(err.to_string().contains("maximum call depth"), "{err}");
}

#[test]
fn list_length_method_reports_element_count() {
    run_ok("xs = [1, 2, 3]; assert(xs.length() == 3);");
}
