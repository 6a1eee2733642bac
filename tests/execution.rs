//! Runner semantics: result resolution, fail-fast within a body, sibling
//! continuation, nested declaration, hooks, stop, and reporting order.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{failures, faults, run_one, run_suite, status_of, tree_rows};
use regex::Regex;
use touchstone::{fault, Event, Interrupt, RunOptions, Runner, Status, Value};

#[test]
fn a_body_without_assertions_stays_blank() {
    let (stats, events) = run_one(|_ctx| Ok(()));
    assert_eq!(stats.pass, 0);
    assert_eq!(stats.fail, 0);
    assert_eq!(status_of(&events, "subject"), Status::Blank);
}

#[test]
fn a_completed_body_with_a_passing_assertion_passes() {
    let (stats, events) = run_one(|ctx| {
        ctx.t(true)?;
        Ok(())
    });
    assert_eq!(stats.pass, 1);
    assert_eq!(stats.assertions, 1);
    assert_eq!(status_of(&events, "subject"), Status::Pass);
}

#[test]
fn a_failure_aborts_the_rest_of_the_body_only() {
    let reached = Rc::new(Cell::new(false));
    let flag = reached.clone();
    let (stats, events) = run_suite(move |runner| {
        runner.test("failing", move |ctx| {
            ctx.eq(1, 2)?;
            flag.set(true);
            Ok(())
        });
        runner.test("sibling", |ctx| {
            ctx.t(true)?;
            Ok(())
        });
    });
    assert!(!reached.get(), "statements after the failure must not run");
    assert_eq!(stats.fail, 1);
    assert_eq!(stats.pass, 1);
    assert_eq!(failures(&events).len(), 1);
    assert_eq!(status_of(&events, "failing"), Status::Fail);
    assert_eq!(status_of(&events, "sibling"), Status::Pass);
}

#[test]
fn a_fault_errors_the_test_and_siblings_still_run() {
    let (stats, events) = run_suite(|runner| {
        runner.test("erroring", |_ctx| Err(fault!("boom {}", 7).into()));
        runner.test("sibling", |ctx| {
            ctx.t(true)?;
            Ok(())
        });
    });
    assert_eq!(stats.error, 1);
    assert_eq!(stats.pass, 1);
    let faults = faults(&events);
    assert_eq!(faults.len(), 1);
    let (test, kind, message, specification) = &faults[0];
    assert_eq!(test, "erroring");
    assert_eq!(kind, "RuntimeFault");
    assert_eq!(message, "boom 7");
    assert!(!specification);
    assert_eq!(status_of(&events, "erroring"), Status::Error);
}

#[test]
fn assertion_misuse_is_reported_as_a_specification_error() {
    let (stats, events) = run_one(|ctx| {
        ctx.mt(1, 2)?;
        Ok(())
    });
    assert_eq!(stats.error, 1);
    let faults = faults(&events);
    assert_eq!(faults.len(), 1);
    assert!(faults[0].3, "expected the specification flag");
    assert_eq!(faults[0].1, "SpecificationError");
}

#[test]
fn nested_tests_declared_during_a_body_run_afterwards() {
    let (stats, events) = run_suite(|runner| {
        runner.test("parent", |ctx| {
            ctx.set("n", 1);
            ctx.test("child", |ctx| {
                ctx.eq(ctx.get("n"), 1)?;
                Ok(())
            });
            ctx.t(true)?;
            Ok(())
        });
    });
    assert_eq!(stats.pass, 2);
    let rows = tree_rows(&events);
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].description.as_str(), rows[0].depth), ("parent", 0));
    assert_eq!((rows[1].description.as_str(), rows[1].depth), ("child", 1));
}

#[test]
fn declarations_can_depend_on_runtime_values() {
    let (stats, _events) = run_suite(|runner| {
        runner.test("generator", |ctx| {
            for i in 0..3 {
                ctx.test(format!("case {i}"), move |ctx| {
                    ctx.t(i < 3)?;
                    Ok(())
                });
            }
            ctx.t(true)?;
            Ok(())
        });
    });
    assert_eq!(stats.pass, 4);
}

#[test]
fn children_declared_before_a_failure_remain_blank() {
    let (stats, events) = run_suite(|runner| {
        runner.test("parent", |ctx| {
            ctx.test("orphan", |ctx| {
                ctx.t(true)?;
                Ok(())
            });
            ctx.eq(1, 2)?;
            Ok(())
        });
    });
    assert_eq!(stats.fail, 1);
    assert_eq!(stats.pass, 0);
    assert_eq!(status_of(&events, "orphan"), Status::Blank);
}

#[test]
fn hooks_run_in_registration_order_around_each_test() {
    let order = Rc::new(RefCell::new(Vec::<String>::new()));
    let note = |order: &Rc<RefCell<Vec<String>>>, what: &str| {
        order.borrow_mut().push(what.to_string());
    };
    let (stats, _events) = run_suite({
        let order = order.clone();
        move |runner| {
            let o = order.clone();
            runner.before_all(move |_| {
                o.borrow_mut().push("before_all".into());
                Ok(())
            });
            let o = order.clone();
            runner.before_each(move |_| {
                o.borrow_mut().push("before_each".into());
                Ok(())
            });
            let o = order.clone();
            runner.after_each(move |_| {
                o.borrow_mut().push("after_each".into());
                Ok(())
            });
            let o = order.clone();
            runner.after_all(move |_| {
                o.borrow_mut().push("after_all".into());
                Ok(())
            });
            let o = order.clone();
            runner.test("a", move |ctx| {
                o.borrow_mut().push("test a".into());
                ctx.t(true)?;
                Ok(())
            });
            let o = order.clone();
            runner.test("b", move |ctx| {
                o.borrow_mut().push("test b".into());
                ctx.t(true)?;
                Ok(())
            });
            note(&order, "declared");
        }
    });
    assert_eq!(stats.pass, 2);
    assert_eq!(
        *order.borrow(),
        vec![
            "declared",
            "before_all",
            "before_each",
            "test a",
            "after_each",
            "before_each",
            "test b",
            "after_each",
            "after_all",
        ]
    );
}

#[test]
fn a_failing_hook_abandons_its_scope_but_not_the_parents_siblings() {
    let ran = Rc::new(RefCell::new(Vec::<&'static str>::new()));
    let (stats, events) = run_suite({
        let ran = ran.clone();
        move |runner| {
            let r = ran.clone();
            runner.test("parent", move |ctx| {
                ctx.before_each(|ctx| {
                    ctx.eq(1, 2)?;
                    Ok(())
                });
                let r1 = r.clone();
                ctx.test("child a", move |ctx| {
                    r1.borrow_mut().push("child a");
                    ctx.t(true)?;
                    Ok(())
                });
                let r2 = r.clone();
                ctx.test("child b", move |ctx| {
                    r2.borrow_mut().push("child b");
                    ctx.t(true)?;
                    Ok(())
                });
                ctx.t(true)?;
                Ok(())
            });
            let r = ran.clone();
            runner.test("uncle", move |ctx| {
                r.borrow_mut().push("uncle");
                ctx.t(true)?;
                Ok(())
            });
        }
    });
    assert_eq!(*ran.borrow(), vec!["uncle"]);
    assert_eq!(stats.fail, 1);
    assert_eq!(status_of(&events, "child a"), Status::Blank);
    assert_eq!(status_of(&events, "child b"), Status::Blank);
    assert_eq!(status_of(&events, "uncle"), Status::Pass);
}

#[test]
fn stop_halts_the_run_and_skips_remaining_hooks() {
    let after_each_ran = Rc::new(Cell::new(false));
    let later_ran = Rc::new(Cell::new(false));
    let (stats, events) = run_suite({
        let after_each_ran = after_each_ran.clone();
        let later_ran = later_ran.clone();
        move |runner| {
            let flag = after_each_ran.clone();
            runner.after_each(move |_| {
                flag.set(true);
                Ok(())
            });
            runner.test("stopper", |ctx| {
                ctx.t(true)?;
                ctx.stop()
            });
            let flag = later_ran.clone();
            runner.test("later", move |ctx| {
                flag.set(true);
                ctx.t(true)?;
                Ok(())
            });
        }
    });
    assert!(!after_each_ran.get(), "after hooks must not run past a stop");
    assert!(!later_ran.get(), "tests after the stop must not run");
    assert_eq!(stats.pass, 0);
    assert_eq!(status_of(&events, "later"), Status::Blank);
    // Reporting still happens after a stop.
    assert!(events.iter().any(|e| matches!(e, Event::Summary { .. })));
}

#[test]
fn a_panicking_body_is_recorded_as_an_error() {
    let (stats, events) = run_suite(|runner| {
        runner.test("panics", |_ctx| panic!("kaboom"));
        runner.test("sibling", |ctx| {
            ctx.t(true)?;
            Ok(())
        });
    });
    assert_eq!(stats.error, 1);
    assert_eq!(stats.pass, 1);
    let faults = faults(&events);
    assert_eq!(faults[0].1, "Panic");
    assert!(faults[0].2.contains("kaboom"));
}

#[test]
fn an_uncaught_signal_is_recorded_as_an_error() {
    let (stats, events) = run_one(|_ctx| touchstone::throw("loose", Value::from(3)));
    assert_eq!(stats.error, 1);
    let faults = faults(&events);
    assert_eq!(faults[0].1, "UncaughtSignal");
    assert!(faults[0].2.contains("loose"));
}

#[test]
fn the_arithmetic_scenario_reports_one_pass_one_fail() {
    let (stats, _events) = run_suite(|runner| {
        runner.test("Math", |ctx| {
            ctx.test("add", |ctx| ctx.eq(2 + 2, 4));
            ctx.test("bad", |ctx| ctx.eq(2 + 2, 5));
            Ok(())
        });
    });
    assert_eq!(stats.pass, 1);
    assert_eq!(stats.fail, 1);
    assert_eq!(stats.error, 0);
    assert!(!stats.overall_pass());
    assert_eq!(stats.exit_status(), 1);
}

#[test]
fn a_filter_runs_only_matching_top_level_tests() {
    let (mut runner, log) = Runner::recording();
    runner.test("Math basics", |ctx| {
        ctx.t(true)?;
        Ok(())
    });
    runner.test("String basics", |ctx| {
        ctx.t(true)?;
        Ok(())
    });
    let stats = runner
        .run(RunOptions {
            filter: Some(Regex::new("Math").unwrap()),
            full_stack: false,
        })
        .clone();
    assert_eq!(stats.pass, 1);
    let events = log.borrow().clone();
    let rows = tree_rows(&events);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].description, "Math basics");
}

#[test]
fn a_filter_matching_nothing_runs_nothing() {
    let (mut runner, log) = Runner::recording();
    runner.test("only test", |ctx| {
        ctx.t(true)?;
        Ok(())
    });
    let stats = runner
        .run(RunOptions {
            filter: Some(Regex::new("zzz").unwrap()),
            full_stack: false,
        })
        .clone();
    assert_eq!(stats.pass + stats.fail + stats.error, 0);
    assert!(log.borrow().is_empty(), "nothing should have been reported");
}

#[test]
fn a_second_run_does_not_repeat_finished_tests() {
    let (mut runner, _log) = Runner::recording();
    runner.test("first", |ctx| {
        ctx.t(true)?;
        Ok(())
    });
    assert_eq!(runner.run(RunOptions::default()).pass, 1);
    runner.test("second", |ctx| {
        ctx.t(true)?;
        Ok(())
    });
    assert_eq!(runner.run(RunOptions::default()).pass, 1);
}

#[test]
fn parked_tests_are_not_declared() {
    let (stats, events) = run_suite(|runner| {
        runner.xtest("parked", |ctx| {
            ctx.t(false)?;
            Ok(())
        });
        runner.test("live", |ctx| {
            ctx.t(true)?;
            Ok(())
        });
    });
    assert_eq!(stats.pass, 1);
    assert_eq!(stats.fail, 0);
    assert_eq!(tree_rows(&events).len(), 1);
}

#[test]
fn query_results_never_fail_a_test() {
    let (stats, events) = run_one(|ctx| {
        let yes = ctx.t_query(true)?;
        let no = ctx.t_query(false)?;
        assert!(yes && !no);
        Ok(())
    });
    assert_eq!(stats.fail, 0);
    assert_eq!(stats.assertions, 2);
    // Queries alone never resolve a test to Pass.
    assert_eq!(status_of(&events, "subject"), Status::Blank);
}

#[test]
fn errors_keep_interrupt_reporting_single() {
    let (stats, events) = run_one(|ctx| {
        ctx.t(true)?;
        Err(Interrupt::Error(fault!("late fault")))
    });
    assert_eq!(stats.error, 1);
    assert_eq!(stats.pass, 0);
    assert_eq!(faults(&events).len(), 1);
    assert_eq!(failures(&events).len(), 0);
    assert_eq!(status_of(&events, "subject"), Status::Error);
}
