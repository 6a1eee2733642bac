//! Shared helpers: build a runner against the recording reporter, run it,
//! and hand back statistics plus the captured reporting events.

#![allow(dead_code)]

use touchstone::{Ctx, Event, RunOptions, Runner, Stats, TestResult, TreeRow};

/// Builds a suite, runs it with default options, and returns what the
/// run produced.
pub fn run_suite(build: impl FnOnce(&mut Runner)) -> (Stats, Vec<Event>) {
    let (mut runner, log) = Runner::recording();
    build(&mut runner);
    let stats = runner.run(RunOptions::default()).clone();
    let events = log.borrow().clone();
    (stats, events)
}

/// Runs a single top-level test.
pub fn run_one(body: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) -> (Stats, Vec<Event>) {
    run_suite(|runner| runner.test("subject", body))
}

/// The rows of the recorded tree report.
pub fn tree_rows(events: &[Event]) -> Vec<TreeRow> {
    events
        .iter()
        .find_map(|event| match event {
            Event::Tree { rows } => Some(rows.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Every reported assertion failure, as (test, message).
pub fn failures(events: &[Event]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Failure { test, message } => Some((test.clone(), message.clone())),
            _ => None,
        })
        .collect()
}

/// Every reported fault, as (test, kind, message, specification flag).
pub fn faults(events: &[Event]) -> Vec<(String, String, String, bool)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::UncaughtFault {
                test,
                kind,
                message,
                specification,
            } => Some((test.clone(), kind.clone(), message.clone(), *specification)),
            _ => None,
        })
        .collect()
}

/// The recorded status of the named test in the tree report.
pub fn status_of(events: &[Event], description: &str) -> touchstone::Status {
    tree_rows(events)
        .into_iter()
        .find(|row| row.description == description)
        .map(|row| row.status)
        .unwrap_or_else(|| panic!("no tree row for {description:?}"))
}
