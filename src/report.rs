//! Reporting collaborators.
//!
//! The runner is agnostic about presentation: it drives a [`Reporter`]
//! with complete, well-formed data after every failure or fault and once
//! at the end of the run. Two implementations ship with the crate: a
//! colored console reporter, and a recording reporter that captures
//! events for inspection (the crate's own tests run against it).

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::outcome::{Fault, Frame, FrameKind};
use crate::runner::Stats;
use crate::text::{indent, pad_to};
use crate::tree::{Arena, Status, TestId};

/// What the execution core needs from a reporting backend.
///
/// `report_failure` and `report_uncaught_fault` are called at the moment
/// of capture, exactly once per fault. The three `display_*` calls come
/// at the end of the run, in order: tree, buffered details, summary.
pub trait Reporter {
    /// Opt in to unfiltered call stacks. Default: ignore.
    fn set_verbose(&mut self, _full_stack: bool) {}

    fn report_failure(&mut self, description: &str, message: &str, frames: &[Frame]);

    fn report_uncaught_fault(&mut self, description: &str, fault: &Fault, frames: &[Frame]);

    fn display_tree(&mut self, arena: &Arena, roots: &[TestId]);

    /// Emits whatever failure/error details accumulated during the run.
    fn display_failure_details(&mut self);

    fn display_summary(&mut self, stats: &Stats);
}

// ============================================================================
// CONSOLE REPORTER
// ============================================================================

const REPORT_WIDTH: usize = 76;
const DESC_WIDTH: usize = 68;
const STATUS_WIDTH: usize = 8;

struct Detail {
    header: String,
    color: Color,
    body: String,
}

/// Renders to stdout with `termcolor`. Failure and error details are
/// buffered as they occur and emitted in one block after the tree, the
/// way a summary-last console run reads best.
pub struct ConsoleReporter {
    choice: ColorChoice,
    details: Vec<Detail>,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(choice: ColorChoice) -> ConsoleReporter {
        ConsoleReporter {
            choice,
            details: Vec::new(),
            verbose: false,
        }
    }

    /// Colors only when stdout is a terminal.
    pub fn auto() -> ConsoleReporter {
        let choice = if atty::is(atty::Stream::Stdout) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        ConsoleReporter::new(choice)
    }

    fn stack_lines(&self, frames: &[Frame]) -> String {
        frames
            .iter()
            .filter(|frame| self.verbose || frame.kind == FrameKind::Test)
            .map(|frame| format!("in {frame}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn status_spec(status: Status) -> ColorSpec {
        let mut spec = ColorSpec::new();
        match status {
            Status::Pass | Status::Blank => spec.set_fg(Some(Color::Green)),
            Status::Fail => spec.set_fg(Some(Color::Red)),
            Status::Error => spec.set_fg(Some(Color::Magenta)),
        };
        spec.set_bold(true);
        spec
    }
}

impl Reporter for ConsoleReporter {
    fn set_verbose(&mut self, full_stack: bool) {
        self.verbose = full_stack;
    }

    fn report_failure(&mut self, description: &str, message: &str, frames: &[Frame]) {
        let stack = self.stack_lines(frames);
        let mut body = indent(message, 2);
        if !stack.is_empty() {
            body.push_str("\n  Call stack:\n");
            body.push_str(&indent(&stack, 4));
        }
        self.details.push(Detail {
            header: format!("FAIL: {description}"),
            color: Color::Red,
            body,
        });
    }

    fn report_uncaught_fault(&mut self, description: &str, fault: &Fault, frames: &[Frame]) {
        let (label, color) = if fault.is_specification() {
            ("SPECIFICATION ERROR", Color::Yellow)
        } else {
            ("ERROR", Color::Magenta)
        };
        let stack = self.stack_lines(frames);
        let mut body = format!("  Kind:    {}\n  Message: {}", fault.kind, fault.message);
        if !stack.is_empty() {
            body.push_str("\n  Call stack:\n");
            body.push_str(&indent(&stack, 4));
        }
        self.details.push(Detail {
            header: format!("{label}: {description}"),
            color,
            body,
        });
    }

    fn display_tree(&mut self, arena: &Arena, roots: &[TestId]) {
        let mut out = StandardStream::stdout(self.choice);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            " +----- Report {}+",
            "-".repeat(REPORT_WIDTH - 13)
        );
        let empty = format!(" |{}|", " ".repeat(REPORT_WIDTH));

        arena.walk(roots, &mut |id, depth| {
            let node = arena.node(id);
            if depth == 0 {
                let _ = writeln!(out, "{empty}");
            }
            let text = format!("  {}{}", "  ".repeat(depth), node.description);
            let _ = write!(out, " |{}", pad_to(&text, DESC_WIDTH));
            let _ = out.set_color(&ConsoleReporter::status_spec(node.status));
            let _ = write!(out, "{}", pad_to(node.status.label(), STATUS_WIDTH));
            let _ = out.reset();
            let _ = writeln!(out, "|");
        });

        let _ = writeln!(out, "{empty}");
        let _ = writeln!(out, " +{}+", "-".repeat(REPORT_WIDTH));
    }

    fn display_failure_details(&mut self) {
        if self.details.is_empty() {
            return;
        }
        let mut out = StandardStream::stdout(self.choice);
        let _ = writeln!(out);
        for detail in self.details.drain(..) {
            let _ = out.set_color(ColorSpec::new().set_fg(Some(detail.color)).set_bold(true));
            let _ = writeln!(out, "{}", detail.header);
            let _ = out.reset();
            let _ = writeln!(out, "{}", detail.body);
        }
    }

    fn display_summary(&mut self, stats: &Stats) {
        let mut out = StandardStream::stdout(self.choice);
        let overall = if stats.overall_pass() { "PASS" } else { "FAIL" };
        let overall_color = if stats.overall_pass() {
            Color::Green
        } else {
            Color::Red
        };
        let rule_spec = {
            let mut spec = ColorSpec::new();
            spec.set_fg(Some(overall_color)).set_bold(true);
            spec
        };

        let _ = writeln!(out);
        let _ = out.set_color(&rule_spec);
        let _ = writeln!(out, "{}", "=".repeat(80));
        let _ = out.reset();

        let segments: [(String, Color); 5] = [
            (format!("{overall:<9}"), overall_color),
            (format!("#pass: {:<6}", stats.pass), Color::Green),
            (
                format!("#fail: {:<6}", stats.fail),
                if stats.fail > 0 { Color::Red } else { Color::Green },
            ),
            (
                format!("#error: {:<6}", stats.error),
                if stats.error > 0 {
                    Color::Magenta
                } else {
                    Color::Green
                },
            ),
            (
                format!(
                    "assertions: {:<6} time: {:.3}",
                    stats.assertions,
                    stats.elapsed.as_secs_f64()
                ),
                Color::White,
            ),
        ];
        let _ = write!(out, " ");
        for (text, color) in &segments {
            let _ = out.set_color(ColorSpec::new().set_fg(Some(*color)).set_bold(true));
            let _ = write!(out, "{text}");
            let _ = out.reset();
        }
        let _ = writeln!(out);

        let _ = out.set_color(&rule_spec);
        let _ = writeln!(out, "{}", "=".repeat(80));
        let _ = out.reset();
    }
}

// ============================================================================
// RECORDING REPORTER
// ============================================================================

/// Shared handle to the events a [`RecordingReporter`] collects.
pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// One reporting call, as data.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Failure {
        test: String,
        message: String,
    },
    UncaughtFault {
        test: String,
        kind: String,
        message: String,
        specification: bool,
    },
    Tree {
        rows: Vec<TreeRow>,
    },
    Details,
    Summary {
        pass: u32,
        fail: u32,
        error: u32,
        assertions: u32,
    },
}

/// One line of the recorded tree report.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow {
    pub depth: usize,
    pub description: String,
    pub status: Status,
}

/// Captures every reporting call instead of printing.
#[derive(Default)]
pub struct RecordingReporter {
    log: EventLog,
}

impl RecordingReporter {
    pub fn new() -> RecordingReporter {
        RecordingReporter::default()
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

impl Reporter for RecordingReporter {
    fn report_failure(&mut self, description: &str, message: &str, _frames: &[Frame]) {
        self.log.borrow_mut().push(Event::Failure {
            test: description.to_string(),
            message: message.to_string(),
        });
    }

    fn report_uncaught_fault(&mut self, description: &str, fault: &Fault, _frames: &[Frame]) {
        self.log.borrow_mut().push(Event::UncaughtFault {
            test: description.to_string(),
            kind: fault.kind.clone(),
            message: fault.message.clone(),
            specification: fault.is_specification(),
        });
    }

    fn display_tree(&mut self, arena: &Arena, roots: &[TestId]) {
        let mut rows = Vec::new();
        arena.walk(roots, &mut |id, depth| {
            let node = arena.node(id);
            rows.push(TreeRow {
                depth,
                description: node.description.clone(),
                status: node.status,
            });
        });
        self.log.borrow_mut().push(Event::Tree { rows });
    }

    fn display_failure_details(&mut self) {
        self.log.borrow_mut().push(Event::Details);
    }

    fn display_summary(&mut self, stats: &Stats) {
        self.log.borrow_mut().push(Event::Summary {
            pass: stats.pass,
            fail: stats.fail,
            error: stats.error,
            assertions: stats.assertions,
        });
    }
}
