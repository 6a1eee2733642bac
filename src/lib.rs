//! Touchstone: a nested test-definition and execution engine.
//!
//! Tests are declared as closures against a [`Runner`] and may declare
//! further tests *while they run*, so a suite can grow itself from
//! runtime values. Each top-level test executes inside a fresh isolation
//! context (a [`Sandbox`]); nested tests share their nearest insulated
//! ancestor's context unless they ask for their own. A failing assertion
//! aborts the rest of its own body and nothing else: sibling tests and
//! enclosing suites keep running.
//!
//! # Example
//!
//! ```
//! use touchstone::{RunOptions, Runner};
//!
//! let (mut runner, _log) = Runner::recording();
//!
//! runner.test("arithmetic", |t| {
//!     t.eq(2.0 + 2.0, 4.0)?;
//!     t.test("nested, declared at run time", |t| {
//!         t.t(1 + 1 == 2)?;
//!         Ok(())
//!     });
//!     Ok(())
//! });
//!
//! let stats = runner.run(RunOptions::default()).clone();
//! assert!(stats.overall_pass());
//! assert_eq!(stats.pass, 2);
//! ```
//!
//! Assertion entry points come in uniform triples: `eq` asserts,
//! `eq_not` negates, `eq_query` evaluates without failing. The full
//! catalog lives on [`Ctx`]; custom composites are registered with
//! [`Runner::define_custom`].

pub mod assertion;
pub mod outcome;
pub mod report;
pub mod runner;
pub mod sandbox;
pub(crate) mod text;
pub mod tree;
pub mod value;

pub use assertion::custom::{CustomDef, Fields};
pub use assertion::Mode;
pub use outcome::{throw, Failure, Fault, Frame, FrameKind, Interrupt, TestResult};
pub use report::{ConsoleReporter, Event, EventLog, RecordingReporter, Reporter, TreeRow};
pub use runner::{Ctx, RunOptions, Runner, Stats};
pub use sandbox::{Sandbox, SandboxRef};
pub use tree::{Arena, Status, TestId, TestNode};
pub use value::{Value, ValueType};
