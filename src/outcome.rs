//! Outcome types for test bodies, hooks and assertion blocks.
//!
//! A body never unwinds to signal failure. It returns a [`TestResult`],
//! and the `?` operator carries an [`Interrupt`] out to the nearest invoke
//! boundary, which records and reports it exactly once. The boundary then
//! collapses the interrupt into a payload-free abort signal so that outer
//! layers cannot re-report it.

use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// What a test body, hook body or assertion block returns.
pub type TestResult<T = ()> = Result<T, Interrupt>;

/// Non-local exit from a body. Raised by assertions, by `throw`, by
/// `Ctx::stop`, or by user code propagating a [`Fault`].
#[derive(Debug)]
pub enum Interrupt {
    /// An assertion did not hold.
    Failure(Failure),
    /// A fault occurred: a user error, a panic, or a misuse of the
    /// assertion API (a specification fault).
    Error(Fault),
    /// A symbolic non-local exit, normally caught by the ExpectSignal
    /// assertion. One that escapes a body is reported as an error.
    Signal { name: String, payload: Value },
    /// Unconditional termination of the whole run.
    Stop,
}

impl From<Fault> for Interrupt {
    fn from(fault: Fault) -> Interrupt {
        Interrupt::Error(fault)
    }
}

/// Raises a named signal carrying a payload. The matching ExpectSignal
/// assertion catches it and stores the payload for later inspection.
///
/// ```
/// use touchstone::{throw, TestResult, Value};
///
/// fn walk() -> TestResult<i64> {
///     throw("found", Value::from(42))
/// }
/// assert!(walk().is_err());
/// ```
pub fn throw<T>(name: impl Into<String>, payload: Value) -> TestResult<T> {
    Err(Interrupt::Signal {
        name: name.into(),
        payload,
    })
}

// ============================================================================
// FAILURE: an assertion that did not hold
// ============================================================================

/// Carries everything the reporter needs to describe a failed assertion.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Human-readable account of what was expected and what was found.
    pub message: String,
    /// Set when the failure happened inside a custom assertion's
    /// `field(..)` block; names the failing field.
    pub field_label: Option<String>,
    /// Snapshot of the call stack at the point of failure.
    pub frames: Vec<Frame>,
}

impl Failure {
    pub fn new(message: impl Into<String>, frames: Vec<Frame>) -> Failure {
        Failure {
            message: message.into(),
            field_label: None,
            frames,
        }
    }
}

// ============================================================================
// FAULT: user errors, panics and specification errors
// ============================================================================

const SPECIFICATION: &str = "SpecificationError";
const RUNTIME: &str = "RuntimeFault";
const PANIC: &str = "Panic";
const UNCAUGHT_SIGNAL: &str = "UncaughtSignal";

/// A fault raised while a body was running. `kind` is a type-name label;
/// faults captured from concrete error types carry the type's full path.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Fault {
        Fault {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// A generic runtime fault with no more specific type.
    pub fn runtime(message: impl Into<String>) -> Fault {
        Fault::new(RUNTIME, message)
    }

    /// The assertion API was misused: wrong arity, wrong argument types,
    /// unknown registry names. Reported with a distinct label so the
    /// author knows the problem is in the test code, not the code under
    /// test.
    pub fn specification(message: impl Into<String>) -> Fault {
        Fault::new(SPECIFICATION, message)
    }

    /// A panic captured at the invoke boundary.
    pub fn panic(message: impl Into<String>) -> Fault {
        Fault::new(PANIC, message)
    }

    /// A signal that escaped every ExpectSignal assertion.
    pub fn uncaught_signal(name: &str, payload: &Value) -> Fault {
        Fault::new(
            UNCAUGHT_SIGNAL,
            format!("uncaught signal :{name} (payload {payload})"),
        )
    }

    /// Wraps a concrete error value, stamping its type path as the fault
    /// kind. The usual way to route fallible user code into a body:
    ///
    /// ```
    /// use touchstone::Fault;
    ///
    /// let fault = "zz".parse::<f64>().map_err(Fault::caught).unwrap_err();
    /// assert!(fault.matches("ParseFloatError"));
    /// ```
    pub fn caught<E: fmt::Display>(err: E) -> Fault {
        Fault::new(std::any::type_name::<E>(), err.to_string())
    }

    pub fn is_specification(&self) -> bool {
        self.kind == SPECIFICATION
    }

    /// Matches an expected kind by exact name or by path suffix, so
    /// `"ParseFloatError"` matches `core::num::dec2flt::ParseFloatError`.
    pub fn matches(&self, expected: &str) -> bool {
        self.kind == expected || self.kind.ends_with(&format!("::{expected}"))
    }
}

/// Builds a formatted runtime [`Fault`].
///
/// ```
/// use touchstone::fault;
///
/// let f = fault!("widget {} missing", 7);
/// assert_eq!(f.message, "widget 7 missing");
/// ```
#[macro_export]
macro_rules! fault {
    ($($arg:tt)*) => {
        $crate::Fault::runtime(format!($($arg)*))
    };
}

// ============================================================================
// FRAMES: call-stack attribution for diagnostics
// ============================================================================

/// One entry of the diagnostic call stack: a test body or a hook body
/// currently executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Test,
    BeforeEach,
    AfterEach,
    BeforeAll,
    AfterAll,
}

impl Frame {
    pub fn test(label: impl Into<String>) -> Frame {
        Frame {
            kind: FrameKind::Test,
            label: label.into(),
        }
    }

    pub fn hook(kind: FrameKind, label: impl Into<String>) -> Frame {
        Frame {
            kind,
            label: label.into(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FrameKind::Test => write!(f, "test {:?}", self.label),
            FrameKind::BeforeEach => write!(f, "before_each hook (in {:?})", self.label),
            FrameKind::AfterEach => write!(f, "after_each hook (in {:?})", self.label),
            FrameKind::BeforeAll => write!(f, "before_all hook (in {:?})", self.label),
            FrameKind::AfterAll => write!(f, "after_all hook (in {:?})", self.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_matches_by_suffix() {
        let f = Fault::new("std::io::Error", "boom");
        assert!(f.matches("Error"));
        assert!(f.matches("std::io::Error"));
        assert!(!f.matches("io"));
    }

    #[test]
    fn caught_stamps_type_path() {
        let err = "x".parse::<i64>().unwrap_err();
        let fault = Fault::caught(err);
        assert!(fault.matches("ParseIntError"));
        assert!(!fault.is_specification());
    }

    #[test]
    fn specification_faults_are_distinguished() {
        assert!(Fault::specification("bad arity").is_specification());
        assert!(!Fault::runtime("boom").is_specification());
    }

    #[test]
    fn throw_raises_a_signal() {
        match throw::<()>("done", Value::from(1)) {
            Err(Interrupt::Signal { name, payload }) => {
                assert_eq!(name, "done");
                assert_eq!(payload, Value::from(1));
            }
            _ => panic!("expected a signal"),
        }
    }
}
