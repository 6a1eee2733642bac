//! The assertion engine.
//!
//! Every assertion kind is one variant of [`Check`]: constructed from
//! validated arguments, evaluated with [`Check::run`], and asked for a
//! failure message only when a failure actually happens. Construction is
//! strict: a malformed shape (wrong argument types, a missing block)
//! surfaces immediately as a specification fault, before anything runs.
//!
//! The three invocation modes are uniform across kinds:
//!
//! * assert - require the predicate to hold, fail otherwise;
//! * negate - require the predicate not to hold;
//! * query  - evaluate and hand back the boolean, failing never.
//!
//! Dispatch from the public entry points (`t`, `eq`, `ft_not`, ...) runs
//! through a single `action` routine on the runner; the entry points are
//! thin wrappers that build a `Check` and name a `Mode`.

pub mod custom;

use std::rc::Rc;

use difference::{Changeset, Difference};
use regex::Regex;

use crate::outcome::{Fault, Interrupt, TestResult};
use crate::text::truncate;
use crate::value::{Value, ValueType};

/// How an assertion's verdict is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Assert,
    Negate,
    Query,
}

/// A deferred argument: evaluated only when the assertion runs. Checks
/// are ephemeral, so blocks are borrowed and may capture body locals.
pub(crate) type Block<'a> = &'a dyn Fn() -> TestResult<Value>;

/// An immediate value or a deferred block, for the kinds that accept
/// either (Truthy, Falsy, Nullity).
pub(crate) enum Subject<'a> {
    Value(Value),
    Block(Block<'a>),
}

impl Subject<'_> {
    fn resolve(&self) -> TestResult<Value> {
        match self {
            Subject::Value(v) => Ok(v.clone()),
            Subject::Block(block) => block(),
        }
    }
}

/// One validated assertion, ready to run.
pub(crate) enum Check<'a> {
    Truthy(Subject<'a>),
    Falsy(Subject<'a>),
    Nullity(Subject<'a>),
    Equality {
        actual: Value,
        expected: Value,
    },
    Match {
        pattern: Rc<Regex>,
        text: String,
    },
    KindOf {
        value: Value,
        expected: ValueType,
    },
    FloatEqual {
        actual: f64,
        expected: f64,
        epsilon: f64,
    },
    Identity {
        left: Value,
        right: Value,
    },
    ExpectError {
        expected: Vec<String>,
        block: Block<'a>,
    },
    ExpectSignal {
        name: String,
        block: Block<'a>,
    },
}

impl std::fmt::Debug for Check<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Check::Truthy(_) => "Truthy",
            Check::Falsy(_) => "Falsy",
            Check::Nullity(_) => "Nullity",
            Check::Equality { .. } => "Equality",
            Check::Match { .. } => "Match",
            Check::KindOf { .. } => "KindOf",
            Check::FloatEqual { .. } => "FloatEqual",
            Check::Identity { .. } => "Identity",
            Check::ExpectError { .. } => "ExpectError",
            Check::ExpectSignal { .. } => "ExpectSignal",
        };
        f.debug_struct(name).finish_non_exhaustive()
    }
}

/// What running a check produced, beyond the verdict. `caught` and
/// `fault` feed the runner's inspection accessors; `resolved` feeds
/// failure messages for the value-or-block kinds.
pub(crate) struct Verdict {
    pub passed: bool,
    pub resolved: Option<Value>,
    pub caught: Option<Value>,
    pub fault: Option<Fault>,
}

impl Verdict {
    fn plain(passed: bool) -> Verdict {
        Verdict {
            passed,
            resolved: None,
            caught: None,
            fault: None,
        }
    }
}

pub(crate) const DEFAULT_EPSILON: f64 = 1e-6;

// ============================================================================
// CONSTRUCTION: strict argument-shape validation
// ============================================================================

impl Check<'static> {
    /// Match takes one pattern and one string in either order.
    pub(crate) fn matching(a: Value, b: Value) -> Result<Check<'static>, Fault> {
        match (a, b) {
            (Value::Pattern(pattern), Value::Str(text))
            | (Value::Str(text), Value::Pattern(pattern)) => Ok(Check::Match {
                pattern,
                text: text.as_ref().clone(),
            }),
            (a, b) => Err(Fault::specification(format!(
                "Mt requires one pattern and one string; got {} and {}",
                a.type_of(),
                b.type_of()
            ))),
        }
    }

    /// FloatEqual takes two numbers plus an optional positive tolerance.
    pub(crate) fn float(a: Value, b: Value, epsilon: Option<f64>) -> Result<Check<'static>, Fault> {
        let (Some(actual), Some(expected)) = (a.as_number(), b.as_number()) else {
            return Err(Fault::specification(format!(
                "Ft requires numeric arguments; got {} and {}",
                a.type_of(),
                b.type_of()
            )));
        };
        let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(Fault::specification(format!(
                "Ft tolerance must be a positive finite number; got {epsilon}"
            )));
        }
        Ok(Check::FloatEqual {
            actual,
            expected,
            epsilon,
        })
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

impl Check<'_> {
    /// Evaluates the predicate. Faults and signals raised by a deferred
    /// block propagate unless the kind exists to catch them.
    pub(crate) fn run(&self) -> TestResult<Verdict> {
        match self {
            Check::Truthy(subject) => {
                let value = subject.resolve()?;
                Ok(Verdict {
                    passed: value.is_truthy(),
                    resolved: Some(value),
                    caught: None,
                    fault: None,
                })
            }
            Check::Falsy(subject) => {
                let value = subject.resolve()?;
                Ok(Verdict {
                    passed: !value.is_truthy(),
                    resolved: Some(value),
                    caught: None,
                    fault: None,
                })
            }
            Check::Nullity(subject) => {
                let value = subject.resolve()?;
                Ok(Verdict {
                    passed: value.is_nil(),
                    resolved: Some(value),
                    caught: None,
                    fault: None,
                })
            }
            Check::Equality { actual, expected } => Ok(Verdict::plain(actual == expected)),
            Check::Match { pattern, text } => Ok(Verdict::plain(pattern.is_match(text))),
            Check::KindOf { value, expected } => Ok(Verdict::plain(expected.matches(value))),
            Check::FloatEqual {
                actual,
                expected,
                epsilon,
            } => Ok(Verdict::plain(float_equal(*actual, *expected, *epsilon))),
            Check::Identity { left, right } => Ok(Verdict::plain(left.identical(right))),
            Check::ExpectError { expected, block } => match block() {
                Ok(_) => Ok(Verdict::plain(false)),
                Err(Interrupt::Error(fault)) => {
                    let matched =
                        expected.is_empty() || expected.iter().any(|kind| fault.matches(kind));
                    if matched {
                        Ok(Verdict {
                            passed: true,
                            resolved: None,
                            caught: None,
                            fault: Some(fault),
                        })
                    } else {
                        // Not one of the faults we wanted; let it escape.
                        Err(Interrupt::Error(fault))
                    }
                }
                Err(other) => Err(other),
            },
            Check::ExpectSignal { name, block } => match block() {
                Ok(_) => Ok(Verdict::plain(false)),
                Err(Interrupt::Signal {
                    name: thrown,
                    payload,
                }) if thrown == *name => Ok(Verdict {
                    passed: true,
                    resolved: None,
                    caught: Some(payload),
                    fault: None,
                }),
                // A different signal means the expected one was not thrown.
                Err(Interrupt::Signal { .. }) => Ok(Verdict::plain(false)),
                Err(other) => Err(other),
            },
        }
    }
}

/// Relative comparison when both values carry scale, absolute comparison
/// against a much tighter bound when one of them is zero.
fn float_equal(actual: f64, expected: f64, epsilon: f64) -> bool {
    if actual == 0.0 && expected == 0.0 {
        true
    } else if actual == 0.0 || expected == 0.0 {
        (actual - expected).abs() < epsilon * epsilon
    } else {
        let ratio = (actual - expected).abs() / actual.abs().max(expected.abs());
        ratio < epsilon
    }
}

// ============================================================================
// FAILURE MESSAGES: generated lazily, only on an actual failure
// ============================================================================

impl Check<'_> {
    pub(crate) fn message(&self, mode: Mode, verdict: &Verdict) -> String {
        let negated = mode == Mode::Negate;
        match self {
            Check::Truthy(_) => {
                let got = resolved_display(verdict);
                if negated {
                    format!("Expected a falsy value, got {got}")
                } else {
                    format!("Expected a truthy value, got {got}")
                }
            }
            Check::Falsy(_) => {
                let got = resolved_display(verdict);
                if negated {
                    format!("Expected a truthy value, got {got}")
                } else {
                    format!("Expected a falsy value, got {got}")
                }
            }
            Check::Nullity(_) => {
                let got = resolved_display(verdict);
                if negated {
                    "Expected a non-nil value, got nil".to_string()
                } else {
                    format!("Expected nil, got {got}")
                }
            }
            Check::Equality { actual, expected } => {
                if negated {
                    format!(
                        "Inequality test failed: the two values are equal\n  Value: {expected}"
                    )
                } else {
                    let mut msg = format!(
                        "Equality test failed\n  Should be: {expected}\n  Was:       {actual}"
                    );
                    if let Some(diff) = string_diff(expected, actual) {
                        msg.push_str("\n  Differences (expected [-..-], actual {+..+}):\n    ");
                        msg.push_str(&diff);
                    }
                    msg
                }
            }
            Check::Match { pattern, text } => {
                let shown = truncate(text, 60);
                if negated {
                    format!("Match test failed: /{}/ matched {shown:?}", pattern.as_str())
                } else {
                    format!(
                        "Match test failed: /{}/ did not match {shown:?}",
                        pattern.as_str()
                    )
                }
            }
            Check::KindOf { value, expected } => {
                if negated {
                    format!("KindOf test failed: {value} is a {expected}")
                } else {
                    format!(
                        "KindOf test failed: {value} is a {}, expected {expected}",
                        value.type_of()
                    )
                }
            }
            Check::FloatEqual {
                actual,
                expected,
                epsilon,
            } => {
                let verdict_line = if negated {
                    "Float equality test failed: values are essentially equal"
                } else {
                    "Float equality test failed"
                };
                let detail = if *actual == 0.0 || *expected == 0.0 {
                    format!(
                        "Absolute difference: {} (allowed: {})",
                        (actual - expected).abs(),
                        epsilon * epsilon
                    )
                } else {
                    format!(
                        "Relative difference: {} (epsilon: {epsilon})",
                        (actual - expected).abs() / actual.abs().max(expected.abs())
                    )
                };
                format!(
                    "{verdict_line}\n  Expected: {expected}\n  Actual:   {actual}\n  {detail}"
                )
            }
            Check::Identity { left, right } => {
                if negated {
                    format!(
                        "Identity test failed: both values are the same object\n  Value: {left}"
                    )
                } else {
                    format!(
                        "Identity test failed: expected the same underlying object\n  Left:  {left}\n  Right: {right}"
                    )
                }
            }
            Check::ExpectError { expected, .. } => {
                let wanted = if expected.is_empty() {
                    "a fault".to_string()
                } else {
                    format!("a fault of kind {}", expected.join(" | "))
                };
                if negated {
                    match &verdict.fault {
                        Some(fault) => format!("Expected no fault, but one was raised: {fault}"),
                        None => "Expected no fault, but one was raised".to_string(),
                    }
                } else {
                    format!("Expected {wanted} to be raised; nothing was raised")
                }
            }
            Check::ExpectSignal { name, .. } => {
                if negated {
                    format!("Signal :{name} was thrown, but none was expected")
                } else {
                    format!("Expected signal :{name} to be thrown; it was not")
                }
            }
        }
    }
}

fn resolved_display(verdict: &Verdict) -> String {
    match &verdict.resolved {
        Some(value) => value.to_string(),
        None => "(no value)".to_string(),
    }
}

/// A character-level diff for equality failures over long strings; short
/// strings read fine from the Should-be/Was lines alone.
fn string_diff(expected: &Value, actual: &Value) -> Option<String> {
    let (expected, actual) = (expected.as_str()?, actual.as_str()?);
    if expected.chars().count() <= 40 && actual.chars().count() <= 40 {
        return None;
    }
    let changeset = Changeset::new(expected, actual, "");
    let mut out = String::new();
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(s) => out.push_str(s),
            Difference::Rem(s) => {
                out.push_str("[-");
                out.push_str(s);
                out.push_str("-]");
            }
            Difference::Add(s) => {
                out.push_str("{+");
                out.push_str(s);
                out.push_str("+}");
            }
        }
    }
    Some(out)
}
