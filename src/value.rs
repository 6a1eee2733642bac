//! Dynamic values: the currency of assertions and sandbox state.
//!
//! Every assertion argument and every sandbox field is a [`Value`]. Scalars
//! carry their data inline; strings, lists, maps and patterns are reference
//! counted so that [`Value::identical`] can distinguish "the same underlying
//! object" from "an equal but separately built value".

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::outcome::Fault;

/// A dynamically typed test value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<String>),
    List(Rc<Vec<Value>>),
    Map(Rc<BTreeMap<String, Value>>),
    Pattern(Rc<Regex>),
}

/// The type tag of a [`Value`], used by the KindOf assertion and by
/// custom-assertion parameter specifications. `Any` matches every value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Any,
    Nil,
    Bool,
    Number,
    Str,
    List,
    Map,
    Pattern,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Any => "Any",
            ValueType::Nil => "Nil",
            ValueType::Bool => "Bool",
            ValueType::Number => "Number",
            ValueType::Str => "Str",
            ValueType::List => "List",
            ValueType::Map => "Map",
            ValueType::Pattern => "Pattern",
        }
    }

    /// Whether the given value carries this type tag.
    pub fn matches(&self, value: &Value) -> bool {
        *self == ValueType::Any || *self == value.type_of()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Value {
    pub fn type_of(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(_) => ValueType::Number,
            Value::Str(_) => ValueType::Str,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Pattern(_) => ValueType::Pattern,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness follows the original semantics: everything is truthy
    /// except `Nil` and `Bool(false)`. Zero and the empty string are truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Reference identity. Scalars are identical when equal; reference
    /// variants are identical only when they share an allocation.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Pattern(a), Value::Pattern(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Builds a list value from anything iterable.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    /// Builds a map value from string-keyed pairs.
    pub fn map(pairs: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::Map(Rc::new(pairs.into_iter().collect()))
    }

    /// Compiles a regular expression into a pattern value. An invalid
    /// expression is the author's mistake, so it surfaces as a
    /// specification fault.
    pub fn pattern(source: &str) -> Result<Value, Fault> {
        Regex::new(source)
            .map(|re| Value::Pattern(Rc::new(re)))
            .map_err(|e| Fault::specification(format!("invalid pattern /{source}/: {e}")))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Pattern(a), Value::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Value {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(Rc::new(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(Rc::new(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_deep() {
        let a = Value::list([Value::from(1), Value::from("x")]);
        let b = Value::list([Value::from(1), Value::from("x")]);
        assert_eq!(a, b);
        assert_ne!(a, Value::list([Value::from(2)]));
    }

    #[test]
    fn identity_requires_shared_allocation() {
        let a = Value::from("hello");
        let b = a.clone();
        let c = Value::from("hello");
        assert!(a.identical(&b));
        assert!(!a.identical(&c));
        assert_eq!(a, c);
    }

    #[test]
    fn scalars_are_identical_when_equal() {
        assert!(Value::from(4).identical(&Value::from(4.0)));
        assert!(Value::Nil.identical(&Value::Nil));
        assert!(!Value::from(true).identical(&Value::from(false)));
    }

    #[test]
    fn truthiness_matches_nil_and_false_only() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[test]
    fn display_trims_integral_numbers() {
        assert_eq!(Value::from(4.0).to_string(), "4");
        assert_eq!(Value::from(4.5).to_string(), "4.5");
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
    }

    #[test]
    fn pattern_compiles_and_compares_by_source() {
        let a = Value::pattern("ab+").unwrap();
        let b = Value::pattern("ab+").unwrap();
        assert_eq!(a, b);
        assert!(!a.identical(&b));
        assert!(Value::pattern("(unclosed").is_err());
    }

    #[test]
    fn type_tags() {
        assert_eq!(Value::Nil.type_of(), ValueType::Nil);
        assert!(ValueType::Any.matches(&Value::from(3)));
        assert!(ValueType::Number.matches(&Value::from(3)));
        assert!(!ValueType::Str.matches(&Value::from(3)));
    }
}
