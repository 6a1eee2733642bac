//! Isolation contexts for insulated tests.
//!
//! A sandbox is a fresh record of named fields that plays the role an
//! implicit instance would in a dynamic language: state written inside an
//! insulated test lives here and is invisible to siblings and ancestors.
//! Non-insulated tests share the sandbox of their nearest insulated
//! ancestor by reference.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::value::Value;

/// Shared handle to a sandbox. Insulated tests own a fresh one; everything
/// else borrows its nearest insulated ancestor's.
pub type SandboxRef = Rc<RefCell<Sandbox>>;

/// A mutable record of named test-local fields.
#[derive(Debug, Default)]
pub struct Sandbox {
    fields: BTreeMap<String, Value>,
}

impl Sandbox {
    pub fn new() -> Sandbox {
        Sandbox::default()
    }

    /// Reads a field. An unset field reads as `Nil`, so probing state that
    /// another test wrote (but this one cannot see) is not an error.
    pub fn get(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or(Value::Nil)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}
