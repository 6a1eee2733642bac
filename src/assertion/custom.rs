//! Custom assertions: named, parameterized composites of primitive
//! assertions.
//!
//! A definition pairs a parameter specification with a run block. The run
//! block executes against a [`Fields`] context that exposes the bound
//! parameters and a `field` primitive; each `field` call runs exactly one
//! primitive assertion and, on failure, tags the failure with the field's
//! label so the composite's message can point at the part that broke.
//!
//! Definitions may be replaced freely: registering the same name twice
//! keeps the later definition. (The shared-code registry deliberately
//! does the opposite.)

use std::rc::Rc;

use crate::outcome::{Fault, Interrupt, TestResult};
use crate::runner::Ctx;
use crate::value::{Value, ValueType};

/// The run block of a custom assertion.
pub type RunBlock = Rc<dyn Fn(&mut Fields<'_, '_>) -> TestResult>;

/// One registered custom assertion.
#[derive(Clone)]
pub struct CustomDef {
    /// Short human description, quoted in failure messages.
    pub description: String,
    /// Ordered parameter spec: name and required type per position.
    pub params: Vec<(String, ValueType)>,
    pub run: RunBlock,
}

impl CustomDef {
    pub fn new(
        description: impl Into<String>,
        params: Vec<(String, ValueType)>,
        run: impl Fn(&mut Fields<'_, '_>) -> TestResult + 'static,
    ) -> CustomDef {
        CustomDef {
            description: description.into(),
            params,
            run: Rc::new(run),
        }
    }

    /// Checks invocation arguments against the parameter spec.
    pub(crate) fn validate(&self, name: &str, args: &[Value]) -> Result<(), Fault> {
        if args.len() != self.params.len() {
            return Err(Fault::specification(format!(
                "custom assertion {name:?} expects {} arguments; got {}",
                self.params.len(),
                args.len()
            )));
        }
        for ((param, required), arg) in self.params.iter().zip(args) {
            if !required.matches(arg) {
                return Err(Fault::specification(format!(
                    "custom assertion {name:?}, parameter {param:?}: expected {required}, got {} ({arg})",
                    arg.type_of()
                )));
            }
        }
        Ok(())
    }
}

/// The execution context of a custom assertion's run block.
pub struct Fields<'a, 'r> {
    pub(crate) ctx: &'a mut Ctx<'r>,
    params: Vec<(String, Value)>,
}

impl<'a, 'r> Fields<'a, 'r> {
    pub(crate) fn new(ctx: &'a mut Ctx<'r>, params: Vec<(String, Value)>) -> Fields<'a, 'r> {
        Fields { ctx, params }
    }

    /// The enclosing test context, for anything beyond field checks.
    pub fn ctx(&mut self) -> &mut Ctx<'r> {
        &mut *self.ctx
    }

    /// Reads a bound parameter by name.
    pub fn param(&self, name: &str) -> TestResult<Value> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| {
                Interrupt::Error(Fault::specification(format!(
                    "custom assertion has no parameter named {name:?}"
                )))
            })
    }

    /// Runs one primitive assertion under a field label. On failure the
    /// label travels with it, so the composite's message can name the
    /// field that broke.
    pub fn field(
        &mut self,
        label: &str,
        check: impl FnOnce(&mut Ctx<'r>) -> TestResult,
    ) -> TestResult {
        match check(&mut *self.ctx) {
            Err(Interrupt::Failure(mut failure)) => {
                failure.field_label = Some(label.to_string());
                Err(Interrupt::Failure(failure))
            }
            Err(Interrupt::Error(fault)) if fault.is_specification() => {
                Err(Interrupt::Error(Fault::specification(format!(
                    "field {label:?}: {}",
                    fault.message
                ))))
            }
            other => other,
        }
    }
}
