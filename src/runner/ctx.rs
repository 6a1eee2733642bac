//! The context handed to every test body and hook body.
//!
//! `Ctx` is the whole authoring surface: declaration of nested tests and
//! hooks, sandbox field access, the shared-code registry, run control,
//! and the assertion entry points. Assertions follow one naming scheme
//! across all kinds: the base name asserts, `*_not` negates, `*_query`
//! evaluates and returns the boolean without ever failing the test. The
//! kinds that accept a value or a deferred block add `*_with` variants
//! taking the block.

use crate::assertion::custom::Fields;
use crate::assertion::{Check, Mode, Subject};
use crate::outcome::{Failure, Fault, Interrupt, TestResult};
use crate::runner::Runner;
use crate::sandbox::Sandbox;
use crate::text::indent;
use crate::tree::Status;
use crate::value::{Value, ValueType};

pub struct Ctx<'r> {
    pub(crate) run: &'r mut Runner,
}

impl<'r> Ctx<'r> {
    // ========================================================================
    // DECLARATION
    // ========================================================================

    /// Declares a nested test, discovered and run right after this body
    /// completes.
    pub fn test(
        &mut self,
        description: impl Into<String>,
        body: impl Fn(&mut Ctx<'_>) -> TestResult + 'static,
    ) {
        self.run.test(description, body);
    }

    /// Declares a nested test with its own fresh isolation context.
    pub fn test_insulated(
        &mut self,
        description: impl Into<String>,
        body: impl Fn(&mut Ctx<'_>) -> TestResult + 'static,
    ) {
        self.run.test_insulated(description, body);
    }

    /// A parked test: never declared, never run.
    pub fn xtest(
        &mut self,
        description: impl Into<String>,
        body: impl Fn(&mut Ctx<'_>) -> TestResult + 'static,
    ) {
        self.run.xtest(description, body);
    }

    pub fn before_each(&mut self, hook: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) {
        self.run.before_each(hook);
    }

    pub fn after_each(&mut self, hook: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) {
        self.run.after_each(hook);
    }

    pub fn before_all(&mut self, hook: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) {
        self.run.before_all(hook);
    }

    pub fn after_all(&mut self, hook: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) {
        self.run.after_all(hook);
    }

    // ========================================================================
    // SANDBOX FIELDS
    // ========================================================================

    /// Reads a field of the effective isolation context. Unset fields
    /// read as `Nil`.
    pub fn get(&self, name: &str) -> Value {
        self.run.effective_sandbox().borrow().get(name)
    }

    /// Writes a field of the effective isolation context.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.run.effective_sandbox().borrow_mut().set(name, value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.run.effective_sandbox().borrow().has(name)
    }

    // ========================================================================
    // SHARED CODE
    // ========================================================================

    /// Shares a code block under an identifier. Redefinition is a
    /// specification error.
    pub fn share(
        &mut self,
        name: impl Into<String>,
        block: impl Fn(&mut Sandbox) + 'static,
    ) -> TestResult {
        self.run.share(name, block)
    }

    /// Runs the block shared under `name` against the nearest insulated
    /// context.
    pub fn inject(&mut self, name: &str) -> TestResult {
        let Some(block) = self.run.share.get(name).cloned() else {
            return Err(Interrupt::Error(Fault::specification(format!(
                "no code block is shared under the identifier {name:?}"
            ))));
        };
        if self.run.test_stack.is_empty() {
            return Err(Interrupt::Error(Fault::specification(format!(
                "cannot inject the shared code block {name:?} outside of a test"
            ))));
        }
        let sandbox = self.run.effective_sandbox();
        block.as_ref()(&mut sandbox.borrow_mut());
        Ok(())
    }

    /// Shares a block and injects it here in one step.
    pub fn share_now(
        &mut self,
        name: impl Into<String>,
        block: impl Fn(&mut Sandbox) + 'static,
    ) -> TestResult {
        let name = name.into();
        self.run.share(name.clone(), block)?;
        self.inject(&name)
    }

    /// Whether any block is shared under the identifier.
    pub fn is_shared(&self, name: &str) -> bool {
        self.run.share.contains_key(name)
    }

    // ========================================================================
    // RUN CONTROL AND INSPECTION
    // ========================================================================

    /// Requests unconditional termination of the whole run. Use as
    /// `return ctx.stop();` so the signal propagates out of the body.
    pub fn stop(&self) -> TestResult {
        Err(Interrupt::Stop)
    }

    /// Description of the currently running test.
    pub fn current_test(&self) -> String {
        self.run.current_test()
    }

    /// The payload thrown with the most recently caught signal.
    pub fn caught_value(&self) -> Option<Value> {
        self.run.caught_value()
    }

    /// The fault most recently captured by an ExpectError assertion.
    pub fn exception(&self) -> Option<Fault> {
        self.run.exception()
    }

    // ========================================================================
    // ASSERTIONS: Truthy (t), Falsy (f), Nullity (n)
    // ========================================================================

    pub fn t(&mut self, value: impl Into<Value>) -> TestResult {
        self.assert(Ok(Check::Truthy(Subject::Value(value.into()))))
    }

    pub fn t_not(&mut self, value: impl Into<Value>) -> TestResult {
        self.negate(Ok(Check::Truthy(Subject::Value(value.into()))))
    }

    pub fn t_query(&mut self, value: impl Into<Value>) -> TestResult<bool> {
        self.query(Ok(Check::Truthy(Subject::Value(value.into()))))
    }

    pub fn t_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.assert(Ok(Check::Truthy(Subject::Block(&block))))
    }

    pub fn t_not_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.negate(Ok(Check::Truthy(Subject::Block(&block))))
    }

    pub fn t_query_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult<bool> {
        self.query(Ok(Check::Truthy(Subject::Block(&block))))
    }

    pub fn f(&mut self, value: impl Into<Value>) -> TestResult {
        self.assert(Ok(Check::Falsy(Subject::Value(value.into()))))
    }

    pub fn f_not(&mut self, value: impl Into<Value>) -> TestResult {
        self.negate(Ok(Check::Falsy(Subject::Value(value.into()))))
    }

    pub fn f_query(&mut self, value: impl Into<Value>) -> TestResult<bool> {
        self.query(Ok(Check::Falsy(Subject::Value(value.into()))))
    }

    pub fn f_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.assert(Ok(Check::Falsy(Subject::Block(&block))))
    }

    pub fn f_not_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.negate(Ok(Check::Falsy(Subject::Block(&block))))
    }

    pub fn f_query_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult<bool> {
        self.query(Ok(Check::Falsy(Subject::Block(&block))))
    }

    pub fn n(&mut self, value: impl Into<Value>) -> TestResult {
        self.assert(Ok(Check::Nullity(Subject::Value(value.into()))))
    }

    pub fn n_not(&mut self, value: impl Into<Value>) -> TestResult {
        self.negate(Ok(Check::Nullity(Subject::Value(value.into()))))
    }

    pub fn n_query(&mut self, value: impl Into<Value>) -> TestResult<bool> {
        self.query(Ok(Check::Nullity(Subject::Value(value.into()))))
    }

    pub fn n_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.assert(Ok(Check::Nullity(Subject::Block(&block))))
    }

    pub fn n_not_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.negate(Ok(Check::Nullity(Subject::Block(&block))))
    }

    pub fn n_query_with(&mut self, block: impl Fn() -> TestResult<Value>) -> TestResult<bool> {
        self.query(Ok(Check::Nullity(Subject::Block(&block))))
    }

    // ========================================================================
    // ASSERTIONS: Equality (eq), Match (mt), KindOf (ko)
    // ========================================================================

    pub fn eq(&mut self, actual: impl Into<Value>, expected: impl Into<Value>) -> TestResult {
        self.assert(Ok(Check::Equality {
            actual: actual.into(),
            expected: expected.into(),
        }))
    }

    pub fn eq_not(&mut self, actual: impl Into<Value>, expected: impl Into<Value>) -> TestResult {
        self.negate(Ok(Check::Equality {
            actual: actual.into(),
            expected: expected.into(),
        }))
    }

    pub fn eq_query(
        &mut self,
        actual: impl Into<Value>,
        expected: impl Into<Value>,
    ) -> TestResult<bool> {
        self.query(Ok(Check::Equality {
            actual: actual.into(),
            expected: expected.into(),
        }))
    }

    /// Pattern match; one argument must be a pattern and the other a
    /// string, in either order.
    pub fn mt(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TestResult {
        self.assert(Check::matching(a.into(), b.into()))
    }

    pub fn mt_not(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TestResult {
        self.negate(Check::matching(a.into(), b.into()))
    }

    pub fn mt_query(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TestResult<bool> {
        self.query(Check::matching(a.into(), b.into()))
    }

    pub fn ko(&mut self, value: impl Into<Value>, expected: ValueType) -> TestResult {
        self.assert(Ok(Check::KindOf {
            value: value.into(),
            expected,
        }))
    }

    pub fn ko_not(&mut self, value: impl Into<Value>, expected: ValueType) -> TestResult {
        self.negate(Ok(Check::KindOf {
            value: value.into(),
            expected,
        }))
    }

    pub fn ko_query(&mut self, value: impl Into<Value>, expected: ValueType) -> TestResult<bool> {
        self.query(Ok(Check::KindOf {
            value: value.into(),
            expected,
        }))
    }

    // ========================================================================
    // ASSERTIONS: FloatEqual (ft), Identity (id)
    // ========================================================================

    pub fn ft(&mut self, actual: impl Into<Value>, expected: impl Into<Value>) -> TestResult {
        self.assert(Check::float(actual.into(), expected.into(), None))
    }

    pub fn ft_not(&mut self, actual: impl Into<Value>, expected: impl Into<Value>) -> TestResult {
        self.negate(Check::float(actual.into(), expected.into(), None))
    }

    pub fn ft_query(
        &mut self,
        actual: impl Into<Value>,
        expected: impl Into<Value>,
    ) -> TestResult<bool> {
        self.query(Check::float(actual.into(), expected.into(), None))
    }

    pub fn ft_eps(
        &mut self,
        actual: impl Into<Value>,
        expected: impl Into<Value>,
        epsilon: f64,
    ) -> TestResult {
        self.assert(Check::float(actual.into(), expected.into(), Some(epsilon)))
    }

    pub fn ft_not_eps(
        &mut self,
        actual: impl Into<Value>,
        expected: impl Into<Value>,
        epsilon: f64,
    ) -> TestResult {
        self.negate(Check::float(actual.into(), expected.into(), Some(epsilon)))
    }

    pub fn ft_query_eps(
        &mut self,
        actual: impl Into<Value>,
        expected: impl Into<Value>,
        epsilon: f64,
    ) -> TestResult<bool> {
        self.query(Check::float(actual.into(), expected.into(), Some(epsilon)))
    }

    pub fn id(&mut self, left: impl Into<Value>, right: impl Into<Value>) -> TestResult {
        self.assert(Ok(Check::Identity {
            left: left.into(),
            right: right.into(),
        }))
    }

    pub fn id_not(&mut self, left: impl Into<Value>, right: impl Into<Value>) -> TestResult {
        self.negate(Ok(Check::Identity {
            left: left.into(),
            right: right.into(),
        }))
    }

    pub fn id_query(
        &mut self,
        left: impl Into<Value>,
        right: impl Into<Value>,
    ) -> TestResult<bool> {
        self.query(Ok(Check::Identity {
            left: left.into(),
            right: right.into(),
        }))
    }

    // ========================================================================
    // ASSERTIONS: ExpectError (e), ExpectSignal (c)
    // ========================================================================

    /// Requires the block to raise a fault of one of the expected kinds.
    /// An empty kind list accepts any fault; a fault of an unexpected
    /// kind is re-raised, not swallowed. The captured fault is available
    /// afterwards through [`Ctx::exception`].
    pub fn e(&mut self, kinds: &[&str], block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.assert(Ok(Check::ExpectError {
            expected: kinds.iter().map(|k| k.to_string()).collect(),
            block: &block,
        }))
    }

    pub fn e_not(&mut self, kinds: &[&str], block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.negate(Ok(Check::ExpectError {
            expected: kinds.iter().map(|k| k.to_string()).collect(),
            block: &block,
        }))
    }

    pub fn e_query(
        &mut self,
        kinds: &[&str],
        block: impl Fn() -> TestResult<Value>,
    ) -> TestResult<bool> {
        self.query(Ok(Check::ExpectError {
            expected: kinds.iter().map(|k| k.to_string()).collect(),
            block: &block,
        }))
    }

    /// Requires the block to throw exactly the named signal. The payload
    /// thrown with it is available afterwards through
    /// [`Ctx::caught_value`].
    pub fn c(&mut self, name: &str, block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.assert(Ok(Check::ExpectSignal {
            name: name.to_string(),
            block: &block,
        }))
    }

    pub fn c_not(&mut self, name: &str, block: impl Fn() -> TestResult<Value>) -> TestResult {
        self.negate(Ok(Check::ExpectSignal {
            name: name.to_string(),
            block: &block,
        }))
    }

    pub fn c_query(
        &mut self,
        name: &str,
        block: impl Fn() -> TestResult<Value>,
    ) -> TestResult<bool> {
        self.query(Ok(Check::ExpectSignal {
            name: name.to_string(),
            block: &block,
        }))
    }

    // ========================================================================
    // CUSTOM ASSERTIONS
    // ========================================================================

    /// Invokes a registered custom assertion. Counts as exactly one
    /// evaluated assertion no matter how many field checks run inside.
    pub fn custom(&mut self, name: &str, args: &[Value]) -> TestResult {
        let Some(def) = self.run.customs.get(name).cloned() else {
            return Err(Interrupt::Error(Fault::specification(format!(
                "non-existent custom assertion: {name:?}"
            ))));
        };
        def.validate(name, args).map_err(Interrupt::from)?;
        if self.run.inside_custom {
            return Err(Interrupt::Error(Fault::specification(
                "custom assertions cannot be nested",
            )));
        }

        self.run.stats.assertions += 1;
        self.run.inside_custom = true;
        let outcome = {
            let params = def
                .params
                .iter()
                .map(|(param, _)| param.clone())
                .zip(args.iter().cloned())
                .collect();
            let mut fields = Fields::new(&mut *self, params);
            def.run.as_ref()(&mut fields)
        };
        self.run.inside_custom = false;

        match outcome {
            Ok(()) => {
                if let Some(&id) = self.run.test_stack.last() {
                    self.run.arena.node_mut(id).status = Status::Pass;
                }
                Ok(())
            }
            Err(Interrupt::Failure(inner)) => {
                let label = inner
                    .field_label
                    .clone()
                    .unwrap_or_else(|| "(no field)".to_string());
                let message = format!(
                    "{} test failed: {} (details below)\n{}",
                    def.description,
                    label,
                    indent(&inner.message, 4)
                );
                Err(Interrupt::Failure(Failure::new(message, inner.frames)))
            }
            Err(Interrupt::Error(fault)) if fault.is_specification() => {
                Err(Interrupt::Error(Fault::specification(format!(
                    "{} test: {}",
                    def.description, fault.message
                ))))
            }
            Err(other) => Err(other),
        }
    }

    // ========================================================================
    // DISPATCH HELPERS
    // ========================================================================

    fn assert(&mut self, check: Result<Check<'_>, Fault>) -> TestResult {
        self.run.action(check, Mode::Assert).map(|_| ())
    }

    fn negate(&mut self, check: Result<Check<'_>, Fault>) -> TestResult {
        self.run.action(check, Mode::Negate).map(|_| ())
    }

    fn query(&mut self, check: Result<Check<'_>, Fault>) -> TestResult<bool> {
        self.run.action(check, Mode::Query)
    }
}
