//! The execution engine.
//!
//! A [`Runner`] owns all run state: the test arena, the current scope,
//! the active-test and sandbox stacks, statistics, the shared-code and
//! custom-assertion registries, and the reporting collaborator. Holding
//! the state in one value (instead of process globals) lets independent
//! runners coexist, which is also how this crate tests itself.
//!
//! Execution walks the scope tree recursively. Each test body is invoked
//! through a single boundary that captures failures, faults, escaped
//! signals and panics, reports them exactly once, and collapses them to a
//! payload-free abort so outer layers never re-report. Nested tests
//! declared during a body execute immediately after it, against a scope
//! that was installed fresh for that body and is restored afterwards.

mod ctx;

pub use ctx::Ctx;

use std::any::Any;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

use regex::Regex;
use std::collections::BTreeMap;

use crate::assertion::custom::CustomDef;
use crate::assertion::{Check, Mode};
use crate::outcome::{Failure, Fault, Frame, FrameKind, Interrupt, TestResult};
use crate::report::{ConsoleReporter, EventLog, RecordingReporter, Reporter};
use crate::sandbox::{Sandbox, SandboxRef};
use crate::tree::{Arena, Body, Scope, Status, TestId, TestNode};
use crate::value::Value;

/// A block registered with the shared-code registry.
pub type ShareBlock = Rc<dyn Fn(&mut Sandbox)>;

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub pass: u32,
    pub fail: u32,
    pub error: u32,
    pub assertions: u32,
    pub elapsed: Duration,
}

impl Stats {
    pub fn overall_pass(&self) -> bool {
        self.fail == 0 && self.error == 0
    }

    /// What a wrapping process should exit with.
    pub fn exit_status(&self) -> i32 {
        (self.fail + self.error).min(255) as i32
    }
}

/// Options for [`Runner::run`].
#[derive(Default)]
pub struct RunOptions {
    /// Run only top-level tests whose description matches.
    pub filter: Option<Regex>,
    /// Show hook frames in failure call stacks, not just test frames.
    pub full_stack: bool,
}

/// The run was stopped from inside a body.
struct Stopped;

/// How an invoked body ended, as seen by the scope walker. The original
/// interrupt was already recorded and reported at the invoke boundary.
enum Aborted {
    Body,
    Stop,
}

enum HookFlow {
    Continue,
    /// A hook failed or errored; the rest of this scope cannot be
    /// trusted and is abandoned. Siblings of the scope continue.
    AbortScope,
    Stop,
}

pub struct Runner {
    pub(crate) arena: Arena,
    /// The scope declarations currently attach to. Swapped for a fresh
    /// scope around every test body, stack-style.
    pub(crate) current: Scope,
    /// Tests currently executing, outermost first.
    pub(crate) test_stack: Vec<TestId>,
    /// Sandboxes of the insulated tests currently executing. The
    /// effective sandbox is the top; the ambient sandbox backs the
    /// top level.
    pub(crate) sandbox_stack: Vec<SandboxRef>,
    ambient: SandboxRef,
    /// Bodies currently executing, for failure attribution.
    pub(crate) call_stack: Vec<Frame>,
    pub(crate) stats: Stats,
    pub(crate) share: BTreeMap<String, ShareBlock>,
    pub(crate) customs: BTreeMap<String, CustomDef>,
    /// Set while a custom assertion's run block executes, so its inner
    /// assertions do not inflate the assertion counter.
    pub(crate) inside_custom: bool,
    pub(crate) caught: Option<Value>,
    pub(crate) exception: Option<Fault>,
    pub(crate) reporter: Box<dyn Reporter>,
}

impl Runner {
    pub fn new(reporter: Box<dyn Reporter>) -> Runner {
        Runner {
            arena: Arena::default(),
            current: Scope::default(),
            test_stack: Vec::new(),
            sandbox_stack: Vec::new(),
            ambient: SandboxRef::default(),
            call_stack: Vec::new(),
            stats: Stats::default(),
            share: BTreeMap::new(),
            customs: BTreeMap::new(),
            inside_custom: false,
            caught: None,
            exception: None,
            reporter,
        }
    }

    /// A runner reporting to the terminal with color auto-detection.
    pub fn console() -> Runner {
        Runner::new(Box::new(ConsoleReporter::auto()))
    }

    /// A runner whose reporter records events instead of printing.
    /// Returns the event log alongside, for inspection after the run.
    pub fn recording() -> (Runner, EventLog) {
        let reporter = RecordingReporter::new();
        let log = reporter.log();
        (Runner::new(Box::new(reporter)), log)
    }

    // ========================================================================
    // DECLARATION: the suite tree builder
    // ========================================================================

    /// Declares a test. Top-level tests are always insulated; nested
    /// tests share their nearest insulated ancestor's context unless
    /// declared with [`Runner::test_insulated`].
    pub fn test(
        &mut self,
        description: impl Into<String>,
        body: impl Fn(&mut Ctx<'_>) -> TestResult + 'static,
    ) {
        self.declare(false, description.into(), Rc::new(body));
    }

    /// Declares a test that gets a fresh isolation context even when
    /// nested.
    pub fn test_insulated(
        &mut self,
        description: impl Into<String>,
        body: impl Fn(&mut Ctx<'_>) -> TestResult + 'static,
    ) {
        self.declare(true, description.into(), Rc::new(body));
    }

    /// A parked test: keeps the code around, never declares or runs it.
    pub fn xtest(
        &mut self,
        _description: impl Into<String>,
        _body: impl Fn(&mut Ctx<'_>) -> TestResult + 'static,
    ) {
    }

    fn declare(&mut self, insulated: bool, description: String, body: Body) {
        let insulated = insulated || self.test_stack.is_empty();
        let parent = self.test_stack.last().copied();
        let id = self.arena.alloc(TestNode {
            description,
            body,
            sandbox: insulated.then(SandboxRef::default),
            status: Status::Blank,
            fault: None,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.arena.node_mut(parent).children.push(id);
        }
        self.current.tests.push(id);
    }

    /// Registers a hook to run before each test of the current scope.
    pub fn before_each(&mut self, hook: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) {
        self.current.before_each.push(Rc::new(hook));
    }

    /// Registers a hook to run after each test of the current scope.
    pub fn after_each(&mut self, hook: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) {
        self.current.after_each.push(Rc::new(hook));
    }

    /// Registers a hook to run once before all tests of the current scope.
    pub fn before_all(&mut self, hook: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) {
        self.current.before_all.push(Rc::new(hook));
    }

    /// Registers a hook to run once after all tests of the current scope.
    pub fn after_all(&mut self, hook: impl Fn(&mut Ctx<'_>) -> TestResult + 'static) {
        self.current.after_all.push(Rc::new(hook));
    }

    // ========================================================================
    // REGISTRIES
    // ========================================================================

    /// Shares a code block under an identifier, for later injection into
    /// the nearest insulated context. Sharing the same identifier twice
    /// is a specification error.
    pub fn share(
        &mut self,
        name: impl Into<String>,
        block: impl Fn(&mut Sandbox) + 'static,
    ) -> TestResult {
        let name = name.into();
        if self.share.contains_key(&name) {
            return Err(Interrupt::Error(Fault::specification(format!(
                "a code block has already been shared under the identifier {name:?}"
            ))));
        }
        self.share.insert(name, Rc::new(block));
        Ok(())
    }

    /// Registers a custom assertion. Re-registering a name replaces the
    /// previous definition.
    pub fn define_custom(&mut self, name: impl Into<String>, def: CustomDef) {
        self.customs.insert(name.into(), def);
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Description of the test currently executing, `"(toplevel)"`
    /// outside any test.
    pub fn current_test(&self) -> String {
        self.test_stack
            .last()
            .map(|&id| self.arena.node(id).description.clone())
            .unwrap_or_else(|| "(toplevel)".to_string())
    }

    /// The payload thrown with the signal most recently caught by an
    /// ExpectSignal assertion.
    pub fn caught_value(&self) -> Option<Value> {
        self.caught.clone()
    }

    /// The fault most recently captured by an ExpectError assertion.
    pub fn exception(&self) -> Option<Fault> {
        self.exception.clone()
    }

    pub(crate) fn effective_sandbox(&self) -> SandboxRef {
        self.sandbox_stack
            .last()
            .cloned()
            .unwrap_or_else(|| self.ambient.clone())
    }

    // ========================================================================
    // ASSERTION DISPATCH
    // ========================================================================

    /// The single funnel behind every assertion entry point: counts the
    /// evaluation, runs the check, applies the mode, updates the current
    /// test, and raises a failure carrying a lazily built message.
    pub(crate) fn action(
        &mut self,
        check: Result<Check<'_>, Fault>,
        mode: Mode,
    ) -> TestResult<bool> {
        let check = check.map_err(Interrupt::from)?;
        if !self.inside_custom {
            self.stats.assertions += 1;
        }
        let verdict = check.run()?;
        if let Some(payload) = &verdict.caught {
            self.caught = Some(payload.clone());
        }
        if let Some(fault) = &verdict.fault {
            self.exception = Some(fault.clone());
        }
        let passed = match mode {
            Mode::Assert => verdict.passed,
            Mode::Negate => !verdict.passed,
            Mode::Query => return Ok(verdict.passed),
        };
        if passed {
            // A test only reaches Pass by actually running an assertion;
            // a later failure in the same body overwrites this.
            if let Some(&id) = self.test_stack.last() {
                self.arena.node_mut(id).status = Status::Pass;
            }
            Ok(true)
        } else {
            let message = check.message(mode, &verdict);
            Err(Interrupt::Failure(Failure::new(
                message,
                self.call_stack.clone(),
            )))
        }
    }

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// Runs everything declared so far, then reports. Leaves the runner
    /// ready for fresh declarations; a second `run` will not re-run old
    /// tests.
    pub fn run(&mut self, options: RunOptions) -> &Stats {
        self.stats = Stats::default();
        self.caught = None;
        self.exception = None;
        self.reporter.set_verbose(options.full_stack);

        if let Some(pattern) = &options.filter {
            self.current.filter(pattern, &self.arena);
            if self.current.tests.is_empty() {
                eprintln!(
                    "touchstone: filter /{}/ matched no top-level tests; nothing to run",
                    pattern.as_str()
                );
                self.current = Scope::default();
                return &self.stats;
            }
        }

        let top = mem::take(&mut self.current);
        let roots = top.tests.clone();
        let started = Instant::now();
        // A stop unwinds to here; reporting still happens below.
        let _ = self.execute(top);
        self.stats.elapsed = started.elapsed();

        self.reporter.display_tree(&self.arena, &roots);
        self.reporter.display_failure_details();
        self.reporter.display_summary(&self.stats);
        &self.stats
    }

    /// Walks one scope: before-all, then each test bracketed by the
    /// per-test hooks, then after-all. Recurses into the scope each test
    /// body leaves behind.
    fn execute(&mut self, scope: Scope) -> Result<(), Stopped> {
        match self.run_hooks(&scope.before_all, FrameKind::BeforeAll) {
            HookFlow::Continue => {}
            HookFlow::AbortScope => return Ok(()),
            HookFlow::Stop => return Err(Stopped),
        }

        for &id in &scope.tests {
            match self.run_hooks(&scope.before_each, FrameKind::BeforeEach) {
                HookFlow::Continue => {}
                HookFlow::AbortScope => return Ok(()),
                HookFlow::Stop => return Err(Stopped),
            }

            self.test_stack.push(id);
            let sandboxed = match self.arena.node(id).sandbox.clone() {
                Some(sandbox) => {
                    self.sandbox_stack.push(sandbox);
                    true
                }
                None => false,
            };

            // Install a fresh scope so declarations inside the body
            // attach here, not to the enclosing level.
            let saved = mem::take(&mut self.current);
            let body = self.arena.node(id).body.clone();
            let description = self.arena.node(id).description.clone();
            let outcome = self.invoke(&body, Frame::test(description));
            let nested = mem::replace(&mut self.current, saved);

            let flow = match outcome {
                Ok(()) => {
                    if self.arena.node(id).status == Status::Pass {
                        self.stats.pass += 1;
                    }
                    // Run the tests the body declared. An aborted body
                    // skips this; children it declared before aborting
                    // stay Blank in the tree.
                    self.execute(nested)
                }
                Err(Aborted::Body) => Ok(()),
                Err(Aborted::Stop) => Err(Stopped),
            };

            if sandboxed {
                self.sandbox_stack.pop();
            }
            self.test_stack.pop();
            flow?;

            match self.run_hooks(&scope.after_each, FrameKind::AfterEach) {
                HookFlow::Continue => {}
                HookFlow::AbortScope => return Ok(()),
                HookFlow::Stop => return Err(Stopped),
            }
        }

        match self.run_hooks(&scope.after_all, FrameKind::AfterAll) {
            HookFlow::Continue | HookFlow::AbortScope => Ok(()),
            HookFlow::Stop => Err(Stopped),
        }
    }

    fn run_hooks(&mut self, hooks: &[Body], kind: FrameKind) -> HookFlow {
        for hook in hooks {
            let frame = Frame::hook(kind, self.current_test());
            match self.invoke(hook, frame) {
                Ok(()) => {}
                Err(Aborted::Body) => return HookFlow::AbortScope,
                Err(Aborted::Stop) => return HookFlow::Stop,
            }
        }
        HookFlow::Continue
    }

    /// The invoke boundary. Pushes a call-stack frame, runs the body
    /// (catching panics), and resolves its outcome: failures and faults
    /// are counted, recorded on the current test, and reported here,
    /// exactly once. The caller only learns "completed", "aborted" or
    /// "stop", never the original payload.
    fn invoke(&mut self, body: &Body, frame: Frame) -> Result<(), Aborted> {
        self.call_stack.push(frame);
        let outcome = {
            let mut ctx = Ctx { run: &mut *self };
            let callee = body.as_ref();
            catch_unwind(AssertUnwindSafe(|| callee(&mut ctx)))
                .unwrap_or_else(|payload| Err(Interrupt::Error(Fault::panic(panic_text(payload)))))
        };
        // A panic inside a custom run block must not leave the guard set.
        self.inside_custom = false;

        let result = match outcome {
            Ok(()) => Ok(()),
            Err(Interrupt::Failure(failure)) => {
                self.stats.fail += 1;
                if let Some(&id) = self.test_stack.last() {
                    self.arena.node_mut(id).status = Status::Fail;
                }
                let description = self.current_test();
                self.reporter
                    .report_failure(&description, &failure.message, &failure.frames);
                Err(Aborted::Body)
            }
            Err(Interrupt::Error(fault)) => Err(self.record_fault(fault)),
            Err(Interrupt::Signal { name, payload }) => {
                Err(self.record_fault(Fault::uncaught_signal(&name, &payload)))
            }
            Err(Interrupt::Stop) => Err(Aborted::Stop),
        };
        self.call_stack.pop();
        result
    }

    fn record_fault(&mut self, fault: Fault) -> Aborted {
        self.stats.error += 1;
        if let Some(&id) = self.test_stack.last() {
            let node = self.arena.node_mut(id);
            node.status = Status::Error;
            node.fault = Some(fault.clone());
        }
        let description = self.current_test();
        self.reporter
            .report_uncaught_fault(&description, &fault, &self.call_stack);
        Aborted::Body
    }
}

fn panic_text(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic with non-text payload".to_string()
    }
}
