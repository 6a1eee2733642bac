//! The test tree: an arena of test nodes plus per-level scopes.
//!
//! Nodes are created while declaration code runs (including declaration
//! code inside a parent test's body) and addressed by [`TestId`] handles.
//! A [`Scope`] is the bag of tests and hooks belonging to one nesting
//! level; the runner installs a fresh scope before invoking each body and
//! restores the previous one afterwards.

use regex::Regex;
use std::rc::Rc;

use crate::outcome::{Fault, TestResult};
use crate::runner::Ctx;
use crate::sandbox::SandboxRef;

/// A deferred computation: a test body or a hook body.
pub type Body = Rc<dyn Fn(&mut Ctx<'_>) -> TestResult>;

/// Handle to a node in the [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestId(pub(crate) usize);

/// Resolution state of a test. `Blank` means the body ran (or has not run
/// yet) without evaluating a single assertion; it is distinct from `Pass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Blank,
    Pass,
    Fail,
    Error,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Blank => "-",
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Error => "ERROR",
        }
    }
}

/// One declared test.
pub struct TestNode {
    pub description: String,
    pub(crate) body: Body,
    /// Present iff the test is insulated.
    pub(crate) sandbox: Option<SandboxRef>,
    pub status: Status,
    /// The fault that errored this test, if any.
    pub fault: Option<Fault>,
    pub parent: Option<TestId>,
    /// Tests declared during this test's own body execution.
    pub children: Vec<TestId>,
}

impl TestNode {
    pub fn insulated(&self) -> bool {
        self.sandbox.is_some()
    }
}

/// Owns every test node for the lifetime of the runner.
#[derive(Default)]
pub struct Arena {
    nodes: Vec<TestNode>,
}

impl Arena {
    pub(crate) fn alloc(&mut self, node: TestNode) -> TestId {
        let id = TestId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: TestId) -> &TestNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: TestId) -> &mut TestNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Visits `roots` and their descendants depth-first, in declaration
    /// order, yielding each id with its nesting depth.
    pub fn walk(&self, roots: &[TestId], visit: &mut impl FnMut(TestId, usize)) {
        fn go(arena: &Arena, id: TestId, depth: usize, visit: &mut impl FnMut(TestId, usize)) {
            visit(id, depth);
            let children = arena.node(id).children.clone();
            for child in children {
                go(arena, child, depth + 1, visit);
            }
        }
        for &root in roots {
            go(self, root, 0, visit);
        }
    }
}

/// The tests and hooks of one nesting level.
#[derive(Default)]
pub struct Scope {
    pub(crate) tests: Vec<TestId>,
    pub(crate) before_each: Vec<Body>,
    pub(crate) after_each: Vec<Body>,
    pub(crate) before_all: Vec<Body>,
    pub(crate) after_all: Vec<Body>,
}

impl Scope {
    /// Keeps only tests whose description matches the pattern.
    pub(crate) fn filter(&mut self, pattern: &Regex, arena: &Arena) {
        self.tests
            .retain(|&id| pattern.is_match(&arena.node(id).description));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(description: &str) -> TestNode {
        let body: Body = Rc::new(|_ctx| Ok(()));
        TestNode {
            description: description.to_string(),
            body,
            sandbox: None,
            status: Status::Blank,
            fault: None,
            parent: None,
            children: Vec::new(),
        }
    }

    #[test]
    fn walk_is_depth_first_in_declaration_order() {
        let mut arena = Arena::default();
        let a = arena.alloc(leaf("a"));
        let b = arena.alloc(leaf("b"));
        let a1 = arena.alloc(leaf("a1"));
        arena.node_mut(a1).parent = Some(a);
        arena.node_mut(a).children.push(a1);

        let mut seen = Vec::new();
        arena.walk(&[a, b], &mut |id, depth| {
            seen.push((arena.node(id).description.clone(), depth));
        });
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 0),
                ("a1".to_string(), 1),
                ("b".to_string(), 0)
            ]
        );
    }

    #[test]
    fn filter_retains_matching_descriptions() {
        let mut arena = Arena::default();
        let math = arena.alloc(leaf("Math"));
        let strings = arena.alloc(leaf("Strings"));
        let mut scope = Scope {
            tests: vec![math, strings],
            ..Scope::default()
        };
        scope.filter(&Regex::new("Mat").unwrap(), &arena);
        assert_eq!(scope.tests, vec![math]);
    }
}
