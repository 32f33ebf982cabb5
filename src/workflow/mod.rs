//! Workflow document model.
//!
//! A digdag workflow is a tree of named tasks. Leaves hold task directives
//! (`td>`, `source`, `create_table`, ...), groups hold child tasks, and a
//! group carrying `_parallel: true` lets digdag run its children
//! concurrently. Key order is significant: digdag runs sibling tasks in the
//! order they appear, so [`Task`] keeps insertion order.

mod output;

pub use output::{DigPrinter, to_dig};

use indexmap::IndexMap;

use crate::value::Value;

/// Reserved key flagging a group for concurrent execution
pub const PARALLEL: &str = "_parallel";

/// A node of the workflow tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Directive value
    Scalar(Value),

    /// Nested task, group or mapping (`_export`, `td`)
    Task(Task),
}

/// An insertion-ordered mapping of keys to nodes.
///
/// # Examples
///
/// ```
/// use molehill::workflow::{Task, to_dig};
///
/// let split = Task::new()
///     .parallel()
///     .set("+train", Task::new().set("td>", "queries/split_train.sql"))
///     .set("+test", Task::new().set("td>", "queries/split_test.sql"));
///
/// assert_eq!(
///     to_dig(&split),
///     "_parallel: true\n+train:\n  td>: queries/split_train.sql\n+test:\n  td>: queries/split_test.sql\n"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Task {
    entries: IndexMap<String, Node>,
}

impl Task {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn set(mut self, key: impl Into<String>, node: impl Into<Node>) -> Self {
        self.insert(key, node);
        self
    }

    /// Insert or replace `key`. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<Node>) {
        self.entries.insert(key.into(), node.into());
    }

    /// Flag this group for concurrent execution of its children.
    pub fn parallel(self) -> Self {
        self.set(PARALLEL, true)
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self.get(PARALLEL), Some(Node::Scalar(Value::Boolean(true))))
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    /// Child task under `key`, if it is a task.
    pub fn task(&self, key: &str) -> Option<&Task> {
        match self.get(key) {
            Some(Node::Task(task)) => Some(task),
            _ => None,
        }
    }

    /// Scalar under `key`, if it is a scalar.
    pub fn scalar(&self, key: &str) -> Option<&Value> {
        match self.get(key) {
            Some(Node::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Task> for Node {
    fn from(task: Task) -> Self {
        Node::Task(task)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Scalar(value)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(Value::from(s))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(Value::from(s))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Scalar(Value::Boolean(b))
    }
}
