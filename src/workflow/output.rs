//! digdag (`.dig`) serialization for workflow documents.
//!
//! The output is block-style YAML with 2-space indentation. Keys are written
//! in insertion order, never sorted, because digdag runs sibling tasks in the
//! order they appear. Strings are left plain when YAML would read them back
//! unchanged and quoted otherwise:
//!
//! - **Plain** - `queries/shuffle.sql`, `${source}_train`
//! - **Single-quoted** - strings YAML would read as another type (`'true'`,
//!   `'0.8'`) or that contain `: `
//! - **Double-quoted** - strings with control characters (`"a:\tb"`)

use std::sync::LazyLock;

use regex::Regex;

use super::{Node, Task};
use crate::value::Value;

static NUMBER_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(\.[0-9]+|[0-9][0-9_]*(\.[0-9]*)?)([eE][-+]?[0-9]+)?$|^[-+]?\.(inf|Inf|INF)$|^\.(nan|NaN|NAN)$")
        .expect("valid number pattern")
});

const RESERVED_WORDS: [&str; 10] = ["true", "false", "yes", "no", "on", "off", "null", "~", "y", "n"];

pub struct DigPrinter;

impl DigPrinter {
    pub fn new() -> Self {
        DigPrinter
    }

    pub fn print(&self, task: &Task) -> String {
        self.print_task(task, 0)
    }

    fn print_task(&self, task: &Task, indent: usize) -> String {
        let mut result = String::new();
        for (key, node) in task.iter() {
            result.push_str(&self.indent(indent));
            result.push_str(&self.format_string(key));
            match node {
                Node::Scalar(value) => {
                    result.push_str(": ");
                    result.push_str(&self.format_value(value));
                    result.push('\n');
                }
                Node::Task(child) if child.is_empty() => result.push_str(": {}\n"),
                Node::Task(child) => {
                    result.push_str(":\n");
                    result.push_str(&self.print_task(child, indent + 1));
                }
            }
        }
        result
    }

    fn format_value(&self, value: &Value) -> String {
        match value {
            Value::String(s) => self.format_string(s),
            other => other.to_string(),
        }
    }

    fn format_string(&self, s: &str) -> String {
        if s.chars().any(|c| c.is_control()) {
            format!("\"{}\"", self.escape_string(s))
        } else if self.needs_quotes(s) {
            format!("'{}'", s.replace('\'', "''"))
        } else {
            s.to_string()
        }
    }

    fn needs_quotes(&self, s: &str) -> bool {
        let mut chars = s.chars();
        let Some(first) = chars.next() else {
            return true;
        };
        let second = chars.next();

        if s.trim() != s || s.contains(": ") || s.contains(" #") || s.ends_with(':') {
            return true;
        }
        if ",[]{}#&*!|>'\"%@`".contains(first) {
            return true;
        }
        if "-?:".contains(first) && second.is_none_or(|c| c == ' ') {
            return true;
        }

        RESERVED_WORDS.contains(&s.to_lowercase().as_str()) || NUMBER_LIKE.is_match(s)
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }

    fn escape_string(&self, s: &str) -> String {
        s.chars()
            .flat_map(|c| match c {
                '"' => vec!['\\', '"'],
                '\\' => vec!['\\', '\\'],
                '\n' => vec!['\\', 'n'],
                '\r' => vec!['\\', 'r'],
                '\t' => vec!['\\', 't'],
                c if c.is_control() => format!("\\u{:04x}", c as u32).chars().collect(),
                c => vec![c],
            })
            .collect()
    }
}

impl Default for DigPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a workflow document to its `.dig` text.
pub fn to_dig(task: &Task) -> String {
    DigPrinter::new().print(task)
}
