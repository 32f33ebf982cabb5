//! Query builder for `select … from …` statements.
//!
//! Every generator in this crate assembles its SQL through [`build_query()`].
//! The builder never parses fragments; it only lays them out following a
//! fixed set of textual conventions:
//!
//! - two-space indentation for every nested level
//! - select items joined by leading commas on continuation lines
//! - `\n;\n` after a complete top-level statement
//! - a `-- DIGDAG_INSERT_LINE` marker between a `with` block and its `select`,
//!   where digdag inserts its own lines at execution time
//!
//! # Examples
//!
//! ```
//! use molehill::query::build_query;
//!
//! let query = build_query(&["col1 as a", "col2 as b"], "sample_datasets", None, false, None).unwrap();
//! assert_eq!(query, "select\n  col1 as a\n  , col2 as b\nfrom\n  sample_datasets\n;\n");
//! ```

use indexmap::IndexMap;

use crate::error::{GenError, Result};

/// Marker line placed right after a rendered `with` block.
pub const DIGDAG_INSERT_LINE: &str = "-- DIGDAG_INSERT_LINE";

/// Named CTE bodies, kept in insertion order.
///
/// Each body may only reference names inserted before it, so insertion order
/// is also the order the `with` block is rendered in. Re-inserting a name
/// replaces its body but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithClauses {
    clauses: IndexMap<String, String>,
}

impl WithClauses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.clauses.insert(name.into(), body.into());
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(name, body);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.clauses.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn render(&self) -> String {
        let blocks: Vec<String> = self
            .clauses
            .iter()
            .map(|(name, body)| format!("{} as (\n{}\n)", name, indent(body, "  ")))
            .collect();
        format!("with {}\n{}\n", blocks.join(",\n"), DIGDAG_INSERT_LINE)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WithClauses {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut clauses = WithClauses::new();
        for (name, body) in iter {
            clauses.insert(name, body);
        }
        clauses
    }
}

/// Query builder configuration.
///
/// A builder with a version stamps complete statements with a
/// `-- molehill/<version>` header line. The default builder has no version and
/// is what [`build_query()`] uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    version: Option<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        QueryBuilder {
            version: Some(version.into()),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Builds a single statement.
    ///
    /// `with_clauses` always force the terminator, even when
    /// `without_semicolon` is requested.
    pub fn build<S: AsRef<str>>(
        &self,
        select_clauses: &[S],
        source: &str,
        condition: Option<&str>,
        without_semicolon: bool,
        with_clauses: Option<&WithClauses>,
    ) -> Result<String> {
        if select_clauses.is_empty() {
            return Err(GenError::InvalidInput(
                "select_clauses must be a non-empty list of str".to_string(),
            ));
        }

        let with_clauses = with_clauses.filter(|w| !w.is_empty());
        let terminate = !without_semicolon || with_clauses.is_some();

        let mut query = String::new();
        if let Some(clauses) = with_clauses {
            query.push_str(&clauses.render());
        }

        let selects: Vec<&str> = select_clauses.iter().map(AsRef::as_ref).collect();
        query.push_str("select\n");
        query.push_str(&indent(&selects.join("\n, "), "  "));
        query.push_str("\nfrom\n");
        query.push_str(&indent(source, "  "));

        if let Some(cond) = condition.filter(|c| !c.is_empty()) {
            query.push('\n');
            query.push_str(cond);
        }

        if terminate {
            query.push_str("\n;\n");
            Ok(self.stamp(&query))
        } else {
            Ok(query)
        }
    }

    /// Prefix a complete statement with the version header, if configured.
    pub fn stamp(&self, query: &str) -> String {
        match &self.version {
            Some(version) => format!("-- molehill/{}\n{}", version, query),
            None => query.to_string(),
        }
    }
}

/// Build a query with the default (unversioned) builder.
///
/// See [`QueryBuilder::build`].
pub fn build_query<S: AsRef<str>>(
    select_clauses: &[S],
    source: &str,
    condition: Option<&str>,
    without_semicolon: bool,
    with_clauses: Option<&WithClauses>,
) -> Result<String> {
    QueryBuilder::default().build(select_clauses, source, condition, without_semicolon, with_clauses)
}

/// Prefix every non-blank line of `text` with `prefix`.
pub fn indent(text: &str, prefix: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect()
}
