//! Key-equality filters for document lookups.
//!
//! A [`Filter`] is a conjunction of `path == value` clauses. Paths are sequences of keys so
//! that nested payload fields can be addressed without interpreting separator characters
//! inside user keys. A clause comparing against [`Bson::Null`] also matches documents where
//! the path is missing.
//!
//! ```ignore
//! use itemstore_core::query::Filter;
//!
//! let filter = Filter::eq("rev", 2_i64)
//!     .and_eq("item_id", bson::Bson::Null);
//! ```

use bson::Bson;

/// A single `path == value` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// The key path, outermost key first.
    pub path: Vec<String>,
    /// The value the path must equal.
    pub value: Bson,
}

impl Clause {
    /// The path joined with `.`, for diagnostics.
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// A conjunction of key-equality clauses. The empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter with a single top-level equality clause.
    pub fn eq(key: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new().and_eq(key, value)
    }

    /// Adds a top-level equality clause.
    pub fn and_eq(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.clauses.push(Clause {
            path: vec![key.into()],
            value: value.into(),
        });
        self
    }

    /// Adds every clause of `other` to this filter.
    pub fn and(mut self, other: Filter) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    /// Moves every clause below `prefix`, so `{s: "x"}` becomes `{prefix.s: "x"}`.
    pub fn nested(mut self, prefix: &str) -> Self {
        for clause in &mut self.clauses {
            clause.path.insert(0, prefix.to_string());
        }
        self
    }

    /// Returns the clauses of this filter.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Returns `true` if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_prefixes_every_clause() {
        let filter = Filter::eq("s", "x")
            .and_eq("i", 1_i64)
            .nested("data")
            .and_eq("item_id", Bson::Null);

        let paths: Vec<String> = filter
            .clauses()
            .iter()
            .map(Clause::dotted)
            .collect();

        assert_eq!(paths, vec!["data.s", "data.i", "item_id"]);
    }

    #[test]
    fn keys_with_dots_stay_single_segments() {
        let filter = Filter::eq("a.b", 1_i64).nested("data");

        assert_eq!(filter.clauses()[0].path, vec!["data".to_string(), "a.b".to_string()]);
    }
}
