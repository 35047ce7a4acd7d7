//! Filter evaluation for in-memory documents.
//!
//! This module provides the matching engine behind both in-memory stores, deciding
//! whether a BSON document satisfies a key-equality [`Filter`].

use std::collections::HashMap;
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use itemstore_core::query::{Clause, Filter};


/// Type-erased, comparable representation of BSON values.
///
/// Integers are compared exactly. An integer equals a double only when the double holds
/// that same whole number, so `Int32(5)`, `Int64(5)` and `Double(5.0)` compare equal the
/// way a document database compares them.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (Int32 widened to i64)
    Integer(i64),
    /// Floating point value
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Object id value
    ObjectId(ObjectId),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Binary data and the other types that only equal themselves
    Opaque(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Integer(i64::from(*value)),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Opaque(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::Integer(a), Comparable::Number(b))
            | (Comparable::Number(b), Comparable::Integer(a)) => same_number(*a, *b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Opaque(a), Comparable::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

fn same_number(integer: i64, double: f64) -> bool {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    double.fract() == 0.0
        && double >= i64::MIN as f64
        && double < i64::MAX as f64
        && double as i64 == integer
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if every clause of `filter` holds for the document.
    pub fn matches(&self, filter: &Filter) -> bool {
        filter
            .clauses()
            .iter()
            .all(|clause| self.matches_clause(clause))
    }

    /// A null clause value also matches a missing path.
    fn matches_clause(&self, clause: &Clause) -> bool {
        match self.resolve(&clause.path) {
            Some(value) => Comparable::from(value) == Comparable::from(&clause.value),
            None => clause.value == Bson::Null,
        }
    }

    fn resolve(&self, path: &[String]) -> Option<&'a Bson> {
        let (last, parents) = path.split_last()?;
        let mut current = self.document;

        for key in parents {
            current = current.get_document(key).ok()?;
        }

        current.get(last)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Filter,
    ) -> impl Iterator<Item = &'a Document> {
        documents
            .into_iter()
            .filter(move |doc| DocumentEvaluator::new(doc).matches(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numbers_compare_across_widths() {
        let document = doc! { "rev": 2_i64 };

        assert!(DocumentEvaluator::new(&document).matches(&Filter::eq("rev", 2_i32)));
        assert!(!DocumentEvaluator::new(&document).matches(&Filter::eq("rev", 3_i64)));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let document = doc! { "i": 9_007_199_254_740_992_i64 };
        let evaluator = DocumentEvaluator::new(&document);

        assert!(evaluator.matches(&Filter::eq("i", 9_007_199_254_740_992_i64)));
        assert!(!evaluator.matches(&Filter::eq("i", 9_007_199_254_740_993_i64)));
        assert!(evaluator.matches(&Filter::eq("i", 9_007_199_254_740_992.0_f64)));
        assert!(!DocumentEvaluator::new(&doc! { "i": 5_i64 }).matches(&Filter::eq("i", 5.5_f64)));
        assert!(!DocumentEvaluator::new(&doc! { "i": i64::MAX }).matches(&Filter::eq("i", i64::MAX as f64)));
    }

    #[test]
    fn null_matches_missing_paths() {
        let document = doc! { "_id": ObjectId::new() };

        assert!(DocumentEvaluator::new(&document).matches(&Filter::eq("item_id", Bson::Null)));
        assert!(!DocumentEvaluator::new(&document).matches(&Filter::eq("item_id", ObjectId::new())));
    }

    #[test]
    fn nested_paths_resolve_segment_by_segment() {
        let document = doc! { "data": { "s": "x", "a.b": 1 } };

        assert!(DocumentEvaluator::new(&document).matches(&Filter::eq("s", "x").nested("data")));
        assert!(DocumentEvaluator::new(&document).matches(&Filter::eq("a.b", 1).nested("data")));
        assert!(!DocumentEvaluator::new(&document).matches(&Filter::eq("s", "y").nested("data")));
    }

    #[test]
    fn empty_filters_match_everything() {
        let documents = [doc! { "a": 1 }, doc! { "b": 2 }];

        assert_eq!(DocumentEvaluator::filter_documents(&documents, &Filter::new()).count(), 2);
    }
}
