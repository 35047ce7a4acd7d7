//! Filter translation to MongoDB query syntax.
//!
//! Each clause path is sanitized segment by segment and then joined with `.`, so a payload
//! key containing a dot addresses the escaped field rather than a nested one. MongoDB's
//! `$eq: null` also matches missing fields, which is the semantics [`Filter`] asks for.

use std::collections::HashSet;
use bson::{Bson, Document, doc};

use itemstore_core::query::{Clause, Filter};

use crate::sanitizer::KeySanitizer;


/// Translates key-equality filters into MongoDB query documents.
pub(crate) struct MongoFilterTranslator;

impl MongoFilterTranslator {
    pub(crate) fn translate(filter: &Filter) -> Document {
        let clauses: Vec<(String, Bson)> = filter
            .clauses()
            .iter()
            .map(|clause| (Self::field(clause), KeySanitizer::sanitize_value(&clause.value)))
            .collect();

        let mut seen = HashSet::new();
        if clauses.iter().all(|(field, _)| seen.insert(field.clone())) {
            clauses
                .into_iter()
                .map(|(field, value)| (field, Bson::Document(doc! { "$eq": value })))
                .collect()
        } else {
            doc! {
                "$and": clauses
                    .into_iter()
                    .map(|(field, value)| doc! { field: { "$eq": value } })
                    .collect::<Vec<_>>(),
            }
        }
    }

    /// A projection document including only `keys`.
    pub(crate) fn projection(keys: &[&str]) -> Document {
        keys.iter()
            .map(|key| (KeySanitizer::sanitize_key(key), Bson::Int32(1)))
            .collect()
    }

    fn field(clause: &Clause) -> String {
        clause
            .path
            .iter()
            .map(|segment| KeySanitizer::sanitize_key(segment))
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn translates_equality_clauses() {
        let id = ObjectId::new();
        let filter = Filter::eq("_id", id).and_eq("item_id", Bson::Null);

        assert_eq!(
            MongoFilterTranslator::translate(&filter),
            doc! {
                "_id": { "$eq": id },
                "item_id": { "$eq": Bson::Null },
            }
        );
    }

    #[test]
    fn escapes_each_path_segment() {
        let filter = Filter::eq("a.b", "x.y").nested("data");

        assert_eq!(
            MongoFilterTranslator::translate(&filter),
            doc! { "data.a%2Eb": { "$eq": "x.y" } }
        );
    }

    #[test]
    fn repeated_fields_are_conjoined() {
        let filter = Filter::eq("rev", 1_i64).and_eq("rev", 2_i64);

        assert_eq!(
            MongoFilterTranslator::translate(&filter),
            doc! {
                "$and": [
                    { "rev": { "$eq": 1_i64 } },
                    { "rev": { "$eq": 2_i64 } },
                ],
            }
        );
    }

    #[test]
    fn empty_filters_match_everything() {
        assert_eq!(MongoFilterTranslator::translate(&Filter::new()), doc! {});
    }

    #[test]
    fn projections_list_included_keys() {
        assert_eq!(
            MongoFilterTranslator::projection(&["_id", "rev"]),
            doc! { "_id": 1, "rev": 1 }
        );
    }
}
