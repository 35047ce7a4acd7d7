//! Document key sanitization for MongoDB compatibility.
//!
//! MongoDB restricts field names (keys) from containing certain characters like dots and
//! dollar signs, which are used in MongoDB query syntax. Payload keys come from record
//! shapes and may contain them, so every key is escaped on the way in and restored on the
//! way out. Values are stored unchanged.

use bson::{Bson, Document};


/// Sanitizes and restores document keys to handle MongoDB field name restrictions.
///
/// MongoDB does not allow field names (document keys) to contain:
/// - Dots (`.`) - used for nested field access in queries
/// - Dollar signs (`$`) - used for operators in queries
/// - Null bytes (`\0`) - field name terminators
///
/// Each of them is percent-escaped. `%` is escaped as well, so every key restores to
/// exactly the key that was written.
pub(crate) struct KeySanitizer;

impl KeySanitizer {
    /// Escaped characters and their escape codes
    const ESCAPES: [(char, &'static str); 4] = [
        ('%', "25"),
        ('.', "2E"),
        ('$', "24"),
        ('\0', "00"),
    ];

    /// Recursively sanitizes the keys of a document, including documents nested in arrays.
    pub(crate) fn sanitize_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (Self::sanitize_key(k), Self::sanitize_value(v)))
            .collect()
    }

    /// Sanitizes the keys inside a value. Scalars are returned as-is.
    pub(crate) fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::sanitize_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(Self::sanitize_document(doc)),
            _ => value.clone(),
        }
    }

    /// Replaces problematic characters in a key with their escape codes.
    pub(crate) fn sanitize_key(input: &str) -> String {
        let mut sanitized = String::with_capacity(input.len());
        for ch in input.chars() {
            match Self::ESCAPES.iter().find(|(target, _)| *target == ch) {
                Some((_, code)) => {
                    sanitized.push('%');
                    sanitized.push_str(code);
                }
                None => sanitized.push(ch),
            }
        }
        sanitized
    }

    /// Recursively restores the keys of a document read from MongoDB.
    ///
    /// This is the inverse of [`sanitize_document`](Self::sanitize_document).
    pub(crate) fn restore_document(document: Document) -> Document {
        document
            .into_iter()
            .map(|(k, v)| (Self::restore_key(&k), Self::restore_value(v)))
            .collect()
    }

    fn restore_value(value: Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(
                arr
                    .into_iter()
                    .map(Self::restore_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(Self::restore_document(doc)),
            other => other,
        }
    }

    /// Reverts the escapes of [`sanitize_key`](Self::sanitize_key).
    ///
    /// A `%` that does not start a known escape code is kept as written.
    pub(crate) fn restore_key(input: &str) -> String {
        let mut restored = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(at) = rest.find('%') {
            restored.push_str(&rest[..at]);
            rest = &rest[at..];

            let escaped = Self::ESCAPES
                .iter()
                .find(|(_, code)| rest[1..].starts_with(code));
            match escaped {
                Some((target, code)) => {
                    restored.push(*target);
                    rest = &rest[1 + code.len()..];
                }
                None => {
                    restored.push('%');
                    rest = &rest[1..];
                }
            }
        }

        restored.push_str(rest);
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn escapes_keys_but_not_values() {
        let document = doc! {
            "data": { "a.b": "x.y", "$c": [ { "d\01": 1 } ] },
        };

        let sanitized = KeySanitizer::sanitize_document(&document);

        assert_eq!(
            sanitized,
            doc! {
                "data": { "a%2Eb": "x.y", "%24c": [ { "d%001": 1 } ] },
            }
        );
        assert_eq!(KeySanitizer::restore_document(sanitized), document);
    }

    #[test]
    fn header_keys_pass_through() {
        for key in ["_id", "rev", "item_id", "ts", "author", "data"] {
            assert_eq!(KeySanitizer::sanitize_key(key), key);
        }
    }

    #[test]
    fn keys_that_look_escaped_restore_unchanged() {
        for key in ["a__dot__b", "__dollar__", "50%", "%2E", "%%24", "x.%y$"] {
            let sanitized = KeySanitizer::sanitize_key(key);

            assert!(!sanitized.contains('.') && !sanitized.contains('$'));
            assert_eq!(KeySanitizer::restore_key(&sanitized), key);
        }
    }
}
