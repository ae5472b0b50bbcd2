//! File reference extraction from schema-less patient documents.
//!
//! A file reference is the string value of any member literally named
//! `reference`, at any depth, inside objects or arrays.

use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Member name that carries a file reference.
pub const REFERENCE_KEY: &str = "reference";

/// Collect every string stored under a `reference` key anywhere in `document`.
///
/// Non-string `reference` values are ignored. Scalars are leaves and are never
/// descended into. The returned set is ordered so callers iterate it
/// deterministically.
pub fn extract_references(document: &JsonValue) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_references(document, &mut out);
    out
}

fn collect_references(value: &JsonValue, out: &mut BTreeSet<String>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                match child {
                    JsonValue::String(reference) if key == REFERENCE_KEY => {
                        out.insert(reference.clone());
                    }
                    JsonValue::Object(_) | JsonValue::Array(_) => collect_references(child, out),
                    _ => {}
                }
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

/// Base name of a stored reference.
///
/// Files are located by name only, so any directory part a reference carries
/// (with either separator style) is discarded. Whitespace is kept: it is part
/// of the file name on disk.
pub fn reference_basename(reference: &str) -> &str {
    reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(reference)
}
