//! Inverted-index abstract handling.
//!
//! Abstracts arrive as `{"IndexLength": n, "InvertedIndex": {word: [positions]}}`
//! or as a bare `{word: [positions]}` map. They are either flattened to a
//! JSON string or rebuilt into plain text.

use super::AbstractEncoding;
use super::rules::Record;
use serde_json::{Map, Value};

/// Upper bound on rebuilt slots, relative to the positions actually listed.
const SLOTS_PER_POSITION: usize = 4;
/// Declared lengths up to this many slots are always honored.
const MIN_SLOT_CAP: usize = 1024;

pub(crate) fn apply(record: &mut Record, field: &str, encoding: AbstractEncoding) {
    match encoding {
        AbstractEncoding::Keep => {}
        AbstractEncoding::JsonString => {
            if let Some(v @ (Value::Object(_) | Value::Array(_))) = record.get_mut(field) {
                *v = Value::String(v.to_string());
            }
        }
        AbstractEncoding::PlainText => {
            let text = match record.get(field) {
                Some(Value::String(_)) => return,
                Some(Value::Object(obj)) => reconstruct(obj),
                _ => None,
            };
            record.insert(field.to_string(), text.map_or(Value::Null, Value::String));
        }
    }
}

/// Rebuild plain text from an inverted index.
///
/// Slots that no word claims stay empty, so they show up as adjacent spaces.
/// Returns `None` when the index is empty.
#[must_use]
pub fn reconstruct(abstract_data: &Map<String, Value>) -> Option<String> {
    let (index, declared_len) = match abstract_data.get("InvertedIndex") {
        Some(Value::Object(index)) => (
            index,
            abstract_data
                .get("IndexLength")
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok()),
        ),
        Some(_) => return None,
        None => (abstract_data, None),
    };
    if index.is_empty() {
        return None;
    }

    let positions = |v: &'_ Value| -> Vec<usize> {
        v.as_array()
            .map(|ps| {
                ps.iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|p| usize::try_from(p).ok())
                    .collect()
            })
            .unwrap_or_default()
    };

    // Lengths and positions come from the record; anything far past the
    // number of listed positions is malformed and skipped.
    let listed: usize = index.values().map(|v| positions(v).len()).sum();
    let cap = listed.saturating_mul(SLOTS_PER_POSITION).max(MIN_SLOT_CAP);

    let len = declared_len
        .unwrap_or_else(|| {
            index
                .values()
                .flat_map(|v| positions(v))
                .filter(|p| *p < cap)
                .max()
                .and_then(|p| p.checked_add(1))
                .unwrap_or(0)
        })
        .min(cap);

    let mut slots: Vec<Option<&str>> = vec![None; len];
    for (word, at) in index {
        for p in positions(at) {
            if p >= cap {
                continue;
            }
            if p >= slots.len()
                && let Some(grown) = p.checked_add(1)
            {
                slots.resize(grown, None);
            }
            slots[p] = Some(word.as_str());
        }
    }

    Some(
        slots
            .iter()
            .map(|w| w.unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn unfilled_slots_join_as_empty_tokens() {
        let data = obj(json!({
            "IndexLength": 5,
            "InvertedIndex": {"the": [0, 2], "fox": [1]}
        }));
        assert_eq!(reconstruct(&data).as_deref(), Some("the fox the  "));
    }

    #[test]
    fn bare_index_uses_highest_position() {
        let data = obj(json!({"quick": [1], "a": [0], "fox": [3]}));
        assert_eq!(reconstruct(&data).as_deref(), Some("a quick  fox"));
    }

    #[test]
    fn empty_index_is_absent() {
        let data = obj(json!({"IndexLength": 3, "InvertedIndex": {}}));
        assert_eq!(reconstruct(&data), None);
        assert_eq!(reconstruct(&Map::new()), None);
    }

    #[test]
    fn positions_past_declared_length_grow_the_text() {
        let data = obj(json!({"IndexLength": 1, "InvertedIndex": {"a": [0], "b": [2]}}));
        assert_eq!(reconstruct(&data).as_deref(), Some("a  b"));
    }

    #[test]
    fn oversized_index_length_is_clamped() {
        let data = obj(json!({
            "IndexLength": 4_611_686_018_427_387_904_u64,
            "InvertedIndex": {"a": [0]}
        }));
        let text = reconstruct(&data).unwrap();
        assert!(text.starts_with("a "));
        assert_eq!(text.split(' ').count(), MIN_SLOT_CAP);
    }

    #[test]
    fn out_of_range_positions_are_skipped() {
        let data = obj(json!({
            "IndexLength": 1,
            "InvertedIndex": {"a": [0], "b": [u64::MAX]}
        }));
        assert_eq!(reconstruct(&data).as_deref(), Some("a"));

        let bare = obj(json!({"a": [0], "b": [u64::MAX], "c": [1]}));
        assert_eq!(reconstruct(&bare).as_deref(), Some("a c"));
    }

    #[test]
    fn plain_text_survives_hostile_lengths() {
        let mut r = obj(json!({
            "abstract_inverted_index": {"IndexLength": u64::MAX, "InvertedIndex": {"x": [0]}}
        }));
        apply(&mut r, "abstract_inverted_index", AbstractEncoding::PlainText);
        assert!(r["abstract_inverted_index"].as_str().unwrap().starts_with('x'));
    }

    #[test]
    fn json_string_encoding_is_stable() {
        let mut r = obj(json!({"abstract_inverted_index": {"hi": [0]}}));
        apply(&mut r, "abstract_inverted_index", AbstractEncoding::JsonString);
        assert_eq!(r["abstract_inverted_index"], json!("{\"hi\":[0]}"));
        apply(&mut r, "abstract_inverted_index", AbstractEncoding::JsonString);
        assert_eq!(r["abstract_inverted_index"], json!("{\"hi\":[0]}"));
    }

    #[test]
    fn plain_text_marks_missing_abstract_as_null() {
        let mut r = obj(json!({"id": 1}));
        apply(&mut r, "abstract_inverted_index", AbstractEncoding::PlainText);
        assert_eq!(r["abstract_inverted_index"], Value::Null);
    }
}
