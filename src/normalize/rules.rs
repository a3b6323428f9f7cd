//! Individual normalization rules.
//!
//! Each rule mutates one record in place and is idempotent on its own: a field
//! it has already repaired no longer matches the condition that triggers it.

use super::AbstractEncoding;
use super::abstracts;
use serde_json::{Map, Value};

/// One record type.
pub type Record = Map<String, Value>;

/// A single normalization step.
#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    /// Absent, null or `[]` becomes `[placeholder]`.
    FillEmpty { field: String, placeholder: Value },
    /// Absent or null becomes `placeholder`.
    FillMissing { field: String, placeholder: Value },
    /// A lone value becomes a one-element array; absent, null or `[]` becomes
    /// `[placeholder]`.
    WrapSingle { field: String, placeholder: Value },
    /// Absent or null becomes `[]`.
    EmptyIfNull { fields: Vec<String> },
    /// `source.issn: null` becomes `[]` on the object (or every element of the
    /// array) held in `field`.
    SourceIssn { field: String },
    /// Repairs per-author collections.
    Authorships { field: String, institution: Value },
    /// Removes `field` once `replacement` is populated.
    DropSuperseded { field: String, replacement: String },
    /// Removes `field` unconditionally.
    DropField { field: String },
    /// Rewrites `-` to `_` in every object key, recursively.
    RenameHyphenKeys,
    /// Null top-level arrays in `fields` become `[]`; null array elements are
    /// stripped everywhere.
    NullArrays { fields: Vec<String> },
    /// Re-encodes an inverted-index abstract.
    Abstract {
        field: String,
        encoding: AbstractEncoding,
    },
}

impl Rule {
    pub fn fill_empty(field: impl Into<String>, placeholder: Value) -> Self {
        Self::FillEmpty {
            field: field.into(),
            placeholder,
        }
    }

    pub fn fill_missing(field: impl Into<String>, placeholder: Value) -> Self {
        Self::FillMissing {
            field: field.into(),
            placeholder,
        }
    }

    /// Apply this rule to `record`.
    pub fn apply(&self, record: &mut Record) {
        match self {
            Self::FillEmpty { field, placeholder } => {
                if is_empty_collection(record.get(field)) {
                    record.insert(field.clone(), Value::Array(vec![placeholder.clone()]));
                }
            }
            Self::FillMissing { field, placeholder } => {
                if is_null_or_absent(record.get(field)) {
                    record.insert(field.clone(), placeholder.clone());
                }
            }
            Self::WrapSingle { field, placeholder } => {
                let wrapped = match record.get_mut(field).map(Value::take) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => items,
                    Some(single) => vec![single],
                };
                let wrapped = if wrapped.is_empty() {
                    vec![placeholder.clone()]
                } else {
                    wrapped
                };
                record.insert(field.clone(), Value::Array(wrapped));
            }
            Self::EmptyIfNull { fields } => {
                for field in fields {
                    empty_if_null(record, field);
                }
            }
            Self::SourceIssn { field } => match record.get_mut(field) {
                Some(Value::Array(items)) => items.iter_mut().for_each(fix_source_issn),
                Some(obj @ Value::Object(_)) => fix_source_issn(obj),
                _ => {}
            },
            Self::Authorships { field, institution } => {
                fix_authorships(record, field, institution);
            }
            Self::DropSuperseded { field, replacement } => {
                if !is_null_or_absent(record.get(replacement)) {
                    record.shift_remove(field);
                }
            }
            Self::DropField { field } => {
                record.shift_remove(field);
            }
            Self::RenameHyphenKeys => {
                let renamed = rename_hyphen_keys(Value::Object(std::mem::take(record)));
                if let Value::Object(map) = renamed {
                    *record = map;
                }
            }
            Self::NullArrays { fields } => fix_null_arrays(record, fields),
            Self::Abstract { field, encoding } => abstracts::apply(record, field, *encoding),
        }
    }
}

fn is_null_or_absent(v: Option<&Value>) -> bool {
    matches!(v, None | Some(Value::Null))
}

fn is_empty_collection(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn empty_if_null(obj: &mut Record, field: &str) {
    if is_null_or_absent(obj.get(field)) {
        obj.insert(field.to_string(), Value::Array(Vec::new()));
    }
}

fn fix_source_issn(location: &mut Value) {
    if let Some(source) = location.get_mut("source").and_then(Value::as_object_mut)
        && matches!(source.get("issn"), Some(Value::Null))
    {
        source.insert("issn".to_string(), Value::Array(Vec::new()));
    }
}

fn fix_authorships(record: &mut Record, field: &str, institution: &Value) {
    if is_null_or_absent(record.get(field)) {
        record.insert(field.to_string(), Value::Array(Vec::new()));
        return;
    }
    let Some(Value::Array(authors)) = record.get_mut(field) else {
        return;
    };

    for author in authors.iter_mut().filter_map(Value::as_object_mut) {
        if is_empty_collection(author.get("institutions")) {
            author.insert(
                "institutions".to_string(),
                Value::Array(vec![institution.clone()]),
            );
        }
        if let Some(Value::Array(insts)) = author.get_mut("institutions") {
            for inst in insts.iter_mut().filter_map(Value::as_object_mut) {
                empty_if_null(inst, "lineage");
            }
        }
        if let Some(Value::Array(affs)) = author.get_mut("affiliations") {
            for aff in affs.iter_mut().filter_map(Value::as_object_mut) {
                empty_if_null(aff, "institution_ids");
            }
        }
        empty_if_null(author, "countries");
        empty_if_null(author, "raw_affiliation_strings");
    }
}

fn rename_hyphen_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let key = if k.contains('-') { k.replace('-', "_") } else { k };
                out.insert(key, rename_hyphen_keys(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(rename_hyphen_keys).collect()),
        other => other,
    }
}

fn fix_null_arrays(record: &mut Record, fields: &[String]) {
    for (k, v) in record.iter_mut() {
        if v.is_null() && fields.iter().any(|f| f == k) {
            *v = Value::Array(Vec::new());
        } else {
            strip_null_elements(v);
        }
    }
}

fn strip_null_elements(value: &mut Value) {
    match value {
        Value::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(strip_null_elements);
        }
        Value::Object(map) => map.values_mut().for_each(strip_null_elements),
        _ => {}
    }
}
