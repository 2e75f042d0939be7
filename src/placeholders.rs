//! `{variable}` interpolation against submitted form values.

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid")
    })
}

/// Replaces every `{path}` in `template` with `resolver(path)`.
///
/// Text outside placeholders is copied verbatim; an unmatched `{` is left
/// alone.
pub fn interpolate<F>(template: &str, resolver: F) -> String
where
    F: Fn(&str) -> String,
{
    placeholder_regex()
        .replace_all(template, |caps: &Captures| resolver(&caps[1]))
        .into_owned()
}

/// Applies [`interpolate`] to every string inside `value`, recursing into
/// arrays and objects. Other scalars are returned unchanged.
pub fn replace_placeholders<F>(value: &Value, resolver: &F) -> Value
where
    F: Fn(&str) -> String,
{
    match value {
        Value::String(template) => Value::String(interpolate(template, resolver)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_placeholders(item, resolver))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, item)| (key.clone(), replace_placeholders(item, resolver)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Looks up a dotted property path (`address.city`) in `values`.
///
/// Strings are returned as is, other scalars in their JSON form, and
/// missing paths or `null` as the empty string. Numeric segments index
/// into arrays.
pub fn resolve_path(values: &Value, path: &str) -> String {
    let mut current = values;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(fields) => fields.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return String::new(),
        }
    }

    match current {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
