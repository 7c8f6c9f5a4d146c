//! Conversions between host values and the plain Rust types wrappers expose.

use vimlink_rpc::Value;

pub(crate) fn map<K: Into<Value>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

pub(crate) fn empty_map() -> Value {
    Value::Map(Vec::new())
}

pub(crate) fn into_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => s.into_str(),
        _ => None,
    }
}

/// Vim reports booleans as `v:true`/`v:false` or as 0/1 depending on the API.
pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        other => other.as_i64().map(|n| n != 0),
    }
}

pub(crate) fn into_strings(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(into_string).collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn strings(lines: &[String]) -> Value {
    Value::Array(lines.iter().map(|l| Value::from(l.as_str())).collect())
}

/// Look up `key` in a msgpack map.
pub(crate) fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .as_map()?
        .iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bools_accept_integers() {
        assert_eq!(as_bool(&Value::from(true)), Some(true));
        assert_eq!(as_bool(&Value::from(0)), Some(false));
        assert_eq!(as_bool(&Value::from(1)), Some(true));
        assert_eq!(as_bool(&Value::from("yes")), None);
    }

    #[test]
    fn map_lookup_by_string_key() {
        let value = map([("output", Value::from("hi")), ("other", Value::Nil)]);
        assert_eq!(get(&value, "output").and_then(Value::as_str), Some("hi"));
        assert!(get(&value, "missing").is_none());
        assert!(get(&Value::from(3), "output").is_none());
    }

    #[test]
    fn string_arrays_skip_non_strings() {
        let value = Value::Array(vec![Value::from("a"), Value::from(1), Value::from("b")]);
        assert_eq!(into_strings(value), vec!["a", "b"]);
    }
}
