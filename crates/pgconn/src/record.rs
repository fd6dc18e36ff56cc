//! Column/value data sets for INSERT, UPDATE and upsert helpers.

use crate::error::{ConnError, ConnResult};
use crate::ident::Ident;
use crate::value::Value;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// An ordered set of `column = value` pairs.
///
/// Column order is preserved and decides placeholder order in the generated SQL.
/// Setting an existing column replaces its value in place.
///
/// ```ignore
/// let user = Record::new()
///     .set("username", "alice")
///     .set("email", "alice@example.com")
///     .set("age", 31);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column (builder form).
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column in place, returning the previous value if the column existed.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((column, value));
                None
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(c, _)| c == column)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Keep only columns that exist in `table_columns`, reordered to match it.
    ///
    /// Keys are matched the way the server resolves them: `"UserName"` matches
    /// the column `username`, while a quoted key like `"\"UserName\""` only
    /// matches `UserName`. Keys that are not a single valid identifier are dropped.
    pub fn retain_columns(&mut self, table_columns: &[String]) {
        let mut remaining: HashMap<String, (String, Value)> = std::mem::take(&mut self.fields)
            .into_iter()
            .filter_map(|(key, value)| {
                let ident = Ident::parse(&key).ok()?;
                match ident.parts() {
                    [name] => Some((name.clone(), (key, value))),
                    _ => None,
                }
            })
            .collect();
        self.fields = table_columns
            .iter()
            .filter_map(|c| remaining.remove(c.as_str()))
            .collect();
    }

    /// Build from a JSON object. Any other JSON shape is a validation error.
    pub fn from_json(json: serde_json::Value) -> ConnResult<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(ConnError::validation(format!(
                "Record::from_json: expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Build from any serializable struct or map.
    ///
    /// Columns come out in `serde_json` map order (sorted by name). Nested
    /// structs, sequences and maps become JSON values.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> ConnResult<Self> {
        let json = serde_json::to_value(data)
            .map_err(|e| ConnError::validation(format!("Record::from_serialize: {e}")))?;
        Self::from_json(json)
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Record {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// Anything usable as the data argument of the CRUD helpers.
pub trait IntoRecord {
    fn into_record(self) -> ConnResult<Record>;
}

impl IntoRecord for Record {
    fn into_record(self) -> ConnResult<Record> {
        Ok(self)
    }
}

impl IntoRecord for &Record {
    fn into_record(self) -> ConnResult<Record> {
        Ok(self.clone())
    }
}

impl IntoRecord for serde_json::Value {
    fn into_record(self) -> ConnResult<Record> {
        Record::from_json(self)
    }
}

impl<K: Into<String>, V: Into<Value>> IntoRecord for BTreeMap<K, V> {
    fn into_record(self) -> ConnResult<Record> {
        Ok(self.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>> IntoRecord for Vec<(K, V)> {
    fn into_record(self) -> ConnResult<Record> {
        Ok(self.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> IntoRecord for [(K, V); N] {
    fn into_record(self) -> ConnResult<Record> {
        Ok(self.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_replaces_in_place() {
        let r = Record::new().set("a", 1).set("b", "x").set("a", 2);
        assert_eq!(r.columns().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(r.get("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn remove_and_contains() {
        let mut r = Record::new().set("a", 1).set("b", 2);
        assert_eq!(r.remove("a"), Some(Value::Int(1)));
        assert!(!r.contains("a"));
        assert!(r.contains("b"));
        assert_eq!(r.remove("zzz"), None);
    }

    #[test]
    fn retain_columns_filters_and_reorders() {
        let mut r = Record::new()
            .set("email", "e")
            .set("bogus", true)
            .set("id", 9);
        r.retain_columns(&["id".to_string(), "name".to_string(), "email".to_string()]);
        assert_eq!(r.columns().collect::<Vec<_>>(), vec!["id", "email"]);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn retain_columns_matches_folded_names() {
        let mut r = Record::new()
            .set("UserName", "alice")
            .set("\"Age\"", 3)
            .set("bad key", 1);
        r.retain_columns(&["username".to_string(), "age".to_string()]);
        // The quoted key keeps its case, so it does not match `age`.
        assert_eq!(r.columns().collect::<Vec<_>>(), vec!["UserName"]);
    }

    #[test]
    fn from_json_object() {
        let r = Record::from_json(json!({"name": "bob", "tags": ["a"], "age": null})).unwrap();
        assert_eq!(r.get("name"), Some(&Value::Text("bob".into())));
        assert_eq!(r.get("tags"), Some(&Value::Json(json!(["a"]))));
        assert_eq!(r.get("age"), Some(&Value::Null));
    }

    #[test]
    fn from_json_rejects_non_objects() {
        let err = Record::from_json(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn from_serialize_struct() {
        #[derive(Serialize)]
        struct User<'a> {
            id: Option<i64>,
            name: &'a str,
        }
        let r = Record::from_serialize(&User { id: None, name: "eve" }).unwrap();
        assert_eq!(r.get("id"), Some(&Value::Null));
        assert_eq!(r.get("name"), Some(&Value::Text("eve".into())));
    }

    #[test]
    fn into_record_from_pairs() {
        let r = [("a", Value::Int(1)), ("b", Value::Bool(true))]
            .into_record()
            .unwrap();
        assert_eq!(r.len(), 2);
        let m: BTreeMap<&str, i32> = [("x", 1)].into_iter().collect();
        assert_eq!(m.into_record().unwrap().get("x"), Some(&Value::Int(1)));
    }
}
