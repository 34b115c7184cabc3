//! Iteration-scoped variable store
//!
//! The host reads variables to build requests; the distributor, the
//! credential cache and the correlation engine write them. Absence is a value
//! of its own: a variable that was deliberately left empty reads as
//! [`Value::Absent`], exactly like one that was never written.

use serde_json::{Map, Number, Value as Json};
use std::collections::BTreeMap;

static ABSENT: Value = Value::Absent;

/// A single variable value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Absent,
    String(String),
    Number(Number),
    Bool(bool),
    /// Arrays and objects, kept as captured
    Structured(Json),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// String view for request templating; structured values render as JSON
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Absent => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Structured(json) => Some(json.to_string()),
        }
    }

    /// Interpret as a non-negative array index. Numeric strings count.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) => n.as_u64().and_then(|v| usize::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// JSON rendering; absent becomes `null`
    pub fn to_json(&self) -> Json {
        match self {
            Value::Absent => Json::Null,
            Value::String(s) => Json::String(s.clone()),
            Value::Number(n) => Json::Number(n.clone()),
            Value::Bool(b) => Json::Bool(*b),
            Value::Structured(json) => json.clone(),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Absent,
            Json::String(s) => Value::String(s),
            Json::Number(n) => Value::Number(n),
            Json::Bool(b) => Value::Bool(b),
            other => Value::Structured(other),
        }
    }
}

impl From<&Json> for Value {
    fn from(json: &Json) -> Self {
        Value::from(json.clone())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(Number::from(n as u64))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Absent)
    }
}

/// Variables of one iteration, ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    values: BTreeMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a variable; unknown names read as absent
    pub fn get(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&ABSENT)
    }

    /// Write a variable, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Mark a variable as deliberately empty
    pub fn set_absent(&mut self, name: impl Into<String>) {
        self.values.insert(name.into(), Value::Absent);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// True when the variable holds something other than absent
    pub fn has_value(&self, name: &str) -> bool {
        !self.get(name).is_absent()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Render every written variable as a JSON object
    pub fn to_json(&self) -> Json {
        let map: Map<String, Json> = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Json::Object(map)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_variable_reads_absent() {
        let vars = VariableStore::new();
        assert!(vars.get("missing").is_absent());
        assert!(!vars.has_value("missing"));
    }

    #[test]
    fn test_json_null_maps_to_absent() {
        let mut vars = VariableStore::new();
        vars.set("postId", json!(null));
        assert!(vars.get("postId").is_absent());
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_structured_values_keep_shape() {
        let mut vars = VariableStore::new();
        vars.set("comments", json!(["a", "b"]));
        assert_eq!(vars.get("comments"), &Value::Structured(json!(["a", "b"])));
        assert_eq!(vars.get("comments").as_text().unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_index_interpretation() {
        assert_eq!(Value::from(2usize).as_index(), Some(2));
        assert_eq!(Value::from("4").as_index(), Some(4));
        assert_eq!(Value::from(json!(-1)).as_index(), None);
        assert_eq!(Value::from(json!(1.5)).as_index(), None);
        assert_eq!(Value::Absent.as_index(), None);
    }

    #[test]
    fn test_to_json_renders_absent_as_null() {
        let mut vars = VariableStore::new();
        vars.set("user", "alice");
        vars.set_absent("token");
        assert_eq!(vars.to_json(), json!({"token": null, "user": "alice"}));
    }
}
