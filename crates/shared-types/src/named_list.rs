//! # Named List
//!
//! Ordered list of `(name, value)` pairs. Names may repeat and insertion
//! order is preserved, which is what distinguishes it from a map.
//!
//! Used for plugin init args, admin/handler responses and persisted
//! settings documents.

use serde::{Deserialize, Serialize};

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(NamedList),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_named_list(&self) -> Option<&NamedList> {
        match self {
            Self::Map(nl) => Some(nl),
            _ => None,
        }
    }

    /// Convert into a plain JSON value (names become object keys, later
    /// duplicates win). Used for HTTP responses.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Map(nl) => nl.to_json(),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<NamedList> for Value {
    fn from(v: NamedList) -> Self {
        Self::Map(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

/// One entry of a [`NamedList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub value: Value,
}

/// Ordered named-property document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedList {
    entries: Vec<Entry>,
}

impl NamedList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping any earlier entry with the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.push(Entry {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Builder-style [`NamedList::add`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(name, value);
        self
    }

    /// Replace the first entry with this name, or append if absent.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.value = value,
            None => self.entries.push(Entry {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// First value with this name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    /// All values with this name, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.name == name)
            .map(|e| &e.value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Remove every entry with this name, returning the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let first = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .map(|idx| self.entries[idx].value.clone());
        self.entries.retain(|e| e.name != name);
        first
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|e| (e.name.as_str(), &e.value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Flatten to a plain JSON object for HTTP responses.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for entry in &self.entries {
            map.insert(entry.name.clone(), entry.value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for NamedList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut list = NamedList::new();
        for (name, value) in iter {
            list.add(name, value);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_order_and_duplicates() {
        let mut list = NamedList::new();
        list.add("b", 1).add("a", "x").add("b", 2);

        let names: Vec<_> = list.names().collect();
        assert_eq!(names, vec!["b", "a", "b"]);
        assert_eq!(list.get_i64("b"), Some(1));
        assert_eq!(list.get_all("b").count(), 2);
    }

    #[test]
    fn test_set_replaces_first() {
        let mut list = NamedList::new().with("theme", "dark").with("theme", "light");
        list.set("theme", "blue");
        assert_eq!(list.get_str("theme"), Some("blue"));
        assert_eq!(list.len(), 2);

        list.set("lang", "en");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove_all_with_name() {
        let mut list = NamedList::new().with("a", 1).with("b", 2).with("a", 3);
        assert_eq!(list.remove("a"), Some(Value::Int(1)));
        assert_eq!(list.len(), 1);
        assert!(list.remove("missing").is_none());
    }

    #[test]
    fn test_to_json_flattens() {
        let list = NamedList::new().with("status", "OK").with("count", 3);
        let json = list.to_json();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["count"], 3);
    }
}
