//! Conversation context
//!
//! Key/value facts extracted from the user over the lifetime of a session.
//! Values are restricted to a small closed set of kinds so that merge
//! semantics stay mechanically checkable: keys are only ever added or
//! overwritten, never removed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single context value.
///
/// Untagged so that `"Ana"`, `["EC2", "S3"]` and `3.5` all deserialize
/// directly from analyzer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Text(String),
    List(Vec<String>),
    Number(f64),
}

impl ContextValue {
    /// The value as text, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContextValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a string list, if it is one.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ContextValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Render the value for prompt-template substitution.
    pub fn render(&self) -> String {
        match self {
            ContextValue::Text(s) => s.clone(),
            ContextValue::List(items) => items.join(", "),
            ContextValue::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Text(s.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::Text(s)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(items: Vec<String>) -> Self {
        ContextValue::List(items)
    }
}

/// Accumulated session context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    entries: HashMap<String, ContextValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-overwrite merge. Existing keys keep their value unless
    /// `other` carries the same key; no key is ever removed.
    pub fn merge(&mut self, other: Context) {
        self.entries.extend(other.entries);
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    /// Text value for `key`, if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(ContextValue::as_text)
    }

    /// List value for `key`. A lone text value is not coerced.
    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).and_then(ContextValue::as_list)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, ContextValue)> for Context {
    fn from_iter<T: IntoIterator<Item = (String, ContextValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_but_never_removes() {
        let mut ctx = Context::new();
        ctx.set("name", "Ana");
        ctx.set("email", "a@x.com");

        let mut incoming = Context::new();
        incoming.set("name", "Ana Torres");

        let keys_before: Vec<String> = ctx.keys().cloned().collect();
        ctx.merge(incoming);

        for key in keys_before {
            assert!(ctx.contains_key(&key));
        }
        assert_eq!(ctx.text("name"), Some("Ana Torres"));
        assert_eq!(ctx.text("email"), Some("a@x.com"));
    }

    #[test]
    fn untagged_value_kinds_deserialize() {
        let json = r#"{"name":"Ana","productInterest":["EC2","S3"],"budget":250.5}"#;
        let ctx: Context = serde_json::from_str(json).unwrap();

        assert_eq!(ctx.text("name"), Some("Ana"));
        assert_eq!(
            ctx.list("productInterest"),
            Some(&["EC2".to_string(), "S3".to_string()][..])
        );
        assert_eq!(ctx.get("budget"), Some(&ContextValue::Number(250.5)));
    }

    #[test]
    fn render_joins_lists() {
        let value = ContextValue::List(vec!["EC2".into(), "RDS".into()]);
        assert_eq!(value.render(), "EC2, RDS");
    }
}
