//! Event payloads and their two wire forms
//!
//! A [`Payload`] maps attribute names to values that are either a single
//! string or a list of strings. Anything else is coerced on insert:
//! collections become lists with absent elements dropped, other values become
//! their canonical string form, and absent values are not inserted at all.
//!
//! Payloads serialize to a JSON object (the structured form, used on the wire
//! and for storage) and to a `key=value&key=value` percent-encoded string (the
//! legacy form, still accepted when reading older storage).

use std::borrow::Cow;
use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single payload value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A single string
    Scalar(String),
    /// An ordered list of strings
    List(Vec<String>),
}

impl Value {
    /// Returns the scalar string, if this is a scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// Returns the list elements, if this is a list
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::Scalar(_) => None,
            Value::List(items) => Some(items),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }
}

/// Conversion of arbitrary values into a payload [`Value`]
///
/// Returning `None` means the value is absent and the entry is dropped.
pub trait IntoValue {
    fn into_value(self) -> Option<Value>;
}

/// Conversion of one collection element into a list entry
///
/// Returning `None` drops the element while keeping the rest of the list.
pub trait ListElement {
    fn into_element(self) -> Option<String>;
}

impl IntoValue for Value {
    fn into_value(self) -> Option<Value> {
        Some(self)
    }
}

impl IntoValue for &Value {
    fn into_value(self) -> Option<Value> {
        Some(self.clone())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Option<Value> {
        self.and_then(IntoValue::into_value)
    }
}

impl<T: ListElement> IntoValue for Vec<T> {
    fn into_value(self) -> Option<Value> {
        Some(Value::List(
            self.into_iter().filter_map(ListElement::into_element).collect(),
        ))
    }
}

impl<T: ListElement, const N: usize> IntoValue for [T; N] {
    fn into_value(self) -> Option<Value> {
        Some(Value::List(
            self.into_iter().filter_map(ListElement::into_element).collect(),
        ))
    }
}

impl<T: ListElement + Clone> IntoValue for &[T] {
    fn into_value(self) -> Option<Value> {
        Some(Value::List(
            self.iter()
                .cloned()
                .filter_map(ListElement::into_element)
                .collect(),
        ))
    }
}

impl<T: ListElement> ListElement for Option<T> {
    fn into_element(self) -> Option<String> {
        self.and_then(ListElement::into_element)
    }
}

macro_rules! impl_display_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Option<Value> {
                    Some(Value::Scalar(self.to_string()))
                }
            }

            impl ListElement for $ty {
                fn into_element(self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

impl_display_values!(
    String, &str, &String, char, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64,
    u128, usize, f32, f64,
);

impl IntoValue for serde_json::Value {
    fn into_value(self) -> Option<Value> {
        match self {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Value::Scalar(s)),
            serde_json::Value::Array(items) => items.into_value(),
            other => Some(Value::Scalar(other.to_string())),
        }
    }
}

impl ListElement for serde_json::Value {
    fn into_element(self) -> Option<String> {
        match self {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

/// One event's attribute set
///
/// Keys are never empty and values are never absent; both rules are enforced
/// by [`Payload::put`], the only way entries get in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Payload {
    entries: BTreeMap<String, Value>,
}

impl Payload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, coercing it into a [`Value`]
    ///
    /// Empty keys and absent values are ignored. Returns the value previously
    /// stored under `key`, if any.
    pub fn put(&mut self, key: impl Into<String>, value: impl IntoValue) -> Option<Value> {
        let key = key.into();
        if key.is_empty() {
            return None;
        }
        let value = value.into_value()?;
        self.entries.insert(key, value)
    }

    /// Insert every entry of `source`, skipping empty keys and absent values
    pub fn put_all<I, K, V>(&mut self, source: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoValue,
    {
        for (key, value) in source {
            self.put(key, value);
        }
    }

    /// Overlay every entry of `other` onto this payload
    pub fn merge(&mut self, other: &Payload) {
        self.put_all(other.iter());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    /// Encode as a JSON object (the structured form)
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.entries)
            .map_err(|e| Error::Serialization(format!("error serializing payload to json: {}", e)))
    }

    /// Decode from a JSON object
    ///
    /// Values are coerced exactly as on [`Payload::put`], so numbers and
    /// booleans become strings and nulls are dropped.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            Error::Deserialization(format!("could not deserialize payload from json: {}", e))
        })?;

        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(Error::Deserialization(format!(
                "payload json must be an object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Encode as `key=value&key=value` (the legacy form)
    ///
    /// List elements are encoded one by one and joined with literal commas.
    pub fn to_percent_encoded(&self) -> Result<String> {
        let pairs: Vec<String> = self
            .entries
            .iter()
            .map(|(key, value)| {
                let encoded = match value {
                    Value::Scalar(s) => form_encode(s).into_owned(),
                    Value::List(items) => items
                        .iter()
                        .map(|item| form_encode(item))
                        .collect::<Vec<_>>()
                        .join(","),
                };
                format!("{}={}", form_encode(key), encoded)
            })
            .collect();

        Ok(pairs.join("&"))
    }

    /// Decode from the legacy `key=value&key=value` form
    ///
    /// A raw value containing a literal comma decodes to a list, anything else
    /// to a scalar. Lists of fewer than two elements therefore come back as
    /// scalars: `[x]` as `x`, and an empty list as the empty string.
    pub fn from_percent_encoded(text: &str) -> Result<Self> {
        let mut payload = Payload::new();

        for pair in text.split('&') {
            if pair.is_empty() {
                continue;
            }

            let mut parts = pair.split('=');
            let (Some(raw_key), Some(raw_value), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(Error::Deserialization(format!(
                    "keys and values must come in pairs in a percent encoded payload: {:?}",
                    pair
                )));
            };

            let key = form_decode(raw_key)?;
            if raw_value.contains(',') {
                let items = raw_value
                    .split(',')
                    .map(form_decode)
                    .collect::<Result<Vec<_>>>()?;
                payload.put(key, Value::List(items));
            } else {
                payload.put(key, form_decode(raw_value)?);
            }
        }

        Ok(payload)
    }
}

impl<K: Into<String>, V: IntoValue> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut payload = Payload::new();
        payload.put_all(iter);
        payload
    }
}

impl<K: Into<String>, V: IntoValue> Extend<(K, V)> for Payload {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.put_all(iter);
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Percent-encode with spaces as `+`
fn form_encode(raw: &str) -> Cow<'_, str> {
    let encoded = urlencoding::encode(raw);
    if encoded.contains("%20") {
        Cow::Owned(encoded.replace("%20", "+"))
    } else {
        encoded
    }
}

fn form_decode(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|e| Error::Deserialization(format!("could not percent-decode {:?}: {}", raw, e)))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
