//! Three-state attribute values and typed access to attribute trees.
//!
//! The host sends configuration, plans and state as JSON trees in which a
//! value may be known, null or not yet known. Unknown values are encoded as
//! the [`UNKNOWN_VALUE`] sentinel string. Mappers read and write these
//! trees through [`ObjectReader`] and [`ObjectWriter`], which never hand an
//! unknown value out as data.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Sentinel the host uses for values that are not known until apply.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// Whether a JSON value is the unknown sentinel.
pub fn is_unknown(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == UNKNOWN_VALUE)
}

/// The unknown sentinel as a JSON value.
pub fn unknown() -> Value {
    Value::String(UNKNOWN_VALUE.to_string())
}

/// A value as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue<T> {
    /// The value is known.
    Known(T),
    /// The value is computed later.
    Unknown,
    /// The value is absent.
    Null,
}

impl<T> AttrValue<T> {
    /// `Some` for a known value, `None` for null and unknown.
    pub fn into_option(self) -> Option<T> {
        match self {
            AttrValue::Known(v) => Some(v),
            AttrValue::Unknown | AttrValue::Null => None,
        }
    }

    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, AttrValue::Unknown)
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Map the known value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AttrValue<U> {
        match self {
            AttrValue::Known(v) => AttrValue::Known(f(v)),
            AttrValue::Unknown => AttrValue::Unknown,
            AttrValue::Null => AttrValue::Null,
        }
    }
}

impl<T> From<Option<T>> for AttrValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => AttrValue::Known(v),
            None => AttrValue::Null,
        }
    }
}

impl<T: Into<Value>> From<AttrValue<T>> for Value {
    fn from(value: AttrValue<T>) -> Self {
        match value {
            AttrValue::Known(v) => v.into(),
            AttrValue::Unknown => unknown(),
            AttrValue::Null => Value::Null,
        }
    }
}

/// Conversion of a known, non-null JSON value into a Rust value.
pub trait FromAttribute: Sized {
    /// Convert `value`; `path` is used in error messages.
    fn from_attribute(value: &Value, path: &str) -> Result<Self, ProviderError>;
}

fn type_mismatch(path: &str, expected: &str, value: &Value) -> ProviderError {
    ProviderError::attribute(path, format!("expected {}, got {}", expected, value))
}

impl FromAttribute for String {
    fn from_attribute(value: &Value, path: &str) -> Result<Self, ProviderError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| type_mismatch(path, "string", value))
    }
}

impl FromAttribute for bool {
    fn from_attribute(value: &Value, path: &str) -> Result<Self, ProviderError> {
        value
            .as_bool()
            .ok_or_else(|| type_mismatch(path, "bool", value))
    }
}

impl FromAttribute for i64 {
    fn from_attribute(value: &Value, path: &str) -> Result<Self, ProviderError> {
        if let Some(n) = value.as_i64() {
            return Ok(n);
        }
        match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Ok(f as i64)
            },
            Some(f) => Err(ProviderError::attribute(
                path,
                format!("{} is not representable as a 64-bit integer", f),
            )),
            None => Err(type_mismatch(path, "number", value)),
        }
    }
}

impl FromAttribute for i32 {
    fn from_attribute(value: &Value, path: &str) -> Result<Self, ProviderError> {
        let n = i64::from_attribute(value, path)?;
        i32::try_from(n).map_err(|_| {
            ProviderError::attribute(path, format!("{} is out of range for a 32-bit integer", n))
        })
    }
}

impl FromAttribute for f64 {
    fn from_attribute(value: &Value, path: &str) -> Result<Self, ProviderError> {
        value
            .as_f64()
            .ok_or_else(|| type_mismatch(path, "number", value))
    }
}

impl FromAttribute for Value {
    fn from_attribute(value: &Value, _path: &str) -> Result<Self, ProviderError> {
        Ok(value.clone())
    }
}

impl<T: FromAttribute> FromAttribute for Vec<T> {
    fn from_attribute(value: &Value, path: &str) -> Result<Self, ProviderError> {
        let items = value
            .as_array()
            .ok_or_else(|| type_mismatch(path, "list", value))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let item_path = format!("{}.{}", path, i);
                if is_unknown(item) || item.is_null() {
                    return Err(ProviderError::attribute(item_path, "element is not known"));
                }
                T::from_attribute(item, &item_path)
            })
            .collect()
    }
}

impl<T: FromAttribute> FromAttribute for BTreeMap<String, T> {
    fn from_attribute(value: &Value, path: &str) -> Result<Self, ProviderError> {
        let entries = value
            .as_object()
            .ok_or_else(|| type_mismatch(path, "map", value))?;
        entries
            .iter()
            .map(|(key, item)| {
                let item_path = format!("{}.{}", path, key);
                if is_unknown(item) {
                    return Err(ProviderError::attribute(item_path, "element is not known"));
                }
                Ok((key.clone(), T::from_attribute(item, &item_path)?))
            })
            .collect()
    }
}

/// Read a possibly absent value into its three-state form.
pub fn read_attr<T: FromAttribute>(
    value: Option<&Value>,
    path: &str,
) -> Result<AttrValue<T>, ProviderError> {
    match value {
        None | Some(Value::Null) => Ok(AttrValue::Null),
        Some(v) if is_unknown(v) => Ok(AttrValue::Unknown),
        Some(v) => T::from_attribute(v, path).map(AttrValue::Known),
    }
}

/// Typed read access to an object of an attribute tree.
#[derive(Debug, Clone)]
pub struct ObjectReader<'a> {
    map: Option<&'a Map<String, Value>>,
    path: String,
}

impl<'a> ObjectReader<'a> {
    /// Read the root object; null reads as an empty object.
    pub fn new(value: &'a Value) -> Result<Self, ProviderError> {
        Self::at(value, String::new())
    }

    fn at(value: &'a Value, path: String) -> Result<Self, ProviderError> {
        match value {
            Value::Object(map) => Ok(Self {
                map: Some(map),
                path,
            }),
            Value::Null => Ok(Self { map: None, path }),
            other => Err(ProviderError::attribute(
                if path.is_empty() { "<root>".to_string() } else { path },
                format!("expected object, got {}", other),
            )),
        }
    }

    /// Dotted path of a child attribute.
    pub fn path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    /// The raw JSON of an attribute.
    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(name))
    }

    /// Read an attribute in its three-state form.
    pub fn get<T: FromAttribute>(&self, name: &str) -> Result<AttrValue<T>, ProviderError> {
        read_attr(self.raw(name), &self.path(name))
    }

    /// Read an attribute; null and unknown read as `None`.
    pub fn optional<T: FromAttribute>(&self, name: &str) -> Result<Option<T>, ProviderError> {
        Ok(self.get(name)?.into_option())
    }

    /// Read an attribute that must be known and non-null.
    pub fn required<T: FromAttribute>(&self, name: &str) -> Result<T, ProviderError> {
        match self.get(name)? {
            AttrValue::Known(v) => Ok(v),
            AttrValue::Null => Err(ProviderError::attribute(
                self.path(name),
                "a value is required",
            )),
            AttrValue::Unknown => Err(ProviderError::attribute(
                self.path(name),
                "value is not known yet",
            )),
        }
    }

    /// Read a single nested block.
    ///
    /// A block is either an object or a list holding at most one object.
    pub fn nested(&self, name: &str) -> Result<Option<ObjectReader<'a>>, ProviderError> {
        let path = self.path(name);
        match self.raw(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) if is_unknown(v) => Ok(None),
            Some(Value::Array(items)) => match items.as_slice() {
                [] => Ok(None),
                [item] => Ok(Some(Self::at(item, format!("{}.0", path))?)),
                _ => Err(ProviderError::attribute(
                    path,
                    format!("at most one block allowed, got {}", items.len()),
                )),
            },
            Some(v) => Ok(Some(Self::at(v, path)?)),
        }
    }

    /// Read a list or set of nested blocks.
    pub fn nested_list(&self, name: &str) -> Result<Vec<ObjectReader<'a>>, ProviderError> {
        let path = self.path(name);
        match self.raw(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(v) if is_unknown(v) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::at(item, format!("{}.{}", path, i)))
                .collect(),
            Some(other) => Err(ProviderError::attribute(
                path,
                format!("expected list of blocks, got {}", other),
            )),
        }
    }
}

/// Builder of an object of an attribute tree.
#[derive(Debug, Clone, Default)]
pub struct ObjectWriter {
    map: Map<String, Value>,
}

impl ObjectWriter {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute; `None` becomes null.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.map.insert(name.to_string(), value.into());
        self
    }

    /// Set an attribute from its three-state form.
    pub fn set_attr<T: Into<Value>>(self, name: &str, value: AttrValue<T>) -> Self {
        self.set(name, value)
    }

    /// Set an attribute to a list of nested objects.
    pub fn set_blocks(self, name: &str, blocks: Vec<ObjectWriter>) -> Self {
        let values: Vec<Value> = blocks.into_iter().map(ObjectWriter::into_value).collect();
        self.set(name, values)
    }

    /// Set a single nested block; `None` becomes null.
    pub fn set_block(self, name: &str, block: Option<ObjectWriter>) -> Self {
        self.set(name, block.map(ObjectWriter::into_value))
    }

    /// The finished JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_three_states() {
        let tree = json!({"known": "shop", "null": null, "unknown": UNKNOWN_VALUE});
        let reader = ObjectReader::new(&tree).unwrap();

        assert_eq!(reader.get::<String>("known").unwrap(), AttrValue::Known("shop".into()));
        assert_eq!(reader.get::<String>("null").unwrap(), AttrValue::Null);
        assert_eq!(reader.get::<String>("absent").unwrap(), AttrValue::Null);
        assert_eq!(reader.get::<String>("unknown").unwrap(), AttrValue::Unknown);

        assert_eq!(reader.optional::<String>("unknown").unwrap(), None);
        assert_eq!(reader.optional::<String>("null").unwrap(), None);
        assert_eq!(reader.optional::<String>("known").unwrap(), Some("shop".into()));
    }

    #[test]
    fn test_unknown_is_never_read_as_value() {
        let tree = json!({"granularity": UNKNOWN_VALUE});
        let reader = ObjectReader::new(&tree).unwrap();

        assert_eq!(reader.optional::<i64>("granularity").unwrap(), None);
        let err = reader.required::<i64>("granularity").unwrap_err();
        assert_eq!(err.attribute_path(), Some("granularity"));
    }

    #[test]
    fn test_required_reports_path() {
        let tree = json!({"rule": {"threshold": {}}});
        let reader = ObjectReader::new(&tree).unwrap();
        let threshold = reader
            .nested("rule")
            .unwrap()
            .unwrap()
            .nested("threshold")
            .unwrap()
            .unwrap();
        let err = threshold.required::<f64>("value").unwrap_err();
        assert_eq!(err.attribute_path(), Some("rule.threshold.value"));
    }

    #[test]
    fn test_numeric_coercions() {
        let tree = json!({"whole": 600000.0, "fraction": 1.5, "big": 4294967296i64});
        let reader = ObjectReader::new(&tree).unwrap();

        assert_eq!(reader.required::<i64>("whole").unwrap(), 600000);
        assert!(reader.required::<i64>("fraction").is_err());
        assert_eq!(reader.required::<i64>("big").unwrap(), 4294967296);
        assert!(reader.required::<i32>("big").is_err());
        assert_eq!(reader.required::<f64>("big").unwrap(), 4294967296.0);
    }

    #[test]
    fn test_collections() {
        let tree = json!({
            "ids": ["a", "b"],
            "partial": ["a", UNKNOWN_VALUE],
            "labels": {"env": "prod"}
        });
        let reader = ObjectReader::new(&tree).unwrap();

        assert_eq!(
            reader.required::<Vec<String>>("ids").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        let err = reader.required::<Vec<String>>("partial").unwrap_err();
        assert_eq!(err.attribute_path(), Some("partial.1"));
        let labels = reader.required::<BTreeMap<String, String>>("labels").unwrap();
        assert_eq!(labels.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_nested_blocks() {
        let tree = json!({
            "as_object": {"a": 1},
            "as_list": [{"a": 2}],
            "too_many": [{"a": 1}, {"a": 2}],
            "rules": [{"a": 1}, {"a": 2}]
        });
        let reader = ObjectReader::new(&tree).unwrap();

        let single = reader.nested("as_object").unwrap().unwrap();
        assert_eq!(single.required::<i64>("a").unwrap(), 1);
        let single = reader.nested("as_list").unwrap().unwrap();
        assert_eq!(single.path("a"), "as_list.0.a");
        assert!(reader.nested("too_many").is_err());
        assert!(reader.nested("absent").unwrap().is_none());

        let rules = reader.nested_list("rules").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].required::<i64>("a").unwrap(), 2);
        assert!(reader.nested_list("absent").unwrap().is_empty());
    }

    #[test]
    fn test_writer() {
        let value = ObjectWriter::new()
            .set("label", "shop")
            .set("description", None::<String>)
            .set_attr("id", AttrValue::<String>::Unknown)
            .set_block(
                "rule",
                Some(ObjectWriter::new().set("metric_name", "latency")),
            )
            .set_blocks("ids", vec![ObjectWriter::new().set("id", "a")])
            .into_value();

        assert_eq!(
            value,
            json!({
                "label": "shop",
                "description": null,
                "id": UNKNOWN_VALUE,
                "rule": {"metric_name": "latency"},
                "ids": [{"id": "a"}]
            })
        );
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(ObjectReader::new(&json!([1])).is_err());
        let null = Value::Null;
        let reader = ObjectReader::new(&null).unwrap();
        assert_eq!(reader.get::<String>("x").unwrap(), AttrValue::Null);
    }
}
