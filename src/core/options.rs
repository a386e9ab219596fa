use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::XmlResult;

/// Options a serializer graph is built for.
///
/// Serializers and member descriptors are cached per options value, so two
/// equal option sets share every cached serializer.
///
/// # Examples
///
/// ```
/// use xml_mapper::core::SerializerOptions;
///
/// let options = SerializerOptions::from_json_str(
///     r#"{ "conditions": { "format": "compact" }, "lowercase_names": true }"#,
/// ).unwrap();
///
/// assert!(options.matches("format", "compact"));
/// assert!(options.lowercase_names);
/// assert!(!options.serialize_nulls);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerOptions {
    /// Values conditional tags are checked against.
    pub conditions: BTreeMap<String, String>,
    /// Maps members without an attribute/element tag as elements.
    pub include_unattributed: bool,
    /// Lowercases names derived from member identifiers.
    pub lowercase_names: bool,
    /// Writes an empty node for every null value.
    pub serialize_nulls: bool,
    /// Preferred prefix per namespace URI.
    pub namespace_prefixes: BTreeMap<String, String>,
}

impl SerializerOptions {
    pub fn builder() -> SerializerOptionsBuilder {
        SerializerOptionsBuilder::new()
    }

    /// Whether the condition `name` is set to `value`.
    pub fn matches(&self, name: &str, value: &str) -> bool {
        self.conditions.get(name).is_some_and(|v| v == value)
    }

    pub fn from_json_str(json: &str) -> XmlResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> XmlResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Builder for [`SerializerOptions`].
#[derive(Default)]
pub struct SerializerOptionsBuilder {
    options: SerializerOptions,
}

impl SerializerOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value conditional tags named `name` are checked against.
    pub fn condition(mut self, name: &str, value: &str) -> Self {
        self.options
            .conditions
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn include_unattributed(mut self, include: bool) -> Self {
        self.options.include_unattributed = include;
        self
    }

    pub fn lowercase_names(mut self, lowercase: bool) -> Self {
        self.options.lowercase_names = lowercase;
        self
    }

    pub fn serialize_nulls(mut self, serialize: bool) -> Self {
        self.options.serialize_nulls = serialize;
        self
    }

    /// Writes namespace `uri` with `prefix` instead of a generated one.
    pub fn namespace_prefix(mut self, uri: &str, prefix: &str) -> Self {
        self.options
            .namespace_prefixes
            .insert(uri.to_string(), prefix.to_string());
        self
    }

    pub fn build(self) -> SerializerOptions {
        self.options
    }
}
