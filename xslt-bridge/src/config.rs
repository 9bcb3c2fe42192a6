//! Transformation configuration
//!
//! A [`Config`] names the stylesheet, the source document and the result
//! target, each in one of several representations. It can be built in code
//! or loaded from a JSON job file:
//!
//! ```json
//! {
//!   "xsltPath": "discount.xsl",
//!   "source": "<order/>",
//!   "result": { "type": "String" },
//!   "params": { "discount": "1972/01/01", "rate": 15 }
//! }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Marker asking for the result in memory instead of in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TypeMarker {
    String,
    Buffer,
}

/// A polymorphic configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Buffer(Vec<u8>),
    Type(TypeMarker),
    /// Anything else; rejected by validation
    Other(serde_json::Value),
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Buffer(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Buffer(bytes.to_vec())
    }
}

impl From<TypeMarker> for Value {
    fn from(marker: TypeMarker) -> Self {
        Value::Type(marker)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xslt_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xslt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Stylesheet parameters, bound in insertion order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<IndexMap<String, serde_json::Value>>,
    /// Output properties, bound in insertion order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<IndexMap<String, serde_json::Value>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_xslt_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.xslt_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn with_xslt<V: Into<Value>>(mut self, xslt: V) -> Self {
        self.xslt = Some(xslt.into());
        self
    }

    pub fn with_source_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn with_source<V: Into<Value>>(mut self, source: V) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Write the result to the file at `path`
    pub fn with_result_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.result = Some(Value::Text(path.as_ref().to_string_lossy().into_owned()));
        self
    }

    /// Return the result as a string or a buffer
    pub fn with_result_type(mut self, marker: TypeMarker) -> Self {
        self.result = Some(Value::Type(marker));
        self
    }

    pub fn with_param<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.params
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_prop<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.props
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Parameters as the transformer receives them
    pub fn param_values(&self) -> Option<IndexMap<String, String>> {
        self.params.as_ref().map(as_text)
    }

    /// Output properties as the transformer receives them
    pub fn prop_values(&self) -> Option<IndexMap<String, String>> {
        self.props.as_ref().map(as_text)
    }
}

/// Strings pass unchanged, other scalars in their JSON form, `null` as an
/// empty string.
fn as_text(values: &IndexMap<String, serde_json::Value>) -> IndexMap<String, String> {
    values
        .iter()
        .map(|(name, value)| {
            let text = match value {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (name.clone(), text)
        })
        .collect()
}
