//! Request payloads and decoded response bodies.
//!
//! # Design
//! Request input is classified once into `Payload`, and form fields into the
//! `FormValue` union, so the serializers match exhaustively instead of
//! inspecting runtime types. Field order is insertion order everywhere:
//! `FormData` keeps a `Vec`, and `serde_json` is built with `preserve_order`
//! so JSON object payloads keep their key order too.

use std::borrow::Cow;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::BrokerError;

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileHandle {
    pub fn new(name: &str, content_type: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: bytes.into(),
        }
    }
}

/// Files JSON-encode as their metadata; content never goes into JSON.
impl Serialize for FileHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut file = serializer.serialize_struct("FileHandle", 3)?;
        file.serialize_field("name", &self.name)?;
        file.serialize_field("type", &self.content_type)?;
        file.serialize_field("size", &self.bytes.len())?;
        file.end()
    }
}

/// A single form field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Json(Value),
    File(FileHandle),
    FileList(Vec<FileHandle>),
}

impl FormValue {
    /// Field text: strings pass through, everything else is JSON-encoded.
    pub fn encoded(&self) -> Result<String, BrokerError> {
        match self {
            FormValue::Text(text) => Ok(text.clone()),
            other => serde_json::to_string(other)
                .map_err(|e| BrokerError::Serialization(e.to_string())),
        }
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Text(value)
    }
}

impl From<Value> for FormValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => FormValue::Text(text),
            other => FormValue::Json(other),
        }
    }
}

impl From<FileHandle> for FormValue {
    fn from(value: FileHandle) -> Self {
        FormValue::File(value)
    }
}

impl From<Vec<FileHandle>> for FormValue {
    fn from(value: Vec<FileHandle>) -> Self {
        FormValue::FileList(value)
    }
}

/// Ordered form fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<FormValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: &str, value: impl Into<FormValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// View a JSON document as form fields.
    ///
    /// Objects yield their entries in order, arrays their indices; every
    /// other value has no fields.
    pub fn from_value(value: &Value) -> Self {
        let fields = match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), FormValue::from(value.clone())))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), FormValue::from(value.clone())))
                .collect(),
            _ => Vec::new(),
        };
        Self { fields }
    }
}

impl Serialize for FormData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Request input for a verb call.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sent as-is, whatever the options say.
    Text(String),
    Form(FormData),
    /// Any JSON document, e.g. an RFC 6902 patch.
    Json(Value),
}

impl Payload {
    /// Serialize any value into a JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, BrokerError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| BrokerError::Serialization(e.to_string()))
    }

    /// The payload seen as form fields. Raw text and JSON scalars have none.
    pub fn fields(&self) -> Option<Cow<'_, FormData>> {
        match self {
            Payload::Text(_) => None,
            Payload::Form(form) => Some(Cow::Borrowed(form)),
            Payload::Json(value) if value.is_object() || value.is_array() => {
                Some(Cow::Owned(FormData::from_value(value)))
            }
            Payload::Json(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<FormData> for Payload {
    fn from(value: FormData) -> Self {
        Payload::Form(value)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Binary response body with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Blob(Blob),
    ArrayBuffer(Vec<u8>),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize a JSON body into `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, BrokerError> {
        match self {
            ResponseBody::Json(value) => serde_json::from_value(value)
                .map_err(|e| BrokerError::Deserialization(e.to_string())),
            ResponseBody::Blob(_) => Err(BrokerError::Deserialization(
                "expected a JSON body, got a blob".to_string(),
            )),
            ResponseBody::ArrayBuffer(_) => Err(BrokerError::Deserialization(
                "expected a JSON body, got an array buffer".to_string(),
            )),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ResponseBody::Json(value) => value.to_string().into_bytes(),
            ResponseBody::Blob(blob) => blob.bytes,
            ResponseBody::ArrayBuffer(bytes) => bytes,
        }
    }
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Json(value) => write!(f, "{value}"),
            ResponseBody::Blob(blob) => {
                write!(f, "<blob {} bytes, {}>", blob.bytes.len(), blob.content_type)
            }
            ResponseBody::ArrayBuffer(bytes) => write!(f, "<array buffer {} bytes>", bytes.len()),
        }
    }
}
