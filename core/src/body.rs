//! Query-string, form and multipart body construction.
//!
//! # Design
//! `get_body` picks exactly one encoding, in priority order: raw text, JSON,
//! multipart, then url-encoded form fields. GET and DELETE reuse
//! `serialize_params` for their query strings.

use serde::Serialize;
use uuid::Uuid;

use crate::error::BrokerError;
use crate::http::Body;
use crate::options::VerbOptions;
use crate::types::{FileHandle, FormData, FormValue, Payload};

/// Encode form fields as `key=value&…`, percent-encoding both sides.
///
/// Text values pass through; every other value is JSON-encoded first.
pub fn serialize_params(data: Option<&FormData>) -> Result<String, BrokerError> {
    let Some(data) = data else {
        return Ok(String::new());
    };
    let pairs = data
        .iter()
        .map(|(key, value)| {
            let value = value.encoded()?;
            Ok(format!("{}={}", urlencoding::encode(key), urlencoding::encode(&value)))
        })
        .collect::<Result<Vec<_>, BrokerError>>()?;
    Ok(pairs.join("&"))
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File(FileHandle),
}

/// A multipart form ready to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartForm {
    boundary: String,
    entries: Vec<(String, PartValue)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: format!("----BrokerFormBoundary{}", Uuid::new_v4().simple()),
            entries: Vec::new(),
        }
    }

    /// Replace every entry under `name` with a single value.
    pub fn set(&mut self, name: &str, value: PartValue) {
        self.entries.retain(|(existing, _)| existing != name);
        self.entries.push((name.to_string(), value));
    }

    /// Add an entry, keeping earlier entries under the same name.
    pub fn append(&mut self, name: &str, value: PartValue) {
        self.entries.push((name.to_string(), value));
    }

    pub fn entries(&self) -> &[(String, PartValue)] {
        &self.entries
    }

    /// All entries under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&PartValue> {
        self.entries
            .iter()
            .filter(|(existing, _)| existing == name)
            .map(|(_, value)| value)
            .collect()
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode the form as `multipart/form-data` wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.entries {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match value {
                PartValue::Text(text) => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(text.as_bytes());
                }
                PartValue::File(file) => {
                    let content_type = if file.content_type.is_empty() {
                        "application/octet-stream"
                    } else {
                        &file.content_type
                    };
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            escape_quoted(name),
                            escape_quoted(&file.name),
                            content_type
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(&file.bytes);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\r', "%0D")
        .replace('\n', "%0A")
        .replace('"', "%22")
}

/// Build a multipart form from form fields. `None` yields no form.
pub fn to_multipart(data: Option<&FormData>) -> Result<Option<MultipartForm>, BrokerError> {
    let Some(data) = data else {
        return Ok(None);
    };
    let mut form = MultipartForm::new();
    for (key, value) in data.iter() {
        match value {
            FormValue::File(file) => form.set(key, PartValue::File(file.clone())),
            FormValue::FileList(files) => {
                for file in files {
                    form.append(key, PartValue::File(file.clone()));
                }
            }
            FormValue::Text(text) => form.set(key, PartValue::Text(text.clone())),
            FormValue::Json(_) => form.set(key, PartValue::Text(value.encoded()?)),
        }
    }
    Ok(Some(form))
}

/// A request body before it is lowered to transport bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Content type overriding the header builder's choice, if any.
    pub fn content_type(&self) -> Option<String> {
        match self {
            RequestBody::Text(_) => None,
            RequestBody::Multipart(form) => Some(form.content_type()),
        }
    }

    pub fn into_body(self) -> Body {
        match self {
            RequestBody::Text(text) => Body::Text(text),
            RequestBody::Multipart(form) => Body::Binary(form.encode()),
        }
    }
}

/// Choose and apply the body encoding for `data`.
pub fn get_body(data: &Payload, options: &VerbOptions) -> Result<RequestBody, BrokerError> {
    match data {
        Payload::Text(text) => return Ok(RequestBody::Text(text.clone())),
        Payload::Form(form) if options.json => return json_body(form),
        Payload::Json(value) if options.json => return json_body(value),
        _ => {}
    }

    let fields = data.fields();
    if options.multipart {
        return Ok(match to_multipart(fields.as_deref())? {
            Some(form) => RequestBody::Multipart(form),
            None => RequestBody::Text(String::new()),
        });
    }
    serialize_params(fields.as_deref()).map(RequestBody::Text)
}

fn json_body<T: Serialize>(value: &T) -> Result<RequestBody, BrokerError> {
    serde_json::to_string(value)
        .map(RequestBody::Text)
        .map_err(|e| BrokerError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn file(name: &str) -> FileHandle {
        FileHandle::new(name, "text/plain", name.as_bytes().to_vec())
    }

    #[test]
    fn serialize_params_empty_inputs() {
        assert_eq!(serialize_params(None).unwrap(), "");
        assert_eq!(serialize_params(Some(&FormData::new())).unwrap(), "");
    }

    #[test]
    fn serialize_params_encodes_non_strings_as_json() {
        let form = FormData::from_value(&json!({"a": "x", "b": 2}));
        assert_eq!(serialize_params(Some(&form)).unwrap(), "a=x&b=2");
    }

    #[test]
    fn serialize_params_percent_encodes_keys_and_values() {
        let form = FormData::new()
            .with("full name", "Ada Lovelace")
            .with("tags", json!(["a", "b"]))
            .with("q", "x&y=z");
        assert_eq!(
            serialize_params(Some(&form)).unwrap(),
            "full%20name=Ada%20Lovelace&tags=%5B%22a%22%2C%22b%22%5D&q=x%26y%3Dz"
        );
    }

    #[test]
    fn multipart_file_list_appends_one_entry_per_file() {
        let form = FormData::new().with("files", vec![file("f1"), file("f2")]);
        let multipart = to_multipart(Some(&form)).unwrap().unwrap();
        let entries = multipart.get_all("files");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], &PartValue::File(file("f1")));
        assert_eq!(entries[1], &PartValue::File(file("f2")));
    }

    #[test]
    fn multipart_single_values_occupy_one_field() {
        let form = FormData::new()
            .with("avatar", file("me.png"))
            .with("name", "ada")
            .with("meta", json!({"admin": false}));
        let multipart = to_multipart(Some(&form)).unwrap().unwrap();
        assert_eq!(multipart.entries().len(), 3);
        assert_eq!(multipart.get_all("name"), vec![&PartValue::Text("ada".to_string())]);
        assert_eq!(
            multipart.get_all("meta"),
            vec![&PartValue::Text(r#"{"admin":false}"#.to_string())]
        );
    }

    #[test]
    fn multipart_without_data_is_empty() {
        assert!(to_multipart(None).unwrap().is_none());
    }

    #[test]
    fn multipart_encoding_frames_every_part() {
        let mut form = MultipartForm::new();
        form.set("name", PartValue::Text("ada".to_string()));
        form.append("doc", PartValue::File(file("a.txt")));
        let encoded = String::from_utf8(form.encode()).unwrap();
        let boundary = form.boundary();

        assert!(encoded.starts_with(&format!("--{boundary}\r\n")));
        assert!(encoded.contains("Content-Disposition: form-data; name=\"name\"\r\n\r\nada\r\n"));
        assert!(encoded.contains(
            "Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\na.txt\r\n"
        ));
        assert!(encoded.ends_with(&format!("--{boundary}--\r\n")));
        assert_eq!(form.content_type(), format!("multipart/form-data; boundary={boundary}"));
    }

    #[test]
    fn get_body_raw_text_wins_over_every_option() {
        let options = VerbOptions {
            json: true,
            multipart: true,
            ..VerbOptions::default()
        };
        let body = get_body(&Payload::from("raw=1"), &options).unwrap();
        assert_eq!(body, RequestBody::Text("raw=1".to_string()));
    }

    #[test]
    fn get_body_json_beats_multipart() {
        let options = VerbOptions {
            json: true,
            multipart: true,
            ..VerbOptions::default()
        };
        let patch = json!([{"op": "replace", "path": "/name", "value": "ada"}]);
        let body = get_body(&Payload::Json(patch), &options).unwrap();
        assert_eq!(
            body,
            RequestBody::Text(r#"[{"op":"replace","path":"/name","value":"ada"}]"#.to_string())
        );
    }

    #[test]
    fn get_body_json_encodes_forms_in_order() {
        let options = VerbOptions {
            json: true,
            ..VerbOptions::default()
        };
        let form = FormData::new().with("b", "1").with("a", json!(2));
        let body = get_body(&Payload::Form(form), &options).unwrap();
        assert_eq!(body, RequestBody::Text(r#"{"b":"1","a":2}"#.to_string()));
    }

    #[test]
    fn get_body_multipart_sets_boundary_content_type() {
        let options = VerbOptions {
            multipart: true,
            ..VerbOptions::default()
        };
        let form = FormData::new().with("doc", file("a.txt"));
        let body = get_body(&Payload::Form(form), &options).unwrap();
        let content_type = body.content_type().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert!(matches!(body.into_body(), Body::Binary(_)));
    }

    #[test]
    fn get_body_defaults_to_form_encoding() {
        let body = get_body(&Payload::Json(json!({"a": "x", "b": 2})), &VerbOptions::default())
            .unwrap();
        assert_eq!(body, RequestBody::Text("a=x&b=2".to_string()));
        assert_eq!(body.content_type(), None);
    }

    #[test]
    fn get_body_scalar_json_without_json_option_is_empty() {
        let body = get_body(&Payload::Json(json!(null)), &VerbOptions::default()).unwrap();
        assert_eq!(body, RequestBody::Text(String::new()));
    }
}
