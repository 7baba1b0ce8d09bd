//! Per-verb request options and the field-by-field merge.
//!
//! # Design
//! `VerbOptions` always holds a value for every field; `RequestOptions` is the
//! caller's sparse override set. Merging produces a fresh `VerbOptions` per
//! request, so one caller's overrides can never leak into another request or
//! into the defaults.

use serde::{Deserialize, Serialize};

use crate::http::{CredentialsMode, HttpMethod};

/// The five verbs the broker exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Put,
    Post,
    Patch,
    Del,
}

impl Verb {
    pub fn method(&self) -> HttpMethod {
        match self {
            Verb::Get => HttpMethod::Get,
            Verb::Put => HttpMethod::Put,
            Verb::Post => HttpMethod::Post,
            Verb::Patch => HttpMethod::Patch,
            Verb::Del => HttpMethod::Delete,
        }
    }

    /// GET and DELETE carry their data in the query string.
    pub fn uses_query(&self) -> bool {
        matches!(self, Verb::Get | Verb::Del)
    }
}

/// Effective options controlling serialization, headers and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbOptions {
    /// Body is `application/json`.
    pub json: bool,
    /// Body is a multipart form.
    pub multipart: bool,
    /// Decode a successful response as a blob.
    pub blob: bool,
    /// Decode a successful response as raw bytes.
    pub arraybuffer: bool,
    /// Allow caching; when false `Cache-Control: no-cache` is sent.
    pub cache: bool,
    /// Log per-phase request timings.
    pub timing: bool,
    /// Send the client-version header.
    pub client_version: bool,
    pub credentials: CredentialsMode,
}

impl Default for VerbOptions {
    fn default() -> Self {
        Self {
            json: false,
            multipart: false,
            blob: false,
            arraybuffer: false,
            cache: false,
            timing: false,
            client_version: true,
            credentials: CredentialsMode::Include,
        }
    }
}

impl VerbOptions {
    /// Apply `overrides` on top of `self`, field by field.
    pub fn merge(&self, overrides: &RequestOptions) -> VerbOptions {
        VerbOptions {
            json: overrides.json.unwrap_or(self.json),
            multipart: overrides.multipart.unwrap_or(self.multipart),
            blob: overrides.blob.unwrap_or(self.blob),
            arraybuffer: overrides.arraybuffer.unwrap_or(self.arraybuffer),
            cache: overrides.cache.unwrap_or(self.cache),
            timing: overrides.timing.unwrap_or(self.timing),
            client_version: overrides.client_version.unwrap_or(self.client_version),
            credentials: overrides.credentials.unwrap_or(self.credentials),
        }
    }
}

/// Caller-supplied overrides. `None` keeps the verb's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub json: Option<bool>,
    pub multipart: Option<bool>,
    pub blob: Option<bool>,
    pub arraybuffer: Option<bool>,
    pub cache: Option<bool>,
    pub timing: Option<bool>,
    pub client_version: Option<bool>,
    pub credentials: Option<CredentialsMode>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, value: bool) -> Self {
        self.json = Some(value);
        self
    }

    pub fn multipart(mut self, value: bool) -> Self {
        self.multipart = Some(value);
        self
    }

    pub fn blob(mut self, value: bool) -> Self {
        self.blob = Some(value);
        self
    }

    pub fn arraybuffer(mut self, value: bool) -> Self {
        self.arraybuffer = Some(value);
        self
    }

    pub fn cache(mut self, value: bool) -> Self {
        self.cache = Some(value);
        self
    }

    pub fn timing(mut self, value: bool) -> Self {
        self.timing = Some(value);
        self
    }

    pub fn client_version(mut self, value: bool) -> Self {
        self.client_version = Some(value);
        self
    }

    pub fn credentials(mut self, value: CredentialsMode) -> Self {
        self.credentials = Some(value);
        self
    }
}

/// Default option table, one entry per verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultOptions {
    pub get: VerbOptions,
    pub put: VerbOptions,
    pub post: VerbOptions,
    pub patch: VerbOptions,
    pub del: VerbOptions,
}

impl DefaultOptions {
    pub fn for_verb(&self, verb: Verb) -> VerbOptions {
        match verb {
            Verb::Get => self.get,
            Verb::Put => self.put,
            Verb::Post => self.post,
            Verb::Patch => self.patch,
            Verb::Del => self.del,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_match_table() {
        let defaults = DefaultOptions::default();
        for verb in [Verb::Get, Verb::Put, Verb::Post, Verb::Patch, Verb::Del] {
            let options = defaults.for_verb(verb);
            assert!(!options.json, "{verb:?}");
            assert!(!options.multipart, "{verb:?}");
            assert!(!options.blob, "{verb:?}");
            assert!(!options.arraybuffer, "{verb:?}");
            assert!(!options.cache, "{verb:?}");
            assert!(!options.timing, "{verb:?}");
            assert!(options.client_version, "{verb:?}");
            assert_eq!(options.credentials, CredentialsMode::Include, "{verb:?}");
        }
    }

    #[test]
    fn merge_without_overrides_is_identity() {
        let defaults = VerbOptions {
            json: true,
            cache: true,
            ..VerbOptions::default()
        };
        assert_eq!(defaults.merge(&RequestOptions::new()), defaults);
    }

    #[test]
    fn overrides_win_and_other_fields_survive() {
        let defaults = VerbOptions {
            json: true,
            timing: true,
            ..VerbOptions::default()
        };
        let overrides = RequestOptions::new()
            .json(false)
            .blob(true)
            .credentials(CredentialsMode::Omit);
        let merged = defaults.merge(&overrides);

        assert!(!merged.json);
        assert!(merged.blob);
        assert_eq!(merged.credentials, CredentialsMode::Omit);
        assert!(merged.timing);
        assert!(merged.client_version);
        assert!(!merged.multipart);
    }

    #[test]
    fn merge_does_not_touch_defaults() {
        let defaults = VerbOptions::default();
        let _ = defaults.merge(&RequestOptions::new().json(true));
        assert!(!defaults.json);
    }

    #[test]
    fn partial_table_fills_missing_fields_from_defaults() {
        let table: DefaultOptions =
            serde_json::from_str(r#"{"post": {"json": true}, "get": {"cache": true}}"#).unwrap();
        assert!(table.post.json);
        assert!(table.post.client_version);
        assert!(table.get.cache);
        assert_eq!(table.del, VerbOptions::default());
    }

    #[test]
    fn overrides_deserialize_sparse() {
        let overrides: RequestOptions = serde_json::from_str(r#"{"blob": true}"#).unwrap();
        assert_eq!(overrides, RequestOptions::new().blob(true));
    }

    #[test]
    fn query_verbs() {
        assert!(Verb::Get.uses_query());
        assert!(Verb::Del.uses_query());
        assert!(!Verb::Post.uses_query());
        assert_eq!(Verb::Del.method(), HttpMethod::Delete);
    }
}
