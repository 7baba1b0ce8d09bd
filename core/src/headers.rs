//! Request header derivation and the credential store boundary.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::options::VerbOptions;

/// Key under which the bearer token lives in the credential store.
pub const TOKEN_KEY: &str = "app.jwt";

pub const CLIENT_VERSION_HEADER: &str = "client-software-version";

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_JSON: &str = "application/json";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Read-only view of the application's credential store.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Credential store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        store.set(TOKEN_KEY, token);
        store
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

impl CredentialStore for MemoryCredentials {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

/// Content type implied by the options. Multipart wins over JSON.
pub fn content_type(options: &VerbOptions) -> &'static str {
    if options.multipart {
        MULTIPART_FORM_DATA
    } else if options.json {
        APPLICATION_JSON
    } else {
        FORM_URLENCODED
    }
}

/// Build the header set for a request.
///
/// `Authorization` is always present; a missing token yields `Bearer `.
pub fn build_headers(
    options: &VerbOptions,
    token: Option<&str>,
    client_version: &str,
) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Content-Type".to_string(), content_type(options).to_string()),
        (
            "Authorization".to_string(),
            format!("Bearer {}", token.unwrap_or_default()),
        ),
    ];
    if !options.blob {
        headers.push(("Accept".to_string(), APPLICATION_JSON.to_string()));
    }
    if !options.cache {
        headers.push(("Cache-Control".to_string(), "no-cache".to_string()));
    }
    if options.client_version {
        headers.push((CLIENT_VERSION_HEADER.to_string(), client_version.to_string()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn defaults_produce_full_header_set() {
        let headers = build_headers(&VerbOptions::default(), Some("tok"), "1.2.3");
        assert_eq!(
            headers,
            vec![
                ("Content-Type".to_string(), FORM_URLENCODED.to_string()),
                ("Authorization".to_string(), "Bearer tok".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("Cache-Control".to_string(), "no-cache".to_string()),
                ("client-software-version".to_string(), "1.2.3".to_string()),
            ]
        );
    }

    #[test]
    fn missing_token_still_sends_authorization() {
        let headers = build_headers(&VerbOptions::default(), None, "1.0.0");
        assert_eq!(find(&headers, "authorization"), Some("Bearer "));
    }

    #[test]
    fn multipart_takes_precedence_over_json() {
        let options = VerbOptions {
            json: true,
            multipart: true,
            ..VerbOptions::default()
        };
        assert_eq!(content_type(&options), MULTIPART_FORM_DATA);
        let options = VerbOptions {
            json: true,
            ..VerbOptions::default()
        };
        assert_eq!(content_type(&options), APPLICATION_JSON);
    }

    #[test]
    fn blob_cache_and_version_flags_drop_headers() {
        let options = VerbOptions {
            blob: true,
            cache: true,
            client_version: false,
            ..VerbOptions::default()
        };
        let headers = build_headers(&options, Some("tok"), "1.0.0");
        assert_eq!(find(&headers, "accept"), None);
        assert_eq!(find(&headers, "cache-control"), None);
        assert_eq!(find(&headers, CLIENT_VERSION_HEADER), None);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn memory_credentials_round_trip() {
        let store = MemoryCredentials::with_token("abc");
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("abc"));
        store.remove(TOKEN_KEY);
        assert_eq!(store.get(TOKEN_KEY), None);
    }
}
