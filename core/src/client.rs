//! The broker façade: one method per HTTP verb.
//!
//! # Design
//! `Broker` holds only its `base_url`, its event registry and a handle to the
//! collaborators shared with the `ConfigStore` that built it. Each verb call
//! merges options, builds an `HttpRequest`, hands it to the transport and
//! classifies the response. Per-request state lives on the call's stack, so
//! concurrent calls never share mutable data.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::body::{get_body, serialize_params, RequestBody};
use crate::classify::{Classifier, RemoteWipe};
use crate::error::BrokerError;
use crate::events::{BrokerEvent, EventBus, EventKind};
use crate::headers::{build_headers, CredentialStore, TOKEN_KEY};
use crate::http::{CacheMode, HttpMethod, HttpRequest, Transport};
use crate::options::{DefaultOptions, RequestOptions, Verb, VerbOptions};
use crate::types::{Payload, ResponseBody};

/// Collaborators and the default option table, shared by every broker a
/// `ConfigStore` builds.
pub(crate) struct Services {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) remote_wipe: Arc<dyn RemoteWipe>,
    pub(crate) client_version: String,
    pub(crate) defaults: RwLock<DefaultOptions>,
}

/// Issues verb requests against one base URL.
pub struct Broker {
    base_url: String,
    events: EventBus,
    services: Arc<Services>,
}

impl Broker {
    pub(crate) fn new(base_url: &str, services: Arc<Services>) -> Self {
        Self {
            base_url: base_url.to_string(),
            events: EventBus::new(),
            services,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to one of the broker's events.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&BrokerEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener);
    }

    /// GET `url`, with `data` encoded into the query string.
    pub async fn get(
        &self,
        url: &str,
        data: Option<&Payload>,
        options: Option<RequestOptions>,
    ) -> Result<ResponseBody, BrokerError> {
        self.request(Verb::Get, url, data, options).await
    }

    pub async fn put(
        &self,
        url: &str,
        data: Option<&Payload>,
        options: Option<RequestOptions>,
    ) -> Result<ResponseBody, BrokerError> {
        self.request(Verb::Put, url, data, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        data: Option<&Payload>,
        options: Option<RequestOptions>,
    ) -> Result<ResponseBody, BrokerError> {
        self.request(Verb::Post, url, data, options).await
    }

    /// Send a patch document. With `json` on, `patch` should be an RFC 6902
    /// operation array.
    pub async fn patch(
        &self,
        url: &str,
        patch: &Payload,
        options: Option<RequestOptions>,
    ) -> Result<ResponseBody, BrokerError> {
        self.request(Verb::Patch, url, Some(patch), options).await
    }

    /// DELETE `url`, with `data` encoded into the query string.
    pub async fn del(
        &self,
        url: &str,
        data: Option<&Payload>,
        options: Option<RequestOptions>,
    ) -> Result<ResponseBody, BrokerError> {
        self.request(Verb::Del, url, data, options).await
    }

    async fn request(
        &self,
        verb: Verb,
        url: &str,
        data: Option<&Payload>,
        overrides: Option<RequestOptions>,
    ) -> Result<ResponseBody, BrokerError> {
        let options = self
            .services
            .defaults
            .read()
            .for_verb(verb)
            .merge(&overrides.unwrap_or_default());
        let _loading = LoadingScope::enter(&self.events, verb.method(), url);

        let request = self.build_request(verb, url, data, &options)?;
        debug!(method = %request.method, url = %request.url, "sending request");

        let started = Instant::now();
        let response = self.services.transport.send(request).await?;
        log_phase(&options, "fetch", started);

        let started = Instant::now();
        let classifier = Classifier::new(&self.events, self.services.remote_wipe.as_ref(), url);
        let result = classifier.classify(response, &options).await;
        log_phase(&options, "handle-response", started);
        result
    }

    /// Assemble the transport request for one verb call.
    pub fn build_request(
        &self,
        verb: Verb,
        url: &str,
        data: Option<&Payload>,
        options: &VerbOptions,
    ) -> Result<HttpRequest, BrokerError> {
        let started = Instant::now();
        let (query, body) = if verb.uses_query() {
            (query_string(data)?, None)
        } else {
            (String::new(), data.map(|data| get_body(data, options)).transpose()?)
        };
        let url = if query.is_empty() {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}{url}?{query}", self.base_url)
        };
        log_phase(options, "serialize", started);

        let started = Instant::now();
        let token = self.services.credentials.get(TOKEN_KEY);
        let mut headers = build_headers(options, token.as_deref(), &self.services.client_version);
        if let Some(content_type) = body.as_ref().and_then(RequestBody::content_type) {
            for (name, value) in headers.iter_mut() {
                if name.eq_ignore_ascii_case("content-type") {
                    *value = content_type.clone();
                }
            }
        }
        log_phase(options, "headers", started);

        let cache = if verb == Verb::Get && options.cache {
            CacheMode::Default
        } else {
            CacheMode::NoStore
        };

        Ok(HttpRequest {
            method: verb.method(),
            url,
            headers,
            credentials: options.credentials,
            cache,
            body: body.map(RequestBody::into_body),
        })
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("base_url", &self.base_url)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Raw text is taken as a ready-made query; everything else is form-encoded.
fn query_string(data: Option<&Payload>) -> Result<String, BrokerError> {
    match data {
        None => Ok(String::new()),
        Some(Payload::Text(text)) => Ok(text.clone()),
        Some(payload) => serialize_params(payload.fields().as_deref()),
    }
}

fn log_phase(options: &VerbOptions, phase: &'static str, started: Instant) {
    if options.timing {
        debug!(phase, elapsed = ?started.elapsed(), "broker timing");
    }
}

/// Emits `loading` on entry and `loading_complete` when dropped, so every
/// exit path of a request completes the pair, a panicking listener included.
struct LoadingScope<'a> {
    events: &'a EventBus,
    method: HttpMethod,
    url: String,
}

impl<'a> LoadingScope<'a> {
    fn enter(events: &'a EventBus, method: HttpMethod, url: &str) -> Self {
        let url = url.to_string();
        events.emit(&BrokerEvent::Loading {
            method,
            url: url.clone(),
        });
        Self {
            events,
            method,
            url,
        }
    }
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        let event = BrokerEvent::LoadingComplete {
            method: self.method,
            url: std::mem::take(&mut self.url),
        };
        if !std::thread::panicking() {
            self.events.emit(&event);
            return;
        }
        // Already unwinding: a second panic from a listener would abort.
        let events = self.events;
        if panic::catch_unwind(AssertUnwindSafe(|| events.emit(&event))).is_err() {
            warn!(method = %self.method, "loading_complete listener panicked during unwind");
        }
    }
}
