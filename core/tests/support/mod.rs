//! Scripted transport, spy responses and recorders shared by broker tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use broker_core::{
    Blob, Broker, BrokerEvent, ConfigStore, EventKind, HttpRequest, MemoryCredentials, RemoteWipe,
    Transport, TransportError, TransportResponse,
};
use parking_lot::Mutex;

pub const BASE_URL: &str = "http://localhost:3000";

/// Ordered record of everything observable during a call: events, body reads,
/// wipes.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Response that records which reader was used.
pub struct SpyResponse {
    status: u16,
    status_text: String,
    content_type: String,
    body: Vec<u8>,
    journal: Journal,
}

impl SpyResponse {
    fn record(&self, reader: &str) {
        self.journal.lock().push(format!("read:{reader}"));
    }
}

#[async_trait]
impl TransportResponse for SpyResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> &str {
        &self.status_text
    }

    async fn text(self: Box<Self>) -> Result<String, TransportError> {
        self.record("text");
        Ok(String::from_utf8_lossy(&self.body).into_owned())
    }

    async fn json(self: Box<Self>) -> Result<serde_json::Value, TransportError> {
        self.record("json");
        if self.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    async fn blob(self: Box<Self>) -> Result<Blob, TransportError> {
        self.record("blob");
        Ok(Blob {
            content_type: self.content_type,
            bytes: self.body,
        })
    }

    async fn array_buffer(self: Box<Self>) -> Result<Vec<u8>, TransportError> {
        self.record("arraybuffer");
        Ok(self.body)
    }
}

/// Transport answering every request with the same scripted reply.
pub struct ScriptedTransport {
    status: u16,
    status_text: String,
    content_type: String,
    body: Vec<u8>,
    fail: bool,
    requests: Mutex<Vec<HttpRequest>>,
    journal: Journal,
}

impl ScriptedTransport {
    pub fn reply(status: u16, body: &str, journal: &Journal) -> Self {
        Self {
            status,
            status_text: broker_core::http::reason_phrase(status).to_string(),
            content_type: "application/json".to_string(),
            body: body.as_bytes().to_vec(),
            fail: false,
            requests: Mutex::new(Vec::new()),
            journal: journal.clone(),
        }
    }

    pub fn unreachable(journal: &Journal) -> Self {
        Self {
            fail: true,
            ..Self::reply(0, "", journal)
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests.lock().last().cloned().expect("no request was sent")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<Box<dyn TransportResponse>, TransportError> {
        self.requests.lock().push(request);
        if self.fail {
            return Err(TransportError::Request("network unreachable".to_string()));
        }
        Ok(Box::new(SpyResponse {
            status: self.status,
            status_text: self.status_text.clone(),
            content_type: self.content_type.clone(),
            body: self.body.clone(),
            journal: self.journal.clone(),
        }))
    }
}

/// Remote wipe action that counts invocations and journals them.
pub struct CountingWipe {
    count: AtomicUsize,
    journal: Journal,
}

impl CountingWipe {
    pub fn new(journal: &Journal) -> Self {
        Self {
            count: AtomicUsize::new(0),
            journal: journal.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl RemoteWipe for CountingWipe {
    fn wipe(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().push("wipe".to_string());
    }
}

/// Journal every broker event by name.
pub fn record_events(broker: &Broker, journal: &Journal) {
    for kind in [
        EventKind::Loading,
        EventKind::LoadingComplete,
        EventKind::MissingCredentials,
        EventKind::Unauthorized,
        EventKind::NeedUpdate,
    ] {
        let journal = journal.clone();
        broker.on(kind, move |event: &BrokerEvent| {
            journal.lock().push(format!("event:{}", event.kind().name()));
        });
    }
}

/// A wired-up test fixture.
pub struct Harness {
    pub config: ConfigStore,
    pub transport: Arc<ScriptedTransport>,
    pub wipe: Arc<CountingWipe>,
    pub journal: Journal,
}

impl Harness {
    pub fn new(status: u16, body: &str) -> Self {
        let journal = Journal::default();
        Self::with_transport(ScriptedTransport::reply(status, body, &journal), journal)
    }

    pub fn with_transport(transport: ScriptedTransport, journal: Journal) -> Self {
        let transport = Arc::new(transport);
        let wipe = Arc::new(CountingWipe::new(&journal));
        let config = ConfigStore::builder(transport.clone())
            .base_url(BASE_URL)
            .client_version("1.4.0")
            .credentials(Arc::new(MemoryCredentials::with_token("secret-token")))
            .remote_wipe(wipe.clone())
            .build();
        Self {
            config,
            transport,
            wipe,
            journal,
        }
    }

    /// The current broker with every event journaled.
    pub fn broker(&self) -> Arc<Broker> {
        let broker = self.config.instance();
        record_events(&broker, &self.journal);
        broker
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.journal.lock().iter().filter(|e| *e == entry).count()
    }
}
