//! Client-side request broker.
//!
//! # Overview
//! A single gateway for GET/PUT/POST/PATCH/DELETE calls against a remote
//! service. The broker attaches credentials, serializes bodies and query
//! strings, and classifies responses by status, reacting to the statuses the
//! service uses as signals (401, 403, 409, 451).
//!
//! # Design
//! - The network is an injected `Transport`; the core never opens sockets.
//! - `ConfigStore` is the explicit context: collaborators, default options,
//!   base URL, and the cached current `Broker`.
//! - Options are typed per verb and merged field by field per request.
//! - Classification is a declarative status table (`classify::STATUS_RULES`).
//! - Lifecycle and fault notifications go through a typed `EventBus`.

pub mod body;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod http;
pub mod options;
pub mod types;

pub use body::{get_body, serialize_params, to_multipart, MultipartForm, PartValue, RequestBody};
pub use classify::{rule_for, LogOnlyWipe, RemoteWipe, StatusRule, STATUS_RULES};
pub use client::Broker;
pub use config::{BrokerSettings, ConfigStore, ConfigStoreBuilder};
pub use error::{BrokerError, ErrorBody};
pub use events::{BrokerEvent, EventBus, EventKind};
pub use headers::{build_headers, CredentialStore, MemoryCredentials, TOKEN_KEY};
pub use http::{
    Body, CacheMode, CredentialsMode, HttpMethod, HttpRequest, HttpResponse, Transport,
    TransportError, TransportResponse,
};
pub use options::{DefaultOptions, RequestOptions, Verb, VerbOptions};
pub use types::{Blob, FileHandle, FormData, FormValue, Payload, ResponseBody};
