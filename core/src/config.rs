//! Base URL, default options and the cached "current" broker.
//!
//! # Design
//! `ConfigStore` is an explicit context object rather than a global. It owns
//! the collaborators, the default option table and the base URL, and hands
//! out brokers. Changing the base URL drops the cached broker so the next
//! `instance()` call builds a fresh one; brokers already handed out keep the
//! URL they were built with. The default table is shared: replacing it is
//! visible to every broker built from this store.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{LogOnlyWipe, RemoteWipe};
use crate::client::{Broker, Services};
use crate::headers::{CredentialStore, MemoryCredentials};
use crate::http::Transport;
use crate::options::{DefaultOptions, Verb, VerbOptions};

pub const BASE_URL_ENV: &str = "BROKER_BASE_URL";
pub const CLIENT_VERSION_ENV: &str = "BROKER_CLIENT_VERSION";

/// Version of this build, sent in the client-version header by default.
pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serializable broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub base_url: String,
    pub client_version: String,
    pub defaults: DefaultOptions,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_version: BUILD_VERSION.to_string(),
            defaults: DefaultOptions::default(),
        }
    }
}

impl BrokerSettings {
    /// Read `BROKER_BASE_URL` and `BROKER_CLIENT_VERSION`, keeping defaults
    /// for unset variables.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            settings.base_url = base_url;
        }
        if let Ok(version) = std::env::var(CLIENT_VERSION_ENV) {
            settings.client_version = version;
        }
        settings
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

struct State {
    base_url: String,
    instance: Option<Arc<Broker>>,
}

/// Process configuration and broker factory.
pub struct ConfigStore {
    state: RwLock<State>,
    services: Arc<Services>,
}

impl ConfigStore {
    pub fn builder(transport: Arc<dyn Transport>) -> ConfigStoreBuilder {
        ConfigStoreBuilder::new(transport)
    }

    pub fn base_url(&self) -> String {
        self.state.read().base_url.clone()
    }

    /// Replace the base URL and drop the cached broker.
    pub fn set_base_url(&self, url: &str) {
        let mut state = self.state.write();
        state.base_url = url.to_string();
        if state.instance.take().is_some() {
            debug!(base_url = %url, "base url changed, cached broker dropped");
        }
    }

    /// The current broker, built from the current base URL on first use.
    pub fn instance(&self) -> Arc<Broker> {
        if let Some(broker) = self.state.read().instance.as_ref() {
            return broker.clone();
        }
        let mut state = self.state.write();
        let base_url = state.base_url.clone();
        state
            .instance
            .get_or_insert_with(|| Arc::new(Broker::new(&base_url, self.services.clone())))
            .clone()
    }

    /// An uncached broker bound to `base_url`.
    pub fn broker(&self, base_url: &str) -> Broker {
        Broker::new(base_url, self.services.clone())
    }

    pub fn default_options(&self, verb: Verb) -> VerbOptions {
        self.services.defaults.read().for_verb(verb)
    }

    pub fn default_table(&self) -> DefaultOptions {
        *self.services.defaults.read()
    }

    /// Replace the whole default table. Values are taken as given.
    pub fn set_default_options(&self, table: DefaultOptions) {
        *self.services.defaults.write() = table;
    }

    pub fn client_version(&self) -> &str {
        &self.services.client_version
    }
}

/// Builder for [`ConfigStore`].
pub struct ConfigStoreBuilder {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    remote_wipe: Arc<dyn RemoteWipe>,
    settings: BrokerSettings,
}

impl ConfigStoreBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            credentials: Arc::new(MemoryCredentials::new()),
            remote_wipe: Arc::new(LogOnlyWipe),
            settings: BrokerSettings::default(),
        }
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn remote_wipe(mut self, remote_wipe: Arc<dyn RemoteWipe>) -> Self {
        self.remote_wipe = remote_wipe;
        self
    }

    /// Seed base URL, client version and defaults from `settings`.
    pub fn settings(mut self, settings: BrokerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = base_url.into();
        self
    }

    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.settings.client_version = version.into();
        self
    }

    pub fn defaults(mut self, defaults: DefaultOptions) -> Self {
        self.settings.defaults = defaults;
        self
    }

    pub fn build(self) -> ConfigStore {
        let services = Services {
            transport: self.transport,
            credentials: self.credentials,
            remote_wipe: self.remote_wipe,
            client_version: self.settings.client_version,
            defaults: RwLock::new(self.settings.defaults),
        };
        ConfigStore {
            state: RwLock::new(State {
                base_url: self.settings.base_url,
                instance: None,
            }),
            services: Arc::new(services),
        }
    }
}
