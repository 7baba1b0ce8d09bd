//! Status-driven response classification.
//!
//! # Design
//! The statuses the service uses as application signals are listed in
//! `STATUS_RULES`, each with its side effect, the body representation to read
//! and the error to raise. Anything not in the table is decoded according to
//! the request options and succeeds iff the response is 2xx. Side effects run
//! before the body is read and before the error is returned, so listeners
//! react even when the caller ignores the error.

use tracing::{debug, warn};

use crate::error::BrokerError;
use crate::events::{BrokerEvent, EventBus};
use crate::http::TransportResponse;
use crate::options::VerbOptions;
use crate::types::ResponseBody;

/// The device-wipe action the service can order with a 451.
pub trait RemoteWipe: Send + Sync {
    fn wipe(&self);
}

/// Wipe action for hosts without local data: records the order and returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyWipe;

impl RemoteWipe for LogOnlyWipe {
    fn wipe(&self) {
        warn!("remote wipe requested but no wipe action is installed");
    }
}

/// Reaction attached to a status before the failure is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,
    MissingCredentials,
    Unauthorized,
    NeedUpdate,
    RemoteWipe,
}

impl SideEffect {
    /// Event emitted for this side effect, if it is an event.
    pub fn event(&self, url: &str) -> Option<BrokerEvent> {
        let url = url.to_string();
        match self {
            SideEffect::MissingCredentials => Some(BrokerEvent::MissingCredentials { url }),
            SideEffect::Unauthorized => Some(BrokerEvent::Unauthorized { url }),
            SideEffect::NeedUpdate => Some(BrokerEvent::NeedUpdate { url }),
            SideEffect::None | SideEffect::RemoteWipe => None,
        }
    }
}

/// Which body representation a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRead {
    Text,
    Nothing,
}

/// Error raised by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    BadRequest,
    CredentialsMissing,
    Unauthorized,
    ClientOutOfDate,
    ProtocolJoke,
    RemoteWipeTriggered,
}

impl Outcome {
    fn into_error(self, body: String) -> BrokerError {
        match self {
            Outcome::BadRequest => BrokerError::BadRequest { body },
            Outcome::CredentialsMissing => BrokerError::CredentialsMissing { body },
            Outcome::Unauthorized => BrokerError::Unauthorized { body },
            Outcome::ClientOutOfDate => BrokerError::ClientOutOfDate { body },
            Outcome::ProtocolJoke => BrokerError::ProtocolJoke { body },
            Outcome::RemoteWipeTriggered => BrokerError::RemoteWipeTriggered,
        }
    }
}

/// One row of the status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRule {
    pub status: u16,
    pub effect: SideEffect,
    pub read: BodyRead,
    pub outcome: Outcome,
}

pub const STATUS_RULES: [StatusRule; 6] = [
    StatusRule {
        status: 400,
        effect: SideEffect::None,
        read: BodyRead::Text,
        outcome: Outcome::BadRequest,
    },
    StatusRule {
        status: 401,
        effect: SideEffect::MissingCredentials,
        read: BodyRead::Text,
        outcome: Outcome::CredentialsMissing,
    },
    StatusRule {
        status: 403,
        effect: SideEffect::Unauthorized,
        read: BodyRead::Text,
        outcome: Outcome::Unauthorized,
    },
    StatusRule {
        status: 409,
        effect: SideEffect::NeedUpdate,
        read: BodyRead::Text,
        outcome: Outcome::ClientOutOfDate,
    },
    StatusRule {
        status: 418,
        effect: SideEffect::None,
        read: BodyRead::Text,
        outcome: Outcome::ProtocolJoke,
    },
    StatusRule {
        status: 451,
        effect: SideEffect::RemoteWipe,
        read: BodyRead::Nothing,
        outcome: Outcome::RemoteWipeTriggered,
    },
];

/// The signal rule for `status`, if it has one.
pub fn rule_for(status: u16) -> Option<&'static StatusRule> {
    STATUS_RULES.iter().find(|rule| rule.status == status)
}

/// Turns transport responses into values or classified errors for one request.
pub struct Classifier<'a> {
    events: &'a EventBus,
    remote_wipe: &'a dyn RemoteWipe,
    url: &'a str,
}

impl<'a> Classifier<'a> {
    pub fn new(events: &'a EventBus, remote_wipe: &'a dyn RemoteWipe, url: &'a str) -> Self {
        Self {
            events,
            remote_wipe,
            url,
        }
    }

    pub async fn classify(
        &self,
        response: Box<dyn TransportResponse>,
        options: &VerbOptions,
    ) -> Result<ResponseBody, BrokerError> {
        let status = response.status();
        let Some(rule) = rule_for(status) else {
            return decode(response, options).await;
        };

        self.apply(rule.effect);
        let body = match rule.read {
            BodyRead::Text => response
                .text()
                .await
                .map_err(|source| BrokerError::Body { status, source })?,
            BodyRead::Nothing => String::new(),
        };
        let err = rule.outcome.into_error(body);
        warn!(status, url = %self.url, error = %err, "request failed");
        Err(err)
    }

    fn apply(&self, effect: SideEffect) {
        if effect == SideEffect::RemoteWipe {
            warn!(url = %self.url, "server ordered a remote wipe");
            self.remote_wipe.wipe();
        } else if let Some(event) = effect.event(self.url) {
            self.events.emit(&event);
        }
    }
}

/// Decode a response outside the signal table.
async fn decode(
    response: Box<dyn TransportResponse>,
    options: &VerbOptions,
) -> Result<ResponseBody, BrokerError> {
    let status = response.status();
    let ok = response.ok();
    let status_text = response.status_text().to_string();

    let body = if options.blob {
        response.blob().await.map(ResponseBody::Blob)
    } else if options.arraybuffer {
        response.array_buffer().await.map(ResponseBody::ArrayBuffer)
    } else {
        response.json().await.map(ResponseBody::Json)
    }
    .map_err(|source| BrokerError::Body { status, source })?;

    if ok {
        debug!(status, "response decoded");
        return Ok(body);
    }
    let err = BrokerError::RemoteFailure {
        status,
        status_text,
        body,
    };
    warn!(status, error = %err, "request failed");
    Err(err)
}
