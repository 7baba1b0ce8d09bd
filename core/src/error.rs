//! Error types for the broker.
//!
//! # Design
//! Statuses the service uses as application signals (400, 401, 403, 409, 418,
//! 451) each get a dedicated variant so callers can match on them. Every
//! other non-2xx response lands in `RemoteFailure` with the decoded body.
//! Transport rejections are wrapped unchanged.

use thiserror::Error;

use crate::http::TransportError;
use crate::types::ResponseBody;

/// Errors returned by the broker's verb methods.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// 400.
    #[error("400 bad request")]
    BadRequest { body: String },

    /// 401: the request carried no usable credentials.
    #[error("401 forbidden")]
    CredentialsMissing { body: String },

    /// 403: credentials are valid but lack permission.
    #[error("403 unauthorized")]
    Unauthorized { body: String },

    /// 409: the server refuses this client build.
    #[error("409 client out of date")]
    ClientOutOfDate { body: String },

    #[error("418 teapot")]
    ProtocolJoke { body: String },

    /// 451: the server ordered a remote wipe. No body is read.
    #[error("451 remote wipe")]
    RemoteWipeTriggered,

    /// Any other non-2xx status.
    #[error("{status}: {status_text} -- {body}")]
    RemoteFailure {
        status: u16,
        status_text: String,
        body: ResponseBody,
    },

    /// The transport rejected the request before producing a response.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A body reader failed after the status was known.
    #[error("failed to read body of {status} response: {source}")]
    Body {
        status: u16,
        #[source]
        source: TransportError,
    },

    /// The request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A decoded body did not match the requested type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Body attached to a classified failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorBody<'a> {
    Text(&'a str),
    Decoded(&'a ResponseBody),
}

impl BrokerError {
    /// HTTP status behind this error, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            BrokerError::BadRequest { .. } => Some(400),
            BrokerError::CredentialsMissing { .. } => Some(401),
            BrokerError::Unauthorized { .. } => Some(403),
            BrokerError::ClientOutOfDate { .. } => Some(409),
            BrokerError::ProtocolJoke { .. } => Some(418),
            BrokerError::RemoteWipeTriggered => Some(451),
            BrokerError::RemoteFailure { status, .. } | BrokerError::Body { status, .. } => {
                Some(*status)
            }
            BrokerError::Transport(_)
            | BrokerError::Serialization(_)
            | BrokerError::Deserialization(_) => None,
        }
    }

    /// Short classification message without the status prefix.
    pub fn message(&self) -> String {
        match self {
            BrokerError::BadRequest { .. } => "bad request".to_string(),
            BrokerError::CredentialsMissing { .. } => "forbidden".to_string(),
            BrokerError::Unauthorized { .. } => "unauthorized".to_string(),
            BrokerError::ClientOutOfDate { .. } => "client out of date".to_string(),
            BrokerError::ProtocolJoke { .. } => "teapot".to_string(),
            BrokerError::RemoteWipeTriggered => "remote wipe".to_string(),
            other => other.to_string(),
        }
    }

    /// Body read before the error was raised, if any.
    pub fn body(&self) -> Option<ErrorBody<'_>> {
        match self {
            BrokerError::BadRequest { body }
            | BrokerError::CredentialsMissing { body }
            | BrokerError::Unauthorized { body }
            | BrokerError::ClientOutOfDate { body }
            | BrokerError::ProtocolJoke { body } => Some(ErrorBody::Text(body)),
            BrokerError::RemoteFailure { body, .. } => Some(ErrorBody::Decoded(body)),
            _ => None,
        }
    }
}
