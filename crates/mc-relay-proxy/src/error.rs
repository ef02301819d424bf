//! Proxy-level errors.

use mc_relay_crypto::CryptoError;
use mc_relay_proto::ProtoError;
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("malformed frame: {0}")]
    MalformedFrame(ProtoError),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailure(#[from] AuthError),

    #[error("Already connected")]
    AlreadyConnected,

    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("cipher already installed")]
    CipherAlreadySet,

    #[error("backend {0} already has a viewer")]
    BackendOccupied(String),

    #[error("kicked: {0}")]
    Kicked(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<ProtoError> for ProxyError {
    fn from(e: ProtoError) -> Self {
        match e {
            ProtoError::CipherAlreadySet => ProxyError::CipherAlreadySet,
            other => ProxyError::MalformedFrame(other),
        }
    }
}

impl ProxyError {
    /// Text suitable for showing to a player or recording as a kick reason.
    pub fn reason(&self) -> String {
        match self {
            ProxyError::Kicked(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}
