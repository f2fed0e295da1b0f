use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons an action is refused before any side effect.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("action name is empty")]
    EmptyName,

    #[error("scheduled date {scheduled} is after expiration date {expiration}")]
    DatesInverted {
        scheduled: DateTime<Utc>,
        expiration: DateTime<Utc>,
    },

    #[error("action expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("arguments are not serializable: {0}")]
    Arguments(#[from] serde_json::Error),

    #[error("signature rejected: {0}")]
    Signature(#[from] KeyringError),
}

#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("malformed armored key material: {0}")]
    BadArmor(String),

    #[error("no trusted key matches signer '{0}'")]
    UnknownSigner(String),

    #[error("malformed signature: {0}")]
    BadSignature(String),

    #[error("signature does not verify against key {0}")]
    Invalid(String),
}
