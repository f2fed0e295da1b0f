//! `vigil-core` — wire data model and validation for the vigil platform.
//!
//! Everything that crosses the broker is defined here: the operator-signed
//! [`Action`], the per-agent [`Command`] execution envelope, the [`KeepAlive`]
//! heartbeat, and the [`LogRecord`] correlator type that doubles as the error
//! descriptor carried in failed results.
//!
//! Signature checking is abstracted behind the [`Verifier`] trait so the
//! dispatch logic can be exercised without real key material;
//! [`PgpKeyring`] is the production implementation over armored OpenPGP keys.

pub mod action;
pub mod command;
pub mod error;
pub mod keepalive;
pub mod keyring;
pub mod log;

pub use action::Action;
pub use command::{Command, Status};
pub use error::{KeyringError, ValidationError};
pub use keepalive::KeepAlive;
pub use keyring::{PgpKeyring, Verifier};
pub use log::{LogRecord, Severity};
