//! Operator-signed investigation directives.
//!
//! An `Action` is authored and signed by an operator, wrapped into a
//! [`Command`](crate::Command) by the scheduler, and delivered to agents over
//! the broker. The agent trusts nothing about it until [`Action::validate`]
//! has checked the schema, the execution window, and the detached signature.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::keyring::Verifier;

/// An investigation order: what to run, when it is allowed to run, and a
/// detached signature proving an operator authored it.
///
/// Field names are the wire contract; `Order` stays a free string here so
/// that unknown kinds survive decoding and can be answered with a structured
/// rejection instead of a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Order")]
    pub order: String,
    /// Opaque to the agent; handed verbatim to the module.
    #[serde(rename = "Arguments", default)]
    pub arguments: serde_json::Value,
    #[serde(rename = "ScheduledDate")]
    pub scheduled_date: DateTime<Utc>,
    #[serde(rename = "ExpirationDate")]
    pub expiration_date: DateTime<Utc>,
    /// Detached armored signature over [`Action::signable_text`].
    #[serde(rename = "PGPSignature", default)]
    pub pgp_signature: String,
    /// Identifier of the signing key (key id or fingerprint, hex).
    #[serde(rename = "PGPID", default)]
    pub pgp_id: String,
}

impl Action {
    /// Canonical byte string the operator signs.
    ///
    /// `Name`, lowercased `Order`, compact-JSON `Arguments`, and both dates
    /// in second-precision RFC3339, joined by `;`. Signer and agent must
    /// produce this text byte-for-byte identically, so it deliberately
    /// avoids anything locale- or precision-dependent.
    pub fn signable_text(&self) -> Result<String, serde_json::Error> {
        let args = serde_json::to_string(&self.arguments)?;
        Ok(format!(
            "{};{};{};{};{}",
            self.name,
            self.order.to_lowercase(),
            args,
            self.scheduled_date.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.expiration_date.to_rfc3339_opts(SecondsFormat::Secs, true),
        ))
    }

    /// Check schema, expiration, and signature authenticity.
    ///
    /// The scheduled-date gate is the dispatcher's job, not this one's: an
    /// action that is valid but not yet due must be reported differently
    /// from one that is forged or expired.
    pub fn validate(
        &self,
        now: DateTime<Utc>,
        verifier: &dyn Verifier,
    ) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.scheduled_date > self.expiration_date {
            return Err(ValidationError::DatesInverted {
                scheduled: self.scheduled_date,
                expiration: self.expiration_date,
            });
        }
        if now >= self.expiration_date {
            return Err(ValidationError::Expired(self.expiration_date));
        }
        let text = self.signable_text()?;
        verifier.verify(&self.pgp_id, &self.pgp_signature, text.as_bytes())?;
        Ok(())
    }
}
