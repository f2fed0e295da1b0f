//! Trusted key material and the signature-verification seam.
//!
//! Validation logic never talks to a PGP implementation directly; it goes
//! through [`Verifier`], so tests can substitute a stub and the crypto
//! backend stays swappable. [`PgpKeyring`] is the production implementation:
//! an immutable set of armored public keys loaded once at bootstrap.

use pgp::composed::{Deserializable, SignedPublicKey, StandaloneSignature};
use pgp::types::PublicKeyTrait;

use crate::error::KeyringError;

/// Checks a detached armored signature over `data` against trusted keys.
///
/// `signer_id` is the hex key id (or fingerprint) claimed by the message;
/// an empty id means "any trusted key".
pub trait Verifier: Send + Sync {
    fn verify(&self, signer_id: &str, signature: &str, data: &[u8]) -> Result<(), KeyringError>;
}

/// The set of public keys authorized to sign actions.
#[derive(Debug)]
pub struct PgpKeyring {
    keys: Vec<SignedPublicKey>,
}

impl PgpKeyring {
    /// Parse one or more armored public key blocks.
    pub fn from_armored(armor: &str) -> Result<Self, KeyringError> {
        let (iter, _headers) = SignedPublicKey::from_string_many(armor)
            .map_err(|e| KeyringError::BadArmor(e.to_string()))?;
        let mut keys = Vec::new();
        for key in iter {
            keys.push(key.map_err(|e| KeyringError::BadArmor(e.to_string()))?);
        }
        if keys.is_empty() {
            return Err(KeyringError::BadArmor("no public keys in keyring".into()));
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn key_id_hex(key: &SignedPublicKey) -> String {
    key.key_id()
        .as_ref()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect()
}

fn matches_signer(key: &SignedPublicKey, signer_id: &str) -> bool {
    let want = signer_id.trim().to_ascii_uppercase();
    let have = key_id_hex(key);
    // Operators may quote the short id, the full key id, or a fingerprint
    // suffix; accept any suffix relationship between the two.
    have == want || have.ends_with(&want) || want.ends_with(&have)
}

impl Verifier for PgpKeyring {
    fn verify(&self, signer_id: &str, signature: &str, data: &[u8]) -> Result<(), KeyringError> {
        let (sig, _headers) = StandaloneSignature::from_string(signature)
            .map_err(|e| KeyringError::BadSignature(e.to_string()))?;

        let mut tried = false;
        for key in &self.keys {
            if !signer_id.is_empty() && !matches_signer(key, signer_id) {
                continue;
            }
            tried = true;
            if sig.verify(key, data).is_ok() {
                return Ok(());
            }
        }
        if !tried {
            Err(KeyringError::UnknownSigner(signer_id.to_string()))
        } else {
            Err(KeyringError::Invalid(signer_id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_armor_is_rejected() {
        let err = PgpKeyring::from_armored("this is not a key").unwrap_err();
        assert!(matches!(err, KeyringError::BadArmor(_)));
    }

    #[test]
    fn empty_input_yields_no_keys() {
        assert!(PgpKeyring::from_armored("").is_err());
    }

    #[test]
    fn truncated_block_is_rejected() {
        let armor = "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQENBF\n";
        assert!(PgpKeyring::from_armored(armor).is_err());
    }
}
