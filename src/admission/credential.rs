use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use super::AdmissionError;

/// Passkey seeded into an empty store.
pub const DEFAULT_PASSKEY: &str = "default_passkey";

/// The single shared passkey.
#[derive(Debug, Clone)]
pub struct Credential {
    secret: SecretString,
}

impl Credential {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Byte-for-byte comparison in constant time with respect to the contents.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        let stored = self.secret.expose_secret().as_bytes();
        let candidate = candidate.as_bytes();

        // ct_eq on slices of different lengths is already false; only the length leaks.
        bool::from(stored.ct_eq(candidate))
    }

    /// Replaces the stored secret.
    ///
    /// # Errors
    /// Returns `AdmissionError::InvalidInput` if `secret` is empty.
    pub fn rotate(&mut self, secret: SecretString) -> Result<(), AdmissionError> {
        Self::check(&secret)?;
        self.secret = secret;
        Ok(())
    }

    /// Rejects secrets that may not be stored.
    ///
    /// # Errors
    /// Returns `AdmissionError::InvalidInput` if `secret` is empty.
    pub fn check(secret: &SecretString) -> Result<(), AdmissionError> {
        if secret.expose_secret().is_empty() {
            return Err(AdmissionError::InvalidInput(
                "passkey must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::new(SecretString::from(DEFAULT_PASSKEY))
    }
}
