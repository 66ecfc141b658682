//! Credential vault: authenticated encryption for third-party secrets at rest.
//!
//! Tokens and opaque budget/account references are sealed with
//! ChaCha20-Poly1305. Every call draws a fresh 12-byte nonce which is
//! prepended to the ciphertext, so the stored form is
//! `nonce (12) || ciphertext || tag (16)`.
//!
//! The key is supplied once at start-up and is read-only afterwards. Keys of
//! any length are accepted: shorter keys are zero-padded and longer keys are
//! truncated to the 32 bytes the cipher needs.

use base64::Engine as _;
use chacha20poly1305::{
    ChaCha20Poly1305, Key, KeyInit, Nonce,
    aead::{Aead, AeadCore, OsRng},
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{EngineError, ResultEngine};

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Key length for ChaCha20-Poly1305 (32 bytes)
pub const KEY_LEN: usize = 32;

/// Auth tag length (16 bytes)
pub const TAG_LEN: usize = 16;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CredentialVault {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Builds a vault from raw key material.
    ///
    /// Fails with [`EngineError::NotConfigured`] when the key is empty.
    pub fn new(key: &[u8]) -> ResultEngine<Self> {
        if key.is_empty() {
            return Err(EngineError::NotConfigured(
                "encryption key has not been supplied".to_string(),
            ));
        }
        let mut padded = [0u8; KEY_LEN];
        let len = key.len().min(KEY_LEN);
        padded[..len].copy_from_slice(&key[..len]);
        Ok(Self { key: padded })
    }

    /// Builds a vault from an optional configured key string.
    pub fn from_config(key: Option<&str>) -> ResultEngine<Self> {
        match key {
            Some(key) => Self::new(key.as_bytes()),
            None => Err(EngineError::NotConfigured(
                "ENCRYPTION_KEY is not set".to_string(),
            )),
        }
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> ResultEngine<Vec<u8>> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher()
            .encrypt(&nonce, plaintext)
            .map_err(|e| EngineError::Crypto(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypts `nonce || ciphertext`. Anything not produced by
    /// [`CredentialVault::encrypt`] under the same key is rejected.
    pub fn decrypt(&self, ciphertext: &[u8]) -> ResultEngine<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(invalid_ciphertext());
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| invalid_ciphertext())
    }

    /// Encrypts a UTF-8 secret into the base64 text stored in the database.
    pub fn encrypt_to_string(&self, plaintext: &str) -> ResultEngine<String> {
        let sealed = self.encrypt(plaintext.as_bytes())?;
        Ok(base64::engine::general_purpose::STANDARD.encode(sealed))
    }

    /// Inverse of [`CredentialVault::encrypt_to_string`].
    pub fn decrypt_string(&self, stored: &str) -> ResultEngine<String> {
        let sealed = base64::engine::general_purpose::STANDARD
            .decode(stored.trim().as_bytes())
            .map_err(|_| invalid_ciphertext())?;
        let plain = self.decrypt(&sealed)?;
        String::from_utf8(plain).map_err(|_| invalid_ciphertext())
    }
}

fn invalid_ciphertext() -> EngineError {
    EngineError::Crypto("invalid ciphertext".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::new(b"a-test-key").unwrap()
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        let vault = vault();
        for input in [&b""[..], b"x", b"ynab-personal-access-token", &[0u8, 255, 7, 9]] {
            let sealed = vault.encrypt(input).unwrap();
            assert_eq!(vault.decrypt(&sealed).unwrap(), input);
        }
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let vault = vault();
        let a = vault.encrypt(b"same").unwrap();
        let b = vault.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_tampered_or_foreign_input() {
        let vault = vault();
        let mut sealed = vault.encrypt(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(vault.decrypt(&sealed).is_err());
        assert!(vault.decrypt(b"short").is_err());
        assert!(vault.decrypt(&[0u8; 64]).is_err());

        let other = CredentialVault::new(b"another-key").unwrap();
        let sealed = vault.encrypt(b"secret").unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn long_keys_are_truncated_and_short_keys_padded() {
        let long = CredentialVault::new(&[7u8; 64]).unwrap();
        let same = CredentialVault::new(&[7u8; KEY_LEN]).unwrap();
        let sealed = long.encrypt(b"hello").unwrap();
        assert_eq!(same.decrypt(&sealed).unwrap(), b"hello");
    }

    #[test]
    fn missing_key_is_not_configured() {
        assert!(matches!(
            CredentialVault::new(b""),
            Err(EngineError::NotConfigured(_))
        ));
        assert!(matches!(
            CredentialVault::from_config(None),
            Err(EngineError::NotConfigured(_))
        ));
    }

    #[test]
    fn string_helpers_round_trip() {
        let vault = vault();
        let stored = vault.encrypt_to_string("budget-123").unwrap();
        assert_eq!(vault.decrypt_string(&stored).unwrap(), "budget-123");
        assert!(vault.decrypt_string("not base64 !!").is_err());
    }
}
