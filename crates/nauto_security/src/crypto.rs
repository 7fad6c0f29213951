use std::io::{Read, Write};

use age::secrecy::SecretString;
use keyring::Entry;

const KEYRING_SERVICE: &str = "netraven";
const KEYRING_MASTER_KEY_ENTRY: &str = "orchestrator-master-key";
const MASTER_KEY_ENV_VAR: &str = "NAUTO_ENCRYPTION_KEY";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("no master key available: set {MASTER_KEY_ENV_VAR} or seed the OS keyring")]
    NoMasterKey,
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Encrypts/decrypts `credentials.password_encrypted` at rest. Backed by
/// `age` passphrase encryption, keyed off a master passphrase resolved from
/// `NAUTO_ENCRYPTION_KEY` first, then the OS keyring.
pub struct CredentialCipher {
    passphrase: String,
}

impl CredentialCipher {
    pub fn from_env_or_keyring() -> Result<Self, CryptoError> {
        let passphrase = resolve_master_key()?;
        Ok(CredentialCipher { passphrase })
    }

    pub fn with_passphrase(passphrase: impl Into<String>) -> Self {
        CredentialCipher {
            passphrase: passphrase.into(),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, CryptoError> {
        let encryptor = age::Encryptor::with_user_passphrase(SecretString::from(self.passphrase.clone()));
        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
        writer
            .write_all(plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
        writer.finish().map_err(|e| CryptoError::Encrypt(e.to_string()))?;
        Ok(encrypted)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<String, CryptoError> {
        let decryptor =
            age::Decryptor::new(ciphertext).map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        let identity = age::scrypt::Identity::new(SecretString::from(self.passphrase.clone()));
        let mut decrypted = vec![];
        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        String::from_utf8(decrypted).map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}

fn resolve_master_key() -> Result<String, CryptoError> {
    if let Ok(key) = std::env::var(MASTER_KEY_ENV_VAR) {
        return Ok(key);
    }
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_MASTER_KEY_ENTRY).map_err(|_| CryptoError::NoMasterKey)?;
    entry.get_password().map_err(|_| CryptoError::NoMasterKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let cipher = CredentialCipher::with_passphrase("correct horse battery staple");
        let ciphertext = cipher.encrypt("hunter2").unwrap();
        assert_ne!(ciphertext, b"hunter2");
        let plaintext = cipher.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, "hunter2");
    }

    #[test]
    fn wrong_passphrase_fails_to_decrypt() {
        let cipher = CredentialCipher::with_passphrase("right-key");
        let ciphertext = cipher.encrypt("hunter2").unwrap();
        let wrong = CredentialCipher::with_passphrase("wrong-key");
        assert!(wrong.decrypt(&ciphertext).is_err());
    }
}
