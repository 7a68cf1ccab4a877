//! RSA (PKCS#1 v1.5) body encryption.
//!
//! Bodies larger than a single RSA block are split into blocks of
//! `key_size - 11` bytes; each block encrypts to exactly `key_size` bytes and
//! the ciphertext blocks are concatenated.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use super::SecurityError;

const PKCS1_V15_OVERHEAD: usize = 11;

/// Encrypts outbound bodies with the server's public key
#[derive(Debug, Clone)]
pub struct Encrypter {
    key: RsaPublicKey,
}

impl Encrypter {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Load a PEM public key (`PUBLIC KEY` or `RSA PUBLIC KEY`)
    pub fn from_pem(pem: &str) -> Result<Self, SecurityError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| SecurityError::Key(format!("failed to parse RSA public key: {}", e)))?;
        Ok(Self::new(key))
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, SecurityError> {
        Self::from_pem(&read_pem(path.as_ref())?)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let key_size = self.key.size();
        let chunk_size = key_size - PKCS1_V15_OVERHEAD;
        let mut rng = OsRng;

        let mut ciphertext = Vec::with_capacity((plaintext.len() / chunk_size + 1) * key_size);
        for chunk in plaintext.chunks(chunk_size) {
            let block = self
                .key
                .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
                .map_err(|e| SecurityError::Crypto(format!("encryption failed: {}", e)))?;
            ciphertext.extend_from_slice(&block);
        }
        Ok(ciphertext)
    }
}

/// Decrypts inbound bodies with the server's private key
#[derive(Debug, Clone)]
pub struct Decrypter {
    key: RsaPrivateKey,
}

impl Decrypter {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// Load a PEM private key (`RSA PRIVATE KEY` or `PRIVATE KEY`)
    pub fn from_pem(pem: &str) -> Result<Self, SecurityError> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| SecurityError::Key(format!("failed to parse RSA private key: {}", e)))?;
        Ok(Self::new(key))
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, SecurityError> {
        Self::from_pem(&read_pem(path.as_ref())?)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let key_size = self.key.size();
        if ciphertext.len() % key_size != 0 {
            return Err(SecurityError::Crypto(format!(
                "ciphertext length {} is not a multiple of the key size {}",
                ciphertext.len(),
                key_size
            )));
        }

        let mut plaintext = Vec::with_capacity(ciphertext.len());
        for block in ciphertext.chunks(key_size) {
            let chunk = self
                .key
                .decrypt(Pkcs1v15Encrypt, block)
                .map_err(|e| SecurityError::Crypto(format!("decryption failed: {}", e)))?;
            plaintext.extend_from_slice(&chunk);
        }
        Ok(plaintext)
    }
}

fn read_pem(path: &Path) -> Result<String, SecurityError> {
    std::fs::read_to_string(path)
        .map_err(|e| SecurityError::Key(format!("failed to read key file {}: {}", path.display(), e)))
}
