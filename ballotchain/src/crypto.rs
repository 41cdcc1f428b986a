//! Hashing and ballot encryption.
//!
//! All digests are rendered as lowercase hex so they can be stored and
//! compared as plain strings. Casting and verification must both go through
//! these helpers or an honest chain will look tampered.

use crate::*;
use aes_gcm::aead::{generic_array::GenericArray, Aead, NewAead};
use aes_gcm::Aes256Gcm;
use hmac::{Hmac, Mac, NewMac};
use rand::{thread_rng, Rng};
use digest::Digest;
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

const AES_IV_LENGTH: usize = 12;
const AES_KEY_LENGTH: usize = 32;

/// Separates the hex IV from the hex ciphertext in a stored ballot
pub const CIPHERTEXT_SEPARATOR: char = ':';

/// SHA-256 of `data`, as 64 hex characters
pub fn hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash an identifier (IP address, session id) before it goes in an audit log
pub fn hash_identifier(identifier: &str) -> String {
    hash(identifier.as_bytes())
}

/// Keyed one-way hashing of plaintext voter codes.
///
/// Codes are short, so a bare SHA-256 could be reversed by enumerating the
/// code space. HMAC with a server-held secret prevents that.
#[derive(Clone)]
pub struct CodeHasher {
    secret: Vec<u8>,
}

impl CodeHasher {
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::ConfigurationError(
                "code secret must not be empty".to_owned(),
            ));
        }
        Ok(CodeHasher {
            secret: secret.to_vec(),
        })
    }

    /// Hash a normalized plaintext code
    pub fn hash_code(&self, code: &str) -> String {
        let mut mac = match Hmac::<Sha256>::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
        };
        mac.update(code.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for CodeHasher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("CodeHasher(..)")
    }
}

/// AES-256 key used to encrypt ballots
#[derive(Clone, PartialEq, Eq)]
pub struct BallotKey([u8; AES_KEY_LENGTH]);

impl BallotKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != AES_KEY_LENGTH {
            return Err(Error::InvalidKey);
        }
        let mut key = [0u8; AES_KEY_LENGTH];
        key.copy_from_slice(bytes);
        Ok(BallotKey(key))
    }

    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut key = [0u8; AES_KEY_LENGTH];
        thread_rng().fill(&mut key);
        BallotKey(key)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for BallotKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|_| Error::InvalidKey)?;
        BallotKey::from_bytes(&bytes)
    }
}

impl fmt::Debug for BallotKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("BallotKey(..)")
    }
}

/// Encrypt a ballot with AES-256-GCM.
///
/// A fresh random IV is drawn for every call, so encrypting the same ballot
/// twice gives two different ciphertexts. The output is `hex(iv):hex(ciphertext)`.
pub fn encrypt_ballot(plaintext: &[u8], key: Option<&BallotKey>) -> Result<String> {
    let key = key.ok_or_else(|| {
        Error::ConfigurationError("no ballot encryption key configured".to_owned())
    })?;
    let aead = Aes256Gcm::new(GenericArray::from_slice(&key.0));

    let mut iv = [0u8; AES_IV_LENGTH];
    thread_rng().fill(&mut iv);
    let nonce = GenericArray::from_slice(&iv);

    let ciphertext = aead
        .encrypt(nonce, plaintext)
        .map_err(|_| Error::ConfigurationError("ballot encryption failed".to_owned()))?;

    Ok(format!(
        "{}{}{}",
        hex::encode(iv),
        CIPHERTEXT_SEPARATOR,
        hex::encode(ciphertext)
    ))
}

/// Decrypt a ballot produced by `encrypt_ballot`.
///
/// A wrong key, truncated data or a malformed IV / separator all yield
/// `Error::DecryptionError`; the GCM tag guarantees no wrong plaintext is returned.
pub fn decrypt_ballot(ciphertext: &str, key: &BallotKey) -> Result<Vec<u8>> {
    let mut parts = ciphertext.splitn(2, CIPHERTEXT_SEPARATOR);
    let (iv, encrypted) = match (parts.next(), parts.next()) {
        (Some(iv), Some(encrypted)) => (iv, encrypted),
        _ => return Err(Error::DecryptionError),
    };

    let iv = hex::decode(iv).map_err(|_| Error::DecryptionError)?;
    if iv.len() != AES_IV_LENGTH {
        return Err(Error::DecryptionError);
    }
    let encrypted = hex::decode(encrypted).map_err(|_| Error::DecryptionError)?;

    let aead = Aes256Gcm::new(GenericArray::from_slice(&key.0));
    aead.decrypt(GenericArray::from_slice(&iv), encrypted.as_slice())
        .map_err(|_| Error::DecryptionError)
}
