//! Cryptography for the login key exchange: RSA key pair, AES-128-CFB8
//! stream cipher, session server hash, offline-mode UUIDs.

pub mod cipher;
pub mod keys;
pub mod offline;
pub mod server_hash;

pub use cipher::{DecryptCipher, EncryptCipher};
pub use keys::{encrypt_with_public_key, ServerKeyPair};
pub use offline::offline_uuid;
pub use server_hash::server_hash;

use thiserror::Error;

/// Length of the shared AES secret negotiated during login.
pub const SHARED_SECRET_LEN: usize = 16;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("RSA error: {0}")]
    Rsa(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid shared secret length: {0}")]
    InvalidSecretLength(usize),
}

/// Convert a decrypted shared secret into the fixed-size key used by the ciphers.
pub fn shared_secret_from_slice(data: &[u8]) -> Result<[u8; SHARED_SECRET_LEN], CryptoError> {
    <[u8; SHARED_SECRET_LEN]>::try_from(data)
        .map_err(|_| CryptoError::InvalidSecretLength(data.len()))
}

/// Generate a fresh random shared secret (client side of the exchange).
pub fn generate_shared_secret() -> [u8; SHARED_SECRET_LEN] {
    rand::random()
}
