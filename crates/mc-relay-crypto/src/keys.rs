//! RSA key pair used for the login encryption handshake.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::CryptoError;

/// Key size mandated by the protocol.
const KEY_BITS: usize = 1024;

/// Proxy-side RSA key pair, generated once at startup and shared by every
/// front-end connection.
#[derive(Clone)]
pub struct ServerKeyPair {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
}

impl ServerKeyPair {
    /// Generate a new random 1024-bit key pair.
    pub fn generate() -> Result<Self, CryptoError> {
        let private =
            RsaPrivateKey::new(&mut OsRng, KEY_BITS).map_err(|e| CryptoError::Rsa(e.to_string()))?;
        let public_der = RsaPublicKey::from(&private)
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self {
            private,
            public_der,
        })
    }

    /// The public key as SPKI DER bytes, as sent in the encryption request.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// Decrypt a PKCS#1 v1.5 block sent by the client.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private
            .decrypt(Pkcs1v15Encrypt, data)
            .map_err(|e| CryptoError::Rsa(e.to_string()))
    }
}

/// Encrypt `data` with a server's SPKI DER public key (client side of the exchange).
pub fn encrypt_with_public_key(public_der: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let public = RsaPublicKey::from_public_key_der(public_der)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    public
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
        .map_err(|e| CryptoError::Rsa(e.to_string()))
}
