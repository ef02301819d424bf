//! AES-128-CFB8 stream encryption.
//!
//! The shared secret doubles as the IV. Each direction keeps one continuous
//! cipher stream for the lifetime of the connection, so the halves are
//! separate types owned by the reading and writing sides.

use aes::Aes128;
use cfb8::cipher::generic_array::GenericArray;
use cfb8::cipher::KeyIvInit;
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut};
use cfb8::{Decryptor, Encryptor};

use crate::SHARED_SECRET_LEN;

/// Outbound half: encrypts bytes in place.
pub struct EncryptCipher {
    cipher: Encryptor<Aes128>,
}

impl EncryptCipher {
    pub fn new(secret: &[u8; SHARED_SECRET_LEN]) -> Self {
        Self {
            cipher: Encryptor::<Aes128>::new(secret.into(), secret.into()),
        }
    }

    /// Encrypt `data` in place, advancing the stream.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        // Byte-by-byte keeps the CFB8 shift register continuous across calls.
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(std::slice::from_ref(byte));
            self.cipher.encrypt_block_mut(&mut block);
            *byte = block[0];
        }
    }
}

/// Inbound half: decrypts bytes in place.
pub struct DecryptCipher {
    cipher: Decryptor<Aes128>,
}

impl DecryptCipher {
    pub fn new(secret: &[u8; SHARED_SECRET_LEN]) -> Self {
        Self {
            cipher: Decryptor::<Aes128>::new(secret.into(), secret.into()),
        }
    }

    /// Decrypt `data` in place, advancing the stream.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(std::slice::from_ref(byte));
            self.cipher.decrypt_block_mut(&mut block);
            *byte = block[0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 16] = [0x42; 16];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut enc = EncryptCipher::new(&SECRET);
        let mut dec = DecryptCipher::new(&SECRET);

        let plain = b"hello from the relay".to_vec();
        let mut data = plain.clone();
        enc.encrypt(&mut data);
        assert_ne!(data, plain);
        // Stream cipher: no padding
        assert_eq!(data.len(), plain.len());

        dec.decrypt(&mut data);
        assert_eq!(data, plain);
    }

    #[test]
    fn stream_is_continuous_across_calls() {
        let mut enc_once = EncryptCipher::new(&SECRET);
        let mut whole = b"abcdefghijklmnop".to_vec();
        enc_once.encrypt(&mut whole);

        let mut enc_split = EncryptCipher::new(&SECRET);
        let mut first = b"abcdefg".to_vec();
        let mut second = b"hijklmnop".to_vec();
        enc_split.encrypt(&mut first);
        enc_split.encrypt(&mut second);

        first.extend_from_slice(&second);
        assert_eq!(first, whole);
    }

    #[test]
    fn wrong_key_does_not_decrypt() {
        let mut enc = EncryptCipher::new(&SECRET);
        let mut dec = DecryptCipher::new(&[0x01; 16]);

        let mut data = b"secret payload".to_vec();
        enc.encrypt(&mut data);
        dec.decrypt(&mut data);
        assert_ne!(&data[..], b"secret payload");
    }
}
