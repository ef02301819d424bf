//! Length-prefixed framing with optional zlib compression and AES/CFB8.
//!
//! Inbound bytes are decrypted as they are queued, so the buffer always holds
//! plaintext. Outbound frames are compressed first and encrypted last.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use mc_relay_crypto::{DecryptCipher, EncryptCipher, SHARED_SECRET_LEN};

use crate::codec::ProtoEncode;
use crate::compression::{compress, decompress};
use crate::error::ProtoError;
use crate::types::{VarInt, VarIntError};

/// Largest value a 3-byte length prefix can carry.
pub const MAX_FRAME_LEN: usize = 2_097_151;

/// Largest declared uncompressed packet size.
pub const MAX_DECOMPRESSED_LEN: usize = 2_097_152;

/// Length prefixes longer than this are malformed.
const LENGTH_PREFIX_BYTES: usize = 3;

fn threshold_from(threshold: i32) -> Option<usize> {
    usize::try_from(threshold).ok()
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Splits an inbound byte stream into packet bodies (`VarInt id ++ fields`).
#[derive(Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    cipher: Option<DecryptCipher>,
    compression: Option<usize>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the inbound cipher. Bytes already buffered but not yet framed
    /// arrived after the key exchange and are decrypted in place.
    pub fn enable_encryption(&mut self, secret: &[u8; SHARED_SECRET_LEN]) -> Result<(), ProtoError> {
        if self.cipher.is_some() {
            return Err(ProtoError::CipherAlreadySet);
        }
        let mut cipher = DecryptCipher::new(secret);
        cipher.decrypt(&mut self.buffer);
        self.cipher = Some(cipher);
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Enable compression; a negative threshold disables it.
    pub fn set_compression(&mut self, threshold: i32) {
        self.compression = threshold_from(threshold);
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        self.compression
    }

    /// Append raw socket bytes.
    pub fn queue_bytes(&mut self, data: &[u8]) {
        let start = self.buffer.len();
        self.buffer.extend_from_slice(data);
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.decrypt(&mut self.buffer[start..]);
        }
    }

    /// Bytes buffered but not yet consumed as a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Pop the next complete packet body, or `None` if more data is needed.
    pub fn try_next_frame(&mut self) -> Result<Option<Bytes>, ProtoError> {
        loop {
            let (len, prefix) = match VarInt::decode_bounded(&self.buffer, LENGTH_PREFIX_BYTES) {
                Ok((VarInt(len), prefix)) => (len as usize, prefix),
                Err(VarIntError::BufferTooShort) => return Ok(None),
                Err(VarIntError::TooManyBytes { .. }) => return Err(ProtoError::BadFrameLength),
            };
            if len > MAX_FRAME_LEN {
                return Err(ProtoError::FrameTooLarge(len));
            }
            if self.buffer.len() < prefix + len {
                return Ok(None);
            }
            self.buffer.advance(prefix);
            let frame = self.buffer.split_to(len).freeze();
            if frame.is_empty() {
                trace!("skipping empty frame");
                continue;
            }
            return match self.compression {
                Some(threshold) => Self::inflate(frame, threshold).map(Some),
                None => Ok(Some(frame)),
            };
        }
    }

    fn inflate(mut frame: Bytes, threshold: usize) -> Result<Bytes, ProtoError> {
        let (VarInt(data_len), consumed) = VarInt::decode(&frame)?;
        frame.advance(consumed);
        if data_len == 0 {
            return Ok(frame);
        }
        let data_len = usize::try_from(data_len)
            .map_err(|_| ProtoError::InvalidData(format!("negative data length {data_len}")))?;
        if data_len < threshold {
            return Err(ProtoError::InvalidData(format!(
                "compressed packet of {data_len} bytes is below threshold {threshold}"
            )));
        }
        if data_len > MAX_DECOMPRESSED_LEN {
            return Err(ProtoError::FrameTooLarge(data_len));
        }
        decompress(&frame, data_len).map(Bytes::from)
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Wraps packet bodies into wire frames.
#[derive(Default)]
pub struct FrameEncoder {
    cipher: Option<EncryptCipher>,
    compression: Option<usize>,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_encryption(&mut self, secret: &[u8; SHARED_SECRET_LEN]) -> Result<(), ProtoError> {
        if self.cipher.is_some() {
            return Err(ProtoError::CipherAlreadySet);
        }
        self.cipher = Some(EncryptCipher::new(secret));
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Enable compression; a negative threshold disables it.
    pub fn set_compression(&mut self, threshold: i32) {
        self.compression = threshold_from(threshold);
    }

    /// Frame one packet body.
    pub fn encode(&mut self, packet: &[u8]) -> Result<Bytes, ProtoError> {
        let mut body = BytesMut::with_capacity(packet.len() + 5);
        match self.compression {
            Some(threshold) if packet.len() >= threshold => {
                VarInt(packet.len() as i32).proto_encode(&mut body);
                body.extend_from_slice(&compress(packet)?);
            }
            Some(_) => {
                VarInt(0).proto_encode(&mut body);
                body.extend_from_slice(packet);
            }
            None => body.extend_from_slice(packet),
        }
        if body.len() > MAX_FRAME_LEN {
            return Err(ProtoError::FrameTooLarge(body.len()));
        }

        let mut frame = BytesMut::with_capacity(body.len() + LENGTH_PREFIX_BYTES);
        VarInt(body.len() as i32).proto_encode(&mut frame);
        frame.extend_from_slice(&body);
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.encrypt(&mut frame);
        }
        Ok(frame.freeze())
    }
}
