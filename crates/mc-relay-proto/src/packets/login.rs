//! Login phase packets.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// LoginStart (0x00): Client → Server.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginStart {
    pub name: String,
}

impl ProtoEncode for LoginStart {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.name);
    }
}

impl ProtoDecode for LoginStart {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            name: codec::read_string(buf)?,
        })
    }
}

/// EncryptionResponse (0x01): Client → Server. Both fields are RSA encrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionResponse {
    pub shared_secret: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl ProtoEncode for EncryptionResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, &self.shared_secret);
        codec::write_byte_array(buf, &self.verify_token);
    }
}

impl ProtoDecode for EncryptionResponse {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            shared_secret: codec::read_byte_array(buf)?,
            verify_token: codec::read_byte_array(buf)?,
        })
    }
}

/// LoginDisconnect (0x00): Server → Client. `reason` is a chat component.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginDisconnect {
    pub reason: String,
}

impl ProtoEncode for LoginDisconnect {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.reason);
    }
}

impl ProtoDecode for LoginDisconnect {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            reason: codec::read_string(buf)?,
        })
    }
}

/// EncryptionRequest (0x01): Server → Client.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionRequest {
    pub server_id: String,
    /// DER-encoded SubjectPublicKeyInfo.
    pub public_key: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl ProtoEncode for EncryptionRequest {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.server_id);
        codec::write_byte_array(buf, &self.public_key);
        codec::write_byte_array(buf, &self.verify_token);
    }
}

impl ProtoDecode for EncryptionRequest {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            server_id: codec::read_string_bounded(buf, 20)?,
            public_key: codec::read_byte_array(buf)?,
            verify_token: codec::read_byte_array(buf)?,
        })
    }
}

/// LoginSuccess (0x02): Server → Client. Switches both sides to play.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginSuccess {
    /// Hyphenated UUID string.
    pub uuid: String,
    pub username: String,
}

impl ProtoEncode for LoginSuccess {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.uuid);
        codec::write_string(buf, &self.username);
    }
}

impl ProtoDecode for LoginSuccess {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            uuid: codec::read_string_bounded(buf, 36)?,
            username: codec::read_string_bounded(buf, 16)?,
        })
    }
}

/// SetCompression (0x03): Server → Client.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCompression {
    pub threshold: i32,
}

impl ProtoEncode for SetCompression {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.threshold).proto_encode(buf);
    }
}

impl ProtoDecode for SetCompression {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            threshold: VarInt::proto_decode(buf)?.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encryption_request_roundtrip() {
        let pkt = EncryptionRequest {
            server_id: "3f2a".into(),
            public_key: vec![0x30, 0x81, 0x9F],
            verify_token: vec![1, 2, 3, 4],
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(EncryptionRequest::proto_decode(&mut buf.freeze()).unwrap(), pkt);
    }

    #[test]
    fn set_compression_is_varint() {
        let mut buf = BytesMut::new();
        SetCompression { threshold: 256 }.proto_encode(&mut buf);
        assert_eq!(&buf[..], &[0x80, 0x02]);
    }

    #[test]
    fn truncated_encryption_response_fails() {
        let wire: &[u8] = &[0x04, 0x01, 0x02];
        assert!(EncryptionResponse::proto_decode(&mut &wire[..]).is_err());
    }
}
