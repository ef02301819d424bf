//! Resource pack offer and answer.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// ResourcePackSend (0x48): Server → Client.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePackSend {
    pub url: String,
    pub hash: String,
}

impl ProtoEncode for ResourcePackSend {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.url);
        codec::write_string(buf, &self.hash);
    }
}

impl ProtoDecode for ResourcePackSend {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            url: codec::read_string(buf)?,
            hash: codec::read_string_bounded(buf, 40)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePackResult {
    SuccessfullyLoaded,
    Declined,
    FailedDownload,
    Accepted,
}

impl ResourcePackResult {
    pub fn to_id(self) -> i32 {
        match self {
            ResourcePackResult::SuccessfullyLoaded => 0,
            ResourcePackResult::Declined => 1,
            ResourcePackResult::FailedDownload => 2,
            ResourcePackResult::Accepted => 3,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(ResourcePackResult::SuccessfullyLoaded),
            1 => Some(ResourcePackResult::Declined),
            2 => Some(ResourcePackResult::FailedDownload),
            3 => Some(ResourcePackResult::Accepted),
            _ => None,
        }
    }
}

/// ResourcePackStatus (0x19): Client → Server.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePackStatus {
    pub hash: String,
    pub result: ResourcePackResult,
}

impl ProtoEncode for ResourcePackStatus {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.hash);
        VarInt(self.result.to_id()).proto_encode(buf);
    }
}

impl ProtoDecode for ResourcePackStatus {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let hash = codec::read_string_bounded(buf, 40)?;
        let id = VarInt::proto_decode(buf)?.0;
        let result = ResourcePackResult::from_id(id)
            .ok_or_else(|| ProtoError::InvalidData(format!("unknown resource pack result {id}")))?;
        Ok(Self { hash, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn status_roundtrip() {
        let pkt = ResourcePackStatus {
            hash: "abc".into(),
            result: ResourcePackResult::Accepted,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(&buf[..], &[0x03, b'a', b'b', b'c', 0x03]);
        assert_eq!(ResourcePackStatus::proto_decode(&mut buf.freeze()).unwrap(), pkt);
    }

    #[test]
    fn unknown_result_rejected() {
        let wire: &[u8] = &[0x00, 0x07];
        assert!(ResourcePackStatus::proto_decode(&mut &wire[..]).is_err());
    }
}
