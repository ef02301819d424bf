//! KeepAlive (0x00) in both play directions.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// Server → Client probe.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepAlive {
    pub id: i32,
}

/// Client → Server answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientKeepAlive {
    pub id: i32,
}

impl ProtoEncode for KeepAlive {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.id).proto_encode(buf);
    }
}

impl ProtoDecode for KeepAlive {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            id: VarInt::proto_decode(buf)?.0,
        })
    }
}

impl ProtoEncode for ClientKeepAlive {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.id).proto_encode(buf);
    }
}

impl ProtoDecode for ClientKeepAlive {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            id: VarInt::proto_decode(buf)?.0,
        })
    }
}
