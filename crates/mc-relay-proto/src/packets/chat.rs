//! Chat messages in both play directions.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// Chat (0x02): Server → Client. `json` is a chat component.
#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub json: String,
    /// 0 chat box, 1 system message, 2 action bar.
    pub position: i8,
}

impl ProtoEncode for Chat {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.json);
        buf.put_i8(self.position);
    }
}

impl ProtoDecode for Chat {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            json: codec::read_string(buf)?,
            position: codec::read_i8(buf)?,
        })
    }
}

/// Chat (0x01): Client → Server. Plain text, at most 100 characters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientChat {
    pub message: String,
}

impl ProtoEncode for ClientChat {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.message);
    }
}

impl ProtoDecode for ClientChat {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            message: codec::read_string_bounded(buf, 100)?,
        })
    }
}
