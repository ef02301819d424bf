//! Handshake (0x00): Client → Server, first packet of every connection.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// Opens a connection and selects the next phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    /// 1 = status, 2 = login.
    pub next_state: i32,
}

impl Handshake {
    pub const NEXT_STATUS: i32 = 1;
    pub const NEXT_LOGIN: i32 = 2;

    /// The address with any Forge marker after a NUL and any trailing dot removed.
    pub fn clean_host(&self) -> &str {
        let host = self
            .server_address
            .split('\0')
            .next()
            .unwrap_or_default();
        host.strip_suffix('.').unwrap_or(host)
    }
}

impl ProtoEncode for Handshake {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.protocol_version).proto_encode(buf);
        codec::write_string(buf, &self.server_address);
        buf.put_u16(self.server_port);
        VarInt(self.next_state).proto_encode(buf);
    }
}

impl ProtoDecode for Handshake {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            protocol_version: VarInt::proto_decode(buf)?.0,
            server_address: codec::read_string_bounded(buf, 255)?,
            server_port: codec::read_u16(buf)?,
            next_state: VarInt::proto_decode(buf)?.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn roundtrip_login_handshake() {
        let pkt = Handshake {
            protocol_version: 47,
            server_address: "localhost".into(),
            server_port: 25565,
            next_state: Handshake::NEXT_LOGIN,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(buf[0], 47);
        let decoded = Handshake::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn clean_host_strips_forge_marker_and_dot() {
        let mut pkt = Handshake {
            protocol_version: 47,
            server_address: "play.example.com.\0FML\0".into(),
            server_port: 25565,
            next_state: 2,
        };
        assert_eq!(pkt.clean_host(), "play.example.com");
        pkt.server_address = "example.org".into();
        assert_eq!(pkt.clean_host(), "example.org");
    }
}
