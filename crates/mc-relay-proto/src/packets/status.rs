//! Server list ping packets (status phase).

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// StatusRequest (0x00): Client → Server. No fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusRequest;

impl ProtoEncode for StatusRequest {
    fn proto_encode(&self, _buf: &mut impl BufMut) {}
}

impl ProtoDecode for StatusRequest {
    fn proto_decode(_buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self)
    }
}

/// StatusResponse (0x00): Server → Client.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub json: String,
}

impl ProtoEncode for StatusResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.json);
    }
}

impl ProtoDecode for StatusResponse {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            json: codec::read_string(buf)?,
        })
    }
}

/// StatusPing (0x01): Client → Server.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPing {
    pub payload: i64,
}

impl ProtoEncode for StatusPing {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.payload);
    }
}

impl ProtoDecode for StatusPing {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            payload: codec::read_i64(buf)?,
        })
    }
}

/// StatusPong (0x01): Server → Client, echoes the ping payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPong {
    pub payload: i64,
}

impl ProtoEncode for StatusPong {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.payload);
    }
}

impl ProtoDecode for StatusPong {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            payload: codec::read_i64(buf)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Status JSON body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerStatus {
    pub version: StatusVersion,
    pub players: StatusPlayers,
    pub description: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusPlayers {
    pub max: i32,
    pub online: i32,
}

impl ServerStatus {
    pub fn new(motd: &str, online: i32, max: i32) -> Self {
        Self {
            version: StatusVersion {
                name: super::GAME_VERSION.to_string(),
                protocol: super::PROTOCOL_VERSION,
            },
            players: StatusPlayers { max, online },
            description: serde_json::json!({ "text": motd }),
        }
    }

    pub fn to_packet(&self) -> Result<StatusResponse, ProtoError> {
        let json = serde_json::to_string(self).map_err(|e| ProtoError::InvalidData(e.to_string()))?;
        Ok(StatusResponse { json })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn status_json_shape() {
        let status = ServerStatus::new("mc-relay", 2, 5);
        let pkt = status.to_packet().unwrap();
        let value: serde_json::Value = serde_json::from_str(&pkt.json).unwrap();
        assert_eq!(value["version"]["protocol"], 47);
        assert_eq!(value["players"]["online"], 2);
        assert_eq!(value["players"]["max"], 5);
        assert_eq!(value["description"]["text"], "mc-relay");
    }

    #[test]
    fn ping_payload_is_big_endian() {
        let mut buf = BytesMut::new();
        StatusPong { payload: 1 }.proto_encode(&mut buf);
        assert_eq!(&buf[..], &[0, 0, 0, 0, 0, 0, 0, 1]);
        let ping = StatusPing::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(ping.payload, 1);
    }
}
