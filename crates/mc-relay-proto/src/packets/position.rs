//! Player position packets.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// PlayerPositionAndLook (0x08): Server → Client, teleports the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerPositionAndLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    /// Bit set marks the matching field as relative (x, y, z, y_rot, x_rot).
    pub flags: i8,
}

impl ProtoEncode for PlayerPositionAndLook {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_i8(self.flags);
    }
}

impl ProtoDecode for PlayerPositionAndLook {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            x: codec::read_f64(buf)?,
            y: codec::read_f64(buf)?,
            z: codec::read_f64(buf)?,
            yaw: codec::read_f32(buf)?,
            pitch: codec::read_f32(buf)?,
            flags: codec::read_i8(buf)?,
        })
    }
}

/// Position (0x04): Client → Server.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub on_ground: bool,
}

impl ProtoEncode for ClientPosition {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        codec::write_bool(buf, self.on_ground);
    }
}

impl ProtoDecode for ClientPosition {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            x: codec::read_f64(buf)?,
            y: codec::read_f64(buf)?,
            z: codec::read_f64(buf)?,
            on_ground: codec::read_bool(buf)?,
        })
    }
}

/// Look (0x05): Client → Server.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientLook {
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl ProtoEncode for ClientLook {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        codec::write_bool(buf, self.on_ground);
    }
}

impl ProtoDecode for ClientLook {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            yaw: codec::read_f32(buf)?,
            pitch: codec::read_f32(buf)?,
            on_ground: codec::read_bool(buf)?,
        })
    }
}

/// PositionLook (0x06): Client → Server.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPositionLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl ProtoEncode for ClientPositionLook {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        codec::write_bool(buf, self.on_ground);
    }
}

impl ProtoDecode for ClientPositionLook {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            x: codec::read_f64(buf)?,
            y: codec::read_f64(buf)?,
            z: codec::read_f64(buf)?,
            yaw: codec::read_f32(buf)?,
            pitch: codec::read_f32(buf)?,
            on_ground: codec::read_bool(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn position_and_look_layout() {
        let pkt = PlayerPositionAndLook {
            x: 1.5,
            y: 64.0,
            z: -3.25,
            yaw: 90.0,
            pitch: 0.0,
            flags: 0,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(buf.len(), 8 * 3 + 4 * 2 + 1);
        assert_eq!(PlayerPositionAndLook::proto_decode(&mut buf.freeze()).unwrap(), pkt);
    }
}
