//! Entity spawn packets: Server → Client.
//!
//! Positions are 32-bit fixed point (block * 32), angles are 1/256 turns.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::metadata::EntityMetadata;
use crate::types::VarInt;

/// SpawnPlayer (0x0C).
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPlayer {
    pub entity_id: i32,
    pub uuid: Uuid,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub yaw: i8,
    pub pitch: i8,
    pub current_item: i16,
    pub metadata: EntityMetadata,
}

impl ProtoEncode for SpawnPlayer {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.entity_id).proto_encode(buf);
        codec::write_uuid(buf, &self.uuid);
        buf.put_i32(self.x);
        buf.put_i32(self.y);
        buf.put_i32(self.z);
        buf.put_i8(self.yaw);
        buf.put_i8(self.pitch);
        buf.put_i16(self.current_item);
        self.metadata.proto_encode(buf);
    }
}

impl ProtoDecode for SpawnPlayer {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_id: VarInt::proto_decode(buf)?.0,
            uuid: codec::read_uuid(buf)?,
            x: codec::read_i32(buf)?,
            y: codec::read_i32(buf)?,
            z: codec::read_i32(buf)?,
            yaw: codec::read_i8(buf)?,
            pitch: codec::read_i8(buf)?,
            current_item: codec::read_i16(buf)?,
            metadata: EntityMetadata::proto_decode(buf)?,
        })
    }
}

/// SpawnObject (0x0E). Velocity is only present when `data` is nonzero.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnObject {
    pub entity_id: i32,
    pub kind: i8,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub pitch: i8,
    pub yaw: i8,
    pub data: i32,
    pub velocity: Option<(i16, i16, i16)>,
}

impl ProtoEncode for SpawnObject {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.entity_id).proto_encode(buf);
        buf.put_i8(self.kind);
        buf.put_i32(self.x);
        buf.put_i32(self.y);
        buf.put_i32(self.z);
        buf.put_i8(self.pitch);
        buf.put_i8(self.yaw);
        buf.put_i32(self.data);
        if self.data != 0 {
            let (vx, vy, vz) = self.velocity.unwrap_or_default();
            buf.put_i16(vx);
            buf.put_i16(vy);
            buf.put_i16(vz);
        }
    }
}

impl ProtoDecode for SpawnObject {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let entity_id = VarInt::proto_decode(buf)?.0;
        let kind = codec::read_i8(buf)?;
        let x = codec::read_i32(buf)?;
        let y = codec::read_i32(buf)?;
        let z = codec::read_i32(buf)?;
        let pitch = codec::read_i8(buf)?;
        let yaw = codec::read_i8(buf)?;
        let data = codec::read_i32(buf)?;
        let velocity = if data != 0 {
            Some((
                codec::read_i16(buf)?,
                codec::read_i16(buf)?,
                codec::read_i16(buf)?,
            ))
        } else {
            None
        };
        Ok(Self {
            entity_id,
            kind,
            x,
            y,
            z,
            pitch,
            yaw,
            data,
            velocity,
        })
    }
}

/// SpawnMob (0x0F).
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnMob {
    pub entity_id: i32,
    pub kind: u8,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub yaw: i8,
    pub pitch: i8,
    pub head_pitch: i8,
    pub velocity: (i16, i16, i16),
    pub metadata: EntityMetadata,
}

impl ProtoEncode for SpawnMob {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.entity_id).proto_encode(buf);
        buf.put_u8(self.kind);
        buf.put_i32(self.x);
        buf.put_i32(self.y);
        buf.put_i32(self.z);
        buf.put_i8(self.yaw);
        buf.put_i8(self.pitch);
        buf.put_i8(self.head_pitch);
        buf.put_i16(self.velocity.0);
        buf.put_i16(self.velocity.1);
        buf.put_i16(self.velocity.2);
        self.metadata.proto_encode(buf);
    }
}

impl ProtoDecode for SpawnMob {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_id: VarInt::proto_decode(buf)?.0,
            kind: codec::read_u8(buf)?,
            x: codec::read_i32(buf)?,
            y: codec::read_i32(buf)?,
            z: codec::read_i32(buf)?,
            yaw: codec::read_i8(buf)?,
            pitch: codec::read_i8(buf)?,
            head_pitch: codec::read_i8(buf)?,
            velocity: (
                codec::read_i16(buf)?,
                codec::read_i16(buf)?,
                codec::read_i16(buf)?,
            ),
            metadata: EntityMetadata::proto_decode(buf)?,
        })
    }
}
