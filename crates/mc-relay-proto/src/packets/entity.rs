//! Entity update packets: Server → Client.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::metadata::{read_slot, EntityMetadata};
use crate::types::VarInt;

/// EntityTeleport (0x18).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTeleport {
    pub entity_id: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub yaw: i8,
    pub pitch: i8,
    pub on_ground: bool,
}

impl ProtoEncode for EntityTeleport {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.entity_id).proto_encode(buf);
        buf.put_i32(self.x);
        buf.put_i32(self.y);
        buf.put_i32(self.z);
        buf.put_i8(self.yaw);
        buf.put_i8(self.pitch);
        codec::write_bool(buf, self.on_ground);
    }
}

impl ProtoDecode for EntityTeleport {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_id: VarInt::proto_decode(buf)?.0,
            x: codec::read_i32(buf)?,
            y: codec::read_i32(buf)?,
            z: codec::read_i32(buf)?,
            yaw: codec::read_i8(buf)?,
            pitch: codec::read_i8(buf)?,
            on_ground: codec::read_bool(buf)?,
        })
    }
}

/// DestroyEntities (0x13). Batches any number of ids.
#[derive(Debug, Clone, PartialEq)]
pub struct DestroyEntities {
    pub entity_ids: Vec<i32>,
}

impl ProtoEncode for DestroyEntities {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.entity_ids.len() as i32).proto_encode(buf);
        for id in &self.entity_ids {
            VarInt(*id).proto_encode(buf);
        }
    }
}

impl ProtoDecode for DestroyEntities {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let count = codec::read_length(buf)?;
        // every id takes at least one byte
        codec::ensure_remaining(buf, count)?;
        let mut entity_ids = Vec::with_capacity(count);
        for _ in 0..count {
            entity_ids.push(VarInt::proto_decode(buf)?.0);
        }
        Ok(Self { entity_ids })
    }
}

/// EntityMetadata (0x1C).
#[derive(Debug, Clone, PartialEq)]
pub struct SetEntityMetadata {
    pub entity_id: i32,
    pub metadata: EntityMetadata,
}

impl ProtoEncode for SetEntityMetadata {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.entity_id).proto_encode(buf);
        self.metadata.proto_encode(buf);
    }
}

impl ProtoDecode for SetEntityMetadata {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_id: VarInt::proto_decode(buf)?.0,
            metadata: EntityMetadata::proto_decode(buf)?,
        })
    }
}

/// EntityEquipment (0x04). Slot 0 is the held item, 1-4 armor.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEquipment {
    pub entity_id: i32,
    pub slot: i16,
    /// Raw item stack.
    pub item: Bytes,
}

impl ProtoEncode for EntityEquipment {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.entity_id).proto_encode(buf);
        buf.put_i16(self.slot);
        buf.put_slice(&self.item);
    }
}

impl ProtoDecode for EntityEquipment {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_id: VarInt::proto_decode(buf)?.0,
            slot: codec::read_i16(buf)?,
            item: read_slot(buf)?,
        })
    }
}
