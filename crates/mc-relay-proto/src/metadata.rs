//! Entity metadata and item stacks.
//!
//! Metadata is kept as a map of index to typed value so updates can be merged
//! onto a cached entity. Item stacks are carried as raw bytes; their NBT is
//! walked only to find where it ends.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{ensure_remaining, read_f32, read_i16, read_i32, read_i8, read_string, read_u8, write_string, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// Terminates a metadata list.
const METADATA_END: u8 = 0x7F;

/// Deepest NBT nesting accepted inside an item stack.
pub const MAX_NBT_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Float(f32),
    String(String),
    /// Raw item stack bytes.
    Slot(Bytes),
    Position { x: i32, y: i32, z: i32 },
    Rotation { pitch: f32, yaw: f32, roll: f32 },
}

impl MetadataValue {
    fn type_id(&self) -> u8 {
        match self {
            MetadataValue::Byte(_) => 0,
            MetadataValue::Short(_) => 1,
            MetadataValue::Int(_) => 2,
            MetadataValue::Float(_) => 3,
            MetadataValue::String(_) => 4,
            MetadataValue::Slot(_) => 5,
            MetadataValue::Position { .. } => 6,
            MetadataValue::Rotation { .. } => 7,
        }
    }

    fn decode(type_id: u8, buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(match type_id {
            0 => MetadataValue::Byte(read_i8(buf)?),
            1 => MetadataValue::Short(read_i16(buf)?),
            2 => MetadataValue::Int(read_i32(buf)?),
            3 => MetadataValue::Float(read_f32(buf)?),
            4 => MetadataValue::String(read_string(buf)?),
            5 => MetadataValue::Slot(read_slot(buf)?),
            6 => MetadataValue::Position {
                x: read_i32(buf)?,
                y: read_i32(buf)?,
                z: read_i32(buf)?,
            },
            7 => MetadataValue::Rotation {
                pitch: read_f32(buf)?,
                yaw: read_f32(buf)?,
                roll: read_f32(buf)?,
            },
            other => {
                return Err(ProtoError::InvalidData(format!(
                    "unknown metadata type {other}"
                )))
            }
        })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        match self {
            MetadataValue::Byte(v) => buf.put_i8(*v),
            MetadataValue::Short(v) => buf.put_i16(*v),
            MetadataValue::Int(v) => buf.put_i32(*v),
            MetadataValue::Float(v) => buf.put_f32(*v),
            MetadataValue::String(s) => write_string(buf, s),
            MetadataValue::Slot(raw) => buf.put_slice(raw),
            MetadataValue::Position { x, y, z } => {
                buf.put_i32(*x);
                buf.put_i32(*y);
                buf.put_i32(*z);
            }
            MetadataValue::Rotation { pitch, yaw, roll } => {
                buf.put_f32(*pitch);
                buf.put_f32(*yaw);
                buf.put_f32(*roll);
            }
        }
    }
}

/// A set of metadata entries keyed by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMetadata {
    entries: BTreeMap<u8, MetadataValue>,
}

impl EntityMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: u8) -> Option<&MetadataValue> {
        self.entries.get(&index)
    }

    pub fn insert(&mut self, index: u8, value: MetadataValue) {
        self.entries.insert(index & 0x1F, value);
    }

    /// Overlay `update` onto this set; indices present in `update` win.
    pub fn merge(&mut self, update: &EntityMetadata) {
        for (index, value) in &update.entries {
            self.entries.insert(*index, value.clone());
        }
    }
}

impl ProtoEncode for EntityMetadata {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        for (index, value) in &self.entries {
            buf.put_u8((value.type_id() << 5) | (index & 0x1F));
            value.encode(buf);
        }
        buf.put_u8(METADATA_END);
    }
}

impl ProtoDecode for EntityMetadata {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let mut metadata = EntityMetadata::new();
        loop {
            let item = read_u8(buf)?;
            if item == METADATA_END {
                return Ok(metadata);
            }
            let value = MetadataValue::decode(item >> 5, buf)?;
            metadata.insert(item & 0x1F, value);
        }
    }
}

// ---------------------------------------------------------------------------
// Item stacks
// ---------------------------------------------------------------------------

/// The encoding of an empty item slot.
pub fn empty_slot() -> Bytes {
    Bytes::from_static(&[0xFF, 0xFF])
}

/// Read one item stack and return its raw encoding.
pub fn read_slot(buf: &mut impl Buf) -> Result<Bytes, ProtoError> {
    let mut raw = BytesMut::new();
    let item_id = read_i16(buf)?;
    raw.put_i16(item_id);
    if item_id == -1 {
        return Ok(raw.freeze());
    }
    // count (i8) + damage (i16)
    copy(buf, &mut raw, 3)?;
    let tag = read_u8(buf)?;
    raw.put_u8(tag);
    if tag != 0 {
        // root tag name
        let name_len = read_u16_into(buf, &mut raw)?;
        copy(buf, &mut raw, name_len)?;
        skip_tag_payload(buf, &mut raw, tag, 0)?;
    }
    Ok(raw.freeze())
}

fn copy(buf: &mut impl Buf, out: &mut BytesMut, len: usize) -> Result<(), ProtoError> {
    ensure_remaining(buf, len)?;
    out.put(buf.copy_to_bytes(len));
    Ok(())
}

fn read_u16_into(buf: &mut impl Buf, out: &mut BytesMut) -> Result<usize, ProtoError> {
    ensure_remaining(buf, 2)?;
    let value = buf.get_u16();
    out.put_u16(value);
    Ok(value as usize)
}

fn read_len_into(buf: &mut impl Buf, out: &mut BytesMut) -> Result<usize, ProtoError> {
    let len = read_i32(buf)?;
    out.put_i32(len);
    usize::try_from(len).map_err(|_| ProtoError::InvalidData(format!("negative NBT length {len}")))
}

fn skip_tag_payload(
    buf: &mut impl Buf,
    out: &mut BytesMut,
    tag: u8,
    depth: usize,
) -> Result<(), ProtoError> {
    if depth > MAX_NBT_DEPTH {
        return Err(ProtoError::NbtTooDeep(MAX_NBT_DEPTH));
    }
    match tag {
        1 => copy(buf, out, 1),
        2 => copy(buf, out, 2),
        3 | 5 => copy(buf, out, 4),
        4 | 6 => copy(buf, out, 8),
        7 => {
            let len = read_len_into(buf, out)?;
            copy(buf, out, len)
        }
        8 => {
            let len = read_u16_into(buf, out)?;
            copy(buf, out, len)
        }
        9 => {
            let element = read_u8(buf)?;
            out.put_u8(element);
            let len = read_len_into(buf, out)?;
            for _ in 0..len {
                skip_tag_payload(buf, out, element, depth + 1)?;
            }
            Ok(())
        }
        10 => loop {
            let child = read_u8(buf)?;
            out.put_u8(child);
            if child == 0 {
                return Ok(());
            }
            let name_len = read_u16_into(buf, out)?;
            copy(buf, out, name_len)?;
            skip_tag_payload(buf, out, child, depth + 1)?;
        },
        11 => {
            let len = read_len_into(buf, out)?;
            let bytes = len
                .checked_mul(4)
                .ok_or_else(|| ProtoError::InvalidData("int array too long".into()))?;
            copy(buf, out, bytes)
        }
        other => Err(ProtoError::InvalidData(format!("unknown NBT tag {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_and_reencode() {
        let wire: &[u8] = &[
            0x00, 0x20, // index 0, byte 0x20
            0x66, 0x41, 0x20, 0x00, 0x00, // index 6, float 10.0
            0x7F,
        ];
        let metadata = EntityMetadata::proto_decode(&mut &wire[..]).unwrap();
        assert_eq!(metadata.get(0), Some(&MetadataValue::Byte(0x20)));
        assert_eq!(metadata.get(6), Some(&MetadataValue::Float(10.0)));

        let mut out = BytesMut::new();
        metadata.proto_encode(&mut out);
        assert_eq!(&out[..], wire);
    }

    #[test]
    fn merge_overrides_by_index() {
        let mut base = EntityMetadata::new();
        base.insert(0, MetadataValue::Byte(0));
        base.insert(2, MetadataValue::String("Steve".into()));

        let mut update = EntityMetadata::new();
        update.insert(0, MetadataValue::Byte(0x02));
        update.insert(6, MetadataValue::Float(20.0));

        base.merge(&update);
        assert_eq!(base.len(), 3);
        assert_eq!(base.get(0), Some(&MetadataValue::Byte(0x02)));
        assert_eq!(base.get(2), Some(&MetadataValue::String("Steve".into())));
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let wire: &[u8] = &[0x00, 0x20];
        assert!(EntityMetadata::proto_decode(&mut &wire[..]).is_err());
    }

    #[test]
    fn empty_slot_is_two_bytes() {
        let wire: &[u8] = &[0xFF, 0xFF, 0xAA];
        let mut cursor = wire;
        assert_eq!(read_slot(&mut cursor).unwrap(), empty_slot());
        assert_eq!(cursor, &[0xAA]);
    }

    #[test]
    fn slot_with_nbt_is_skipped_structurally() {
        let mut wire = BytesMut::new();
        wire.put_i16(276); // diamond sword
        wire.put_i8(1);
        wire.put_i16(0);
        wire.put_u8(10); // root compound
        wire.put_u16(0);
        wire.put_u8(9); // list "ench"
        wire.put_u16(4);
        wire.put_slice(b"ench");
        wire.put_u8(10);
        wire.put_i32(1);
        wire.put_u8(2); // short "id"
        wire.put_u16(2);
        wire.put_slice(b"id");
        wire.put_i16(16);
        wire.put_u8(0); // end of list element
        wire.put_u8(0); // end of root
        let slot_len = wire.len();
        wire.put_u8(0x7F);

        let mut cursor = wire.freeze();
        let slot = read_slot(&mut cursor).unwrap();
        assert_eq!(slot.len(), slot_len);
        assert_eq!(&cursor[..], &[0x7F]);
    }

    #[test]
    fn nbt_depth_limit() {
        let mut wire = BytesMut::new();
        wire.put_i16(1);
        wire.put_i8(1);
        wire.put_i16(0);
        wire.put_u8(9);
        wire.put_u16(0);
        for _ in 0..(MAX_NBT_DEPTH + 2) {
            wire.put_u8(9);
            wire.put_i32(1);
        }
        let result = read_slot(&mut wire.freeze());
        assert!(matches!(result, Err(ProtoError::NbtTooDeep(_))));
    }
}
