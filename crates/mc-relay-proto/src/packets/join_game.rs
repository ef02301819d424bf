//! JoinGame (0x01) and Respawn (0x07): Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGame {
    pub entity_id: i32,
    /// Bit 3 is the hardcore flag.
    pub gamemode: u8,
    /// -1 nether, 0 overworld, 1 end.
    pub dimension: i8,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,
    pub reduced_debug_info: bool,
}

impl ProtoEncode for JoinGame {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.entity_id);
        buf.put_u8(self.gamemode);
        buf.put_i8(self.dimension);
        buf.put_u8(self.difficulty);
        buf.put_u8(self.max_players);
        codec::write_string(buf, &self.level_type);
        codec::write_bool(buf, self.reduced_debug_info);
    }
}

impl ProtoDecode for JoinGame {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_id: codec::read_i32(buf)?,
            gamemode: codec::read_u8(buf)?,
            dimension: codec::read_i8(buf)?,
            difficulty: codec::read_u8(buf)?,
            max_players: codec::read_u8(buf)?,
            level_type: codec::read_string_bounded(buf, 16)?,
            reduced_debug_info: codec::read_bool(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Respawn {
    pub dimension: i32,
    pub difficulty: u8,
    pub gamemode: u8,
    pub level_type: String,
}

impl Respawn {
    /// The respawn that moves a player into the world described by `join`.
    pub fn from_join(join: &JoinGame) -> Self {
        Self {
            dimension: join.dimension as i32,
            difficulty: join.difficulty,
            gamemode: join.gamemode & 0x07,
            level_type: join.level_type.clone(),
        }
    }
}

impl ProtoEncode for Respawn {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.dimension);
        buf.put_u8(self.difficulty);
        buf.put_u8(self.gamemode);
        codec::write_string(buf, &self.level_type);
    }
}

impl ProtoDecode for Respawn {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            dimension: codec::read_i32(buf)?,
            difficulty: codec::read_u8(buf)?,
            gamemode: codec::read_u8(buf)?,
            level_type: codec::read_string_bounded(buf, 16)?,
        })
    }
}
