//! PlayerListItem (0x38): Server → Client. Tab-list updates.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// A signed game profile property (usually `textures`).
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}

/// Full entry sent with the add action.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerListEntry {
    pub uuid: Uuid,
    pub name: String,
    pub properties: Vec<ProfileProperty>,
    pub gamemode: i32,
    pub ping: i32,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerListAction {
    AddPlayer(Vec<PlayerListEntry>),
    UpdateGameMode(Vec<(Uuid, i32)>),
    UpdateLatency(Vec<(Uuid, i32)>),
    UpdateDisplayName(Vec<(Uuid, Option<String>)>),
    RemovePlayer(Vec<Uuid>),
}

impl PlayerListAction {
    fn id(&self) -> i32 {
        match self {
            PlayerListAction::AddPlayer(_) => 0,
            PlayerListAction::UpdateGameMode(_) => 1,
            PlayerListAction::UpdateLatency(_) => 2,
            PlayerListAction::UpdateDisplayName(_) => 3,
            PlayerListAction::RemovePlayer(_) => 4,
        }
    }

    fn len(&self) -> usize {
        match self {
            PlayerListAction::AddPlayer(v) => v.len(),
            PlayerListAction::UpdateGameMode(v) | PlayerListAction::UpdateLatency(v) => v.len(),
            PlayerListAction::UpdateDisplayName(v) => v.len(),
            PlayerListAction::RemovePlayer(v) => v.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerListItem {
    pub action: PlayerListAction,
}

impl ProtoEncode for PlayerListItem {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.action.id()).proto_encode(buf);
        VarInt(self.action.len() as i32).proto_encode(buf);
        match &self.action {
            PlayerListAction::AddPlayer(entries) => {
                for entry in entries {
                    codec::write_uuid(buf, &entry.uuid);
                    codec::write_string(buf, &entry.name);
                    VarInt(entry.properties.len() as i32).proto_encode(buf);
                    for prop in &entry.properties {
                        codec::write_string(buf, &prop.name);
                        codec::write_string(buf, &prop.value);
                        codec::write_optional_string(buf, prop.signature.as_deref());
                    }
                    VarInt(entry.gamemode).proto_encode(buf);
                    VarInt(entry.ping).proto_encode(buf);
                    codec::write_optional_string(buf, entry.display_name.as_deref());
                }
            }
            PlayerListAction::UpdateGameMode(entries) | PlayerListAction::UpdateLatency(entries) => {
                for (uuid, value) in entries {
                    codec::write_uuid(buf, uuid);
                    VarInt(*value).proto_encode(buf);
                }
            }
            PlayerListAction::UpdateDisplayName(entries) => {
                for (uuid, display_name) in entries {
                    codec::write_uuid(buf, uuid);
                    codec::write_optional_string(buf, display_name.as_deref());
                }
            }
            PlayerListAction::RemovePlayer(uuids) => {
                for uuid in uuids {
                    codec::write_uuid(buf, uuid);
                }
            }
        }
    }
}

fn read_entries<B: Buf, T>(
    buf: &mut B,
    count: usize,
    mut read: impl FnMut(&mut B) -> Result<T, ProtoError>,
) -> Result<Vec<T>, ProtoError> {
    // every entry starts with a 16 byte uuid
    codec::ensure_remaining(buf, count.saturating_mul(16))?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(read(buf)?);
    }
    Ok(out)
}

fn read_property(buf: &mut impl Buf) -> Result<ProfileProperty, ProtoError> {
    Ok(ProfileProperty {
        name: codec::read_string(buf)?,
        value: codec::read_string(buf)?,
        signature: codec::read_optional_string(buf)?,
    })
}

impl ProtoDecode for PlayerListItem {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let action_id = VarInt::proto_decode(buf)?.0;
        let count = codec::read_length(buf)?;
        let action = match action_id {
            0 => PlayerListAction::AddPlayer(read_entries(buf, count, |buf| {
                let uuid = codec::read_uuid(buf)?;
                let name = codec::read_string_bounded(buf, 16)?;
                let prop_count = codec::read_length(buf)?;
                let mut properties = Vec::new();
                for _ in 0..prop_count {
                    properties.push(read_property(buf)?);
                }
                Ok(PlayerListEntry {
                    uuid,
                    name,
                    properties,
                    gamemode: VarInt::proto_decode(buf)?.0,
                    ping: VarInt::proto_decode(buf)?.0,
                    display_name: codec::read_optional_string(buf)?,
                })
            })?),
            1 | 2 => {
                let entries = read_entries(buf, count, |buf| {
                    Ok((codec::read_uuid(buf)?, VarInt::proto_decode(buf)?.0))
                })?;
                if action_id == 1 {
                    PlayerListAction::UpdateGameMode(entries)
                } else {
                    PlayerListAction::UpdateLatency(entries)
                }
            }
            3 => PlayerListAction::UpdateDisplayName(read_entries(buf, count, |buf| {
                Ok((codec::read_uuid(buf)?, codec::read_optional_string(buf)?))
            })?),
            4 => PlayerListAction::RemovePlayer(read_entries(buf, count, |buf| {
                codec::read_uuid(buf)
            })?),
            other => {
                return Err(ProtoError::InvalidData(format!(
                    "unknown player list action {other}"
                )))
            }
        };
        Ok(Self { action })
    }
}
