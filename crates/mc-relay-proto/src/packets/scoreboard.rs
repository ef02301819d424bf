//! Scoreboard packets: Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

// ---------------------------------------------------------------------------
// ScoreboardObjective (0x3B)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveAction {
    Create { display_name: String, render_type: String },
    Remove,
    Update { display_name: String, render_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreboardObjective {
    pub name: String,
    pub action: ObjectiveAction,
}

impl ProtoEncode for ScoreboardObjective {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.name);
        match &self.action {
            ObjectiveAction::Create {
                display_name,
                render_type,
            } => {
                buf.put_i8(0);
                codec::write_string(buf, display_name);
                codec::write_string(buf, render_type);
            }
            ObjectiveAction::Remove => buf.put_i8(1),
            ObjectiveAction::Update {
                display_name,
                render_type,
            } => {
                buf.put_i8(2);
                codec::write_string(buf, display_name);
                codec::write_string(buf, render_type);
            }
        }
    }
}

impl ProtoDecode for ScoreboardObjective {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let name = codec::read_string_bounded(buf, 16)?;
        let action = match codec::read_i8(buf)? {
            1 => ObjectiveAction::Remove,
            mode @ (0 | 2) => {
                let display_name = codec::read_string_bounded(buf, 32)?;
                let render_type = codec::read_string_bounded(buf, 16)?;
                if mode == 0 {
                    ObjectiveAction::Create {
                        display_name,
                        render_type,
                    }
                } else {
                    ObjectiveAction::Update {
                        display_name,
                        render_type,
                    }
                }
            }
            other => {
                return Err(ProtoError::InvalidData(format!(
                    "unknown objective mode {other}"
                )))
            }
        };
        Ok(Self { name, action })
    }
}

// ---------------------------------------------------------------------------
// UpdateScore (0x3C)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateScore {
    pub entry: String,
    /// An empty objective on removal clears the entry from every objective.
    pub objective: String,
    /// `None` removes the score.
    pub value: Option<i32>,
}

impl ProtoEncode for UpdateScore {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.entry);
        buf.put_i8(if self.value.is_some() { 0 } else { 1 });
        codec::write_string(buf, &self.objective);
        if let Some(value) = self.value {
            VarInt(value).proto_encode(buf);
        }
    }
}

impl ProtoDecode for UpdateScore {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let entry = codec::read_string_bounded(buf, 40)?;
        let action = codec::read_i8(buf)?;
        let objective = codec::read_string_bounded(buf, 16)?;
        let value = if action != 1 {
            Some(VarInt::proto_decode(buf)?.0)
        } else {
            None
        };
        Ok(Self {
            entry,
            objective,
            value,
        })
    }
}

// ---------------------------------------------------------------------------
// DisplayScoreboard (0x3D)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayScoreboard {
    /// 0 list, 1 sidebar, 2 below name, 3-18 team sidebars.
    pub position: i8,
    pub objective: String,
}

impl ProtoEncode for DisplayScoreboard {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i8(self.position);
        codec::write_string(buf, &self.objective);
    }
}

impl ProtoDecode for DisplayScoreboard {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            position: codec::read_i8(buf)?,
            objective: codec::read_string_bounded(buf, 16)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Teams (0x3E)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TeamInfo {
    pub display_name: String,
    pub prefix: String,
    pub suffix: String,
    pub friendly_fire: i8,
    pub name_tag_visibility: String,
    pub color: i8,
}

impl TeamInfo {
    fn encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.display_name);
        codec::write_string(buf, &self.prefix);
        codec::write_string(buf, &self.suffix);
        buf.put_i8(self.friendly_fire);
        codec::write_string(buf, &self.name_tag_visibility);
        buf.put_i8(self.color);
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            display_name: codec::read_string_bounded(buf, 32)?,
            prefix: codec::read_string_bounded(buf, 16)?,
            suffix: codec::read_string_bounded(buf, 16)?,
            friendly_fire: codec::read_i8(buf)?,
            name_tag_visibility: codec::read_string_bounded(buf, 32)?,
            color: codec::read_i8(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TeamAction {
    Create { info: TeamInfo, players: Vec<String> },
    Remove,
    UpdateInfo(TeamInfo),
    AddPlayers(Vec<String>),
    RemovePlayers(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Teams {
    pub name: String,
    pub action: TeamAction,
}

fn write_players(buf: &mut impl BufMut, players: &[String]) {
    VarInt(players.len() as i32).proto_encode(buf);
    for player in players {
        codec::write_string(buf, player);
    }
}

fn read_players(buf: &mut impl Buf) -> Result<Vec<String>, ProtoError> {
    let count = codec::read_length(buf)?;
    codec::ensure_remaining(buf, count)?;
    let mut players = Vec::with_capacity(count);
    for _ in 0..count {
        players.push(codec::read_string_bounded(buf, 40)?);
    }
    Ok(players)
}

impl ProtoEncode for Teams {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.name);
        match &self.action {
            TeamAction::Create { info, players } => {
                buf.put_i8(0);
                info.encode(buf);
                write_players(buf, players);
            }
            TeamAction::Remove => buf.put_i8(1),
            TeamAction::UpdateInfo(info) => {
                buf.put_i8(2);
                info.encode(buf);
            }
            TeamAction::AddPlayers(players) => {
                buf.put_i8(3);
                write_players(buf, players);
            }
            TeamAction::RemovePlayers(players) => {
                buf.put_i8(4);
                write_players(buf, players);
            }
        }
    }
}

impl ProtoDecode for Teams {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let name = codec::read_string_bounded(buf, 16)?;
        let action = match codec::read_i8(buf)? {
            0 => TeamAction::Create {
                info: TeamInfo::decode(buf)?,
                players: read_players(buf)?,
            },
            1 => TeamAction::Remove,
            2 => TeamAction::UpdateInfo(TeamInfo::decode(buf)?),
            3 => TeamAction::AddPlayers(read_players(buf)?),
            4 => TeamAction::RemovePlayers(read_players(buf)?),
            other => {
                return Err(ProtoError::InvalidData(format!("unknown team mode {other}")))
            }
        };
        Ok(Self { name, action })
    }
}
