//! Packet definitions for protocol 47 and the closed [`Packet`] type.

pub mod chat;
pub mod disconnect;
pub mod entity;
pub mod entity_spawn;
pub mod handshake;
pub mod join_game;
pub mod keep_alive;
pub mod login;
pub mod player_list;
pub mod position;
pub mod resource_pack;
pub mod scoreboard;
pub mod status;

pub use chat::{Chat, ClientChat};
pub use disconnect::Disconnect;
pub use entity::{DestroyEntities, EntityEquipment, EntityTeleport, SetEntityMetadata};
pub use entity_spawn::{SpawnMob, SpawnObject, SpawnPlayer};
pub use handshake::Handshake;
pub use join_game::{JoinGame, Respawn};
pub use keep_alive::{ClientKeepAlive, KeepAlive};
pub use login::{
    EncryptionRequest, EncryptionResponse, LoginDisconnect, LoginStart, LoginSuccess,
    SetCompression,
};
pub use player_list::{PlayerListAction, PlayerListEntry, PlayerListItem, ProfileProperty};
pub use position::{ClientLook, ClientPosition, ClientPositionLook, PlayerPositionAndLook};
pub use resource_pack::{ResourcePackResult, ResourcePackSend, ResourcePackStatus};
pub use scoreboard::{
    DisplayScoreboard, ObjectiveAction, ScoreboardObjective, TeamAction, TeamInfo, Teams,
    UpdateScore,
};
pub use status::{ServerStatus, StatusPing, StatusPong, StatusRequest, StatusResponse};

use bytes::{BufMut, Bytes};

use crate::codec::ProtoEncode;

/// The only protocol version spoken on either side.
pub const PROTOCOL_VERSION: i32 = 47;

/// Human-readable name of [`PROTOCOL_VERSION`].
pub const GAME_VERSION: &str = "1.8";

/// Packet IDs by phase and direction.
pub mod id {
    // Handshake, serverbound
    pub const HANDSHAKE: i32 = 0x00;

    // Status
    pub const STATUS_REQUEST: i32 = 0x00;
    pub const STATUS_PING: i32 = 0x01;
    pub const STATUS_RESPONSE: i32 = 0x00;
    pub const STATUS_PONG: i32 = 0x01;

    // Login, serverbound
    pub const LOGIN_START: i32 = 0x00;
    pub const ENCRYPTION_RESPONSE: i32 = 0x01;
    // Login, clientbound
    pub const LOGIN_DISCONNECT: i32 = 0x00;
    pub const ENCRYPTION_REQUEST: i32 = 0x01;
    pub const LOGIN_SUCCESS: i32 = 0x02;
    pub const SET_COMPRESSION: i32 = 0x03;

    // Play, clientbound
    pub const KEEP_ALIVE: i32 = 0x00;
    pub const JOIN_GAME: i32 = 0x01;
    pub const CHAT: i32 = 0x02;
    pub const ENTITY_EQUIPMENT: i32 = 0x04;
    pub const RESPAWN: i32 = 0x07;
    pub const PLAYER_POSITION_AND_LOOK: i32 = 0x08;
    pub const SPAWN_PLAYER: i32 = 0x0C;
    pub const SPAWN_OBJECT: i32 = 0x0E;
    pub const SPAWN_MOB: i32 = 0x0F;
    pub const DESTROY_ENTITIES: i32 = 0x13;
    pub const ENTITY_TELEPORT: i32 = 0x18;
    pub const ENTITY_METADATA: i32 = 0x1C;
    pub const PLAYER_LIST_ITEM: i32 = 0x38;
    pub const SCOREBOARD_OBJECTIVE: i32 = 0x3B;
    pub const UPDATE_SCORE: i32 = 0x3C;
    pub const DISPLAY_SCOREBOARD: i32 = 0x3D;
    pub const TEAMS: i32 = 0x3E;
    pub const DISCONNECT: i32 = 0x40;
    pub const RESOURCE_PACK_SEND: i32 = 0x48;

    // Play, serverbound
    pub const CLIENT_KEEP_ALIVE: i32 = 0x00;
    pub const CLIENT_CHAT: i32 = 0x01;
    pub const CLIENT_POSITION: i32 = 0x04;
    pub const CLIENT_LOOK: i32 = 0x05;
    pub const CLIENT_POSITION_LOOK: i32 = 0x06;
    pub const RESOURCE_PACK_STATUS: i32 = 0x19;
}

/// A packet whose id has no entry in the table for its phase. Forwarded as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownPacket {
    pub id: i32,
    /// Fields after the id.
    pub body: Bytes,
}

macro_rules! define_packets {
    ($($variant:ident => $id:path),* $(,)?) => {
        /// Every packet the relay understands, plus [`UnknownPacket`].
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $($variant($variant),)*
            Unknown(UnknownPacket),
        }

        /// Type tag of a [`Packet`], used to route packets to cache handlers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PacketKind {
            $($variant,)*
            Unknown,
        }

        impl Packet {
            /// Wire id of this packet within its phase.
            pub fn id(&self) -> i32 {
                match self {
                    $(Packet::$variant(_) => $id,)*
                    Packet::Unknown(p) => p.id,
                }
            }

            pub fn kind(&self) -> PacketKind {
                match self {
                    $(Packet::$variant(_) => PacketKind::$variant,)*
                    Packet::Unknown(_) => PacketKind::Unknown,
                }
            }

            /// Write the fields after the id.
            pub fn encode_body(&self, buf: &mut impl BufMut) {
                match self {
                    $(Packet::$variant(p) => p.proto_encode(buf),)*
                    Packet::Unknown(p) => buf.put_slice(&p.body),
                }
            }
        }

        $(
            impl From<$variant> for Packet {
                fn from(p: $variant) -> Self {
                    Packet::$variant(p)
                }
            }
        )*
    };
}

define_packets! {
    Handshake => id::HANDSHAKE,

    StatusRequest => id::STATUS_REQUEST,
    StatusPing => id::STATUS_PING,
    StatusResponse => id::STATUS_RESPONSE,
    StatusPong => id::STATUS_PONG,

    LoginStart => id::LOGIN_START,
    EncryptionResponse => id::ENCRYPTION_RESPONSE,
    LoginDisconnect => id::LOGIN_DISCONNECT,
    EncryptionRequest => id::ENCRYPTION_REQUEST,
    LoginSuccess => id::LOGIN_SUCCESS,
    SetCompression => id::SET_COMPRESSION,

    KeepAlive => id::KEEP_ALIVE,
    JoinGame => id::JOIN_GAME,
    Chat => id::CHAT,
    EntityEquipment => id::ENTITY_EQUIPMENT,
    Respawn => id::RESPAWN,
    PlayerPositionAndLook => id::PLAYER_POSITION_AND_LOOK,
    SpawnPlayer => id::SPAWN_PLAYER,
    SpawnObject => id::SPAWN_OBJECT,
    SpawnMob => id::SPAWN_MOB,
    DestroyEntities => id::DESTROY_ENTITIES,
    EntityTeleport => id::ENTITY_TELEPORT,
    SetEntityMetadata => id::ENTITY_METADATA,
    PlayerListItem => id::PLAYER_LIST_ITEM,
    ScoreboardObjective => id::SCOREBOARD_OBJECTIVE,
    UpdateScore => id::UPDATE_SCORE,
    DisplayScoreboard => id::DISPLAY_SCOREBOARD,
    Teams => id::TEAMS,
    Disconnect => id::DISCONNECT,
    ResourcePackSend => id::RESOURCE_PACK_SEND,

    ClientKeepAlive => id::CLIENT_KEEP_ALIVE,
    ClientChat => id::CLIENT_CHAT,
    ClientPosition => id::CLIENT_POSITION,
    ClientLook => id::CLIENT_LOOK,
    ClientPositionLook => id::CLIENT_POSITION_LOOK,
    ResourcePackStatus => id::RESOURCE_PACK_STATUS,
}
