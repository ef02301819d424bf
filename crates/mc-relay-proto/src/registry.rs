//! `(direction, phase, id)` lookup table for packet decoding.

use bytes::{Buf, Bytes, BytesMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::*;
use crate::state::{Direction, ProtocolPhase};
use crate::types::VarInt;

/// Decode one packet body (`VarInt id ++ fields`) received in `phase`.
///
/// Ids without a table entry come back as [`Packet::Unknown`].
pub fn decode_packet(
    direction: Direction,
    phase: ProtocolPhase,
    mut frame: Bytes,
) -> Result<Packet, ProtoError> {
    let packet_id = VarInt::proto_decode(&mut frame)?.0;
    let buf = &mut frame;

    use Direction::{Clientbound as S, Serverbound as C};
    use ProtocolPhase as P;

    let packet = match (direction, phase, packet_id) {
        (C, P::Handshake, id::HANDSHAKE) => Handshake::proto_decode(buf)?.into(),

        (C, P::Status, id::STATUS_REQUEST) => StatusRequest::proto_decode(buf)?.into(),
        (C, P::Status, id::STATUS_PING) => StatusPing::proto_decode(buf)?.into(),
        (S, P::Status, id::STATUS_RESPONSE) => StatusResponse::proto_decode(buf)?.into(),
        (S, P::Status, id::STATUS_PONG) => StatusPong::proto_decode(buf)?.into(),

        (C, P::Login, id::LOGIN_START) => LoginStart::proto_decode(buf)?.into(),
        (C, P::Login, id::ENCRYPTION_RESPONSE) => EncryptionResponse::proto_decode(buf)?.into(),
        (S, P::Login, id::LOGIN_DISCONNECT) => LoginDisconnect::proto_decode(buf)?.into(),
        (S, P::Login, id::ENCRYPTION_REQUEST) => EncryptionRequest::proto_decode(buf)?.into(),
        (S, P::Login, id::LOGIN_SUCCESS) => LoginSuccess::proto_decode(buf)?.into(),
        (S, P::Login, id::SET_COMPRESSION) => SetCompression::proto_decode(buf)?.into(),

        (S, P::Play, id::KEEP_ALIVE) => KeepAlive::proto_decode(buf)?.into(),
        (S, P::Play, id::JOIN_GAME) => JoinGame::proto_decode(buf)?.into(),
        (S, P::Play, id::CHAT) => Chat::proto_decode(buf)?.into(),
        (S, P::Play, id::ENTITY_EQUIPMENT) => EntityEquipment::proto_decode(buf)?.into(),
        (S, P::Play, id::RESPAWN) => Respawn::proto_decode(buf)?.into(),
        (S, P::Play, id::PLAYER_POSITION_AND_LOOK) => PlayerPositionAndLook::proto_decode(buf)?.into(),
        (S, P::Play, id::SPAWN_PLAYER) => SpawnPlayer::proto_decode(buf)?.into(),
        (S, P::Play, id::SPAWN_OBJECT) => SpawnObject::proto_decode(buf)?.into(),
        (S, P::Play, id::SPAWN_MOB) => SpawnMob::proto_decode(buf)?.into(),
        (S, P::Play, id::DESTROY_ENTITIES) => DestroyEntities::proto_decode(buf)?.into(),
        (S, P::Play, id::ENTITY_TELEPORT) => EntityTeleport::proto_decode(buf)?.into(),
        (S, P::Play, id::ENTITY_METADATA) => SetEntityMetadata::proto_decode(buf)?.into(),
        (S, P::Play, id::PLAYER_LIST_ITEM) => PlayerListItem::proto_decode(buf)?.into(),
        (S, P::Play, id::SCOREBOARD_OBJECTIVE) => ScoreboardObjective::proto_decode(buf)?.into(),
        (S, P::Play, id::UPDATE_SCORE) => UpdateScore::proto_decode(buf)?.into(),
        (S, P::Play, id::DISPLAY_SCOREBOARD) => DisplayScoreboard::proto_decode(buf)?.into(),
        (S, P::Play, id::TEAMS) => Teams::proto_decode(buf)?.into(),
        (S, P::Play, id::DISCONNECT) => Disconnect::proto_decode(buf)?.into(),
        (S, P::Play, id::RESOURCE_PACK_SEND) => ResourcePackSend::proto_decode(buf)?.into(),

        (C, P::Play, id::CLIENT_KEEP_ALIVE) => ClientKeepAlive::proto_decode(buf)?.into(),
        (C, P::Play, id::CLIENT_CHAT) => ClientChat::proto_decode(buf)?.into(),
        (C, P::Play, id::CLIENT_POSITION) => ClientPosition::proto_decode(buf)?.into(),
        (C, P::Play, id::CLIENT_LOOK) => ClientLook::proto_decode(buf)?.into(),
        (C, P::Play, id::CLIENT_POSITION_LOOK) => ClientPositionLook::proto_decode(buf)?.into(),
        (C, P::Play, id::RESOURCE_PACK_STATUS) => ResourcePackStatus::proto_decode(buf)?.into(),

        _ => Packet::Unknown(UnknownPacket {
            id: packet_id,
            body: buf.copy_to_bytes(buf.remaining()),
        }),
    };
    Ok(packet)
}

/// Encode a packet body (`VarInt id ++ fields`), ready for a [`crate::FrameEncoder`].
pub fn encode_packet(packet: &Packet) -> Bytes {
    let mut buf = BytesMut::new();
    VarInt(packet.id()).proto_encode(&mut buf);
    packet.encode_body(&mut buf);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_id_resolves_by_phase() {
        let body = encode_packet(&Packet::LoginStart(LoginStart {
            name: "Alice".into(),
        }));
        let login = decode_packet(Direction::Serverbound, ProtocolPhase::Login, body.clone()).unwrap();
        assert_eq!(login.kind(), PacketKind::LoginStart);

        // status treats id 0 as an empty request
        let status = decode_packet(Direction::Serverbound, ProtocolPhase::Status, body).unwrap();
        assert_eq!(status.kind(), PacketKind::StatusRequest);
    }

    #[test]
    fn same_id_resolves_by_direction() {
        let body = encode_packet(&KeepAlive { id: 77 }.into());
        let s = decode_packet(Direction::Clientbound, ProtocolPhase::Play, body.clone()).unwrap();
        let c = decode_packet(Direction::Serverbound, ProtocolPhase::Play, body).unwrap();
        assert_eq!(s, Packet::KeepAlive(KeepAlive { id: 77 }));
        assert_eq!(c, Packet::ClientKeepAlive(ClientKeepAlive { id: 77 }));
    }

    #[test]
    fn unknown_id_is_preserved() {
        let raw = Bytes::from_static(&[0x21, 0xDE, 0xAD, 0xBE, 0xEF]);
        let packet = decode_packet(Direction::Clientbound, ProtocolPhase::Play, raw.clone()).unwrap();
        assert_eq!(packet.kind(), PacketKind::Unknown);
        assert_eq!(packet.id(), 0x21);
        assert_eq!(encode_packet(&packet), raw);
    }

    #[test]
    fn known_packet_reencodes_identically() {
        let original = encode_packet(
            &DestroyEntities {
                entity_ids: vec![1, 2, 3],
            }
            .into(),
        );
        let packet = decode_packet(Direction::Clientbound, ProtocolPhase::Play, original.clone()).unwrap();
        assert_eq!(encode_packet(&packet), original);
    }

    #[test]
    fn truncated_known_packet_is_an_error() {
        let raw = Bytes::from_static(&[0x18, 0x05, 0x00]);
        assert!(decode_packet(Direction::Clientbound, ProtocolPhase::Play, raw).is_err());
    }
}
