//! Entities visible to the backend's player.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use uuid::Uuid;

use mc_relay_proto::metadata::EntityMetadata;
use mc_relay_proto::packets::{
    DestroyEntities, EntityEquipment, SetEntityMetadata, SpawnMob, SpawnObject, SpawnPlayer,
};
use mc_relay_proto::{Packet, PacketKind};

use super::{CacheHandler, Viewer};

/// What kind of spawn packet recreates the entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player { uuid: Uuid, current_item: i16 },
    Object { kind: i8, data: i32, velocity: Option<(i16, i16, i16)> },
    Mob { kind: u8, head_pitch: i8, velocity: (i16, i16, i16) },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntity {
    pub kind: EntityKind,
    /// Fixed point (block * 32).
    pub position: (i32, i32, i32),
    /// (yaw, pitch) in 1/256 turns.
    pub rotation: (i8, i8),
    pub metadata: EntityMetadata,
    pub equipment: BTreeMap<i16, Bytes>,
}

impl CachedEntity {
    fn spawn_packet(&self, entity_id: i32) -> Packet {
        let (x, y, z) = self.position;
        let (yaw, pitch) = self.rotation;
        match &self.kind {
            EntityKind::Player { uuid, current_item } => SpawnPlayer {
                entity_id,
                uuid: *uuid,
                x,
                y,
                z,
                yaw,
                pitch,
                current_item: *current_item,
                metadata: self.metadata.clone(),
            }
            .into(),
            EntityKind::Object {
                kind,
                data,
                velocity,
            } => SpawnObject {
                entity_id,
                kind: *kind,
                x,
                y,
                z,
                pitch,
                yaw,
                data: *data,
                velocity: *velocity,
            }
            .into(),
            EntityKind::Mob {
                kind,
                head_pitch,
                velocity,
            } => SpawnMob {
                entity_id,
                kind: *kind,
                x,
                y,
                z,
                yaw,
                pitch,
                head_pitch: *head_pitch,
                velocity: *velocity,
                metadata: self.metadata.clone(),
            }
            .into(),
        }
    }

    /// Object spawns carry no metadata field of their own.
    fn needs_metadata_packet(&self) -> bool {
        matches!(self.kind, EntityKind::Object { .. }) && !self.metadata.is_empty()
    }
}

/// Entity map kept in first-spawn order.
#[derive(Debug, Default)]
pub struct EntityCache {
    entities: HashMap<i32, CachedEntity>,
    order: Vec<i32>,
}

impl EntityCache {
    pub fn get(&self, entity_id: i32) -> Option<&CachedEntity> {
        self.entities.get(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity ids in replay order.
    pub fn ids(&self) -> &[i32] {
        &self.order
    }

    fn spawn(&mut self, entity_id: i32, entity: CachedEntity) {
        if self.entities.insert(entity_id, entity).is_none() {
            self.order.push(entity_id);
        }
    }

    fn clear(&mut self) {
        self.entities.clear();
        self.order.clear();
    }
}

impl CacheHandler for EntityCache {
    fn observed(&self) -> &'static [PacketKind] {
        &[
            PacketKind::SpawnPlayer,
            PacketKind::SpawnObject,
            PacketKind::SpawnMob,
            PacketKind::EntityTeleport,
            PacketKind::SetEntityMetadata,
            PacketKind::EntityEquipment,
            PacketKind::DestroyEntities,
            PacketKind::JoinGame,
            PacketKind::Respawn,
        ]
    }

    fn observe(&mut self, packet: &Packet) {
        match packet {
            Packet::SpawnPlayer(p) => self.spawn(
                p.entity_id,
                CachedEntity {
                    kind: EntityKind::Player {
                        uuid: p.uuid,
                        current_item: p.current_item,
                    },
                    position: (p.x, p.y, p.z),
                    rotation: (p.yaw, p.pitch),
                    metadata: p.metadata.clone(),
                    equipment: BTreeMap::new(),
                },
            ),
            Packet::SpawnObject(p) => self.spawn(
                p.entity_id,
                CachedEntity {
                    kind: EntityKind::Object {
                        kind: p.kind,
                        data: p.data,
                        velocity: p.velocity,
                    },
                    position: (p.x, p.y, p.z),
                    rotation: (p.yaw, p.pitch),
                    metadata: EntityMetadata::new(),
                    equipment: BTreeMap::new(),
                },
            ),
            Packet::SpawnMob(p) => self.spawn(
                p.entity_id,
                CachedEntity {
                    kind: EntityKind::Mob {
                        kind: p.kind,
                        head_pitch: p.head_pitch,
                        velocity: p.velocity,
                    },
                    position: (p.x, p.y, p.z),
                    rotation: (p.yaw, p.pitch),
                    metadata: p.metadata.clone(),
                    equipment: BTreeMap::new(),
                },
            ),
            Packet::EntityTeleport(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.position = (p.x, p.y, p.z);
                    entity.rotation = (p.yaw, p.pitch);
                }
            }
            Packet::SetEntityMetadata(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.metadata.merge(&p.metadata);
                }
            }
            Packet::EntityEquipment(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.equipment.insert(p.slot, p.item.clone());
                }
            }
            Packet::DestroyEntities(p) => {
                for id in &p.entity_ids {
                    self.entities.remove(id);
                }
                let entities = &self.entities;
                self.order.retain(|id| entities.contains_key(id));
            }
            // the client drops every entity when it (re)enters a world
            Packet::JoinGame(_) | Packet::Respawn(_) => self.clear(),
            _ => {}
        }
    }

    fn replay(&self, viewer: &mut Viewer) {
        for &id in &self.order {
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            viewer.push(entity.spawn_packet(id));
            if entity.needs_metadata_packet() {
                viewer.push(SetEntityMetadata {
                    entity_id: id,
                    metadata: entity.metadata.clone(),
                });
            }
            for (slot, item) in &entity.equipment {
                viewer.push(EntityEquipment {
                    entity_id: id,
                    slot: *slot,
                    item: item.clone(),
                });
            }
        }
    }

    fn on_detach(&self, viewer: &mut Viewer) {
        if !self.order.is_empty() {
            viewer.push(DestroyEntities {
                entity_ids: self.order.clone(),
            });
        }
    }

    fn reset(&mut self) {
        self.clear();
    }
}
