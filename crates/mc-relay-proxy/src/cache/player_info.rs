//! Tab-list entries.

use std::collections::HashMap;

use uuid::Uuid;

use mc_relay_proto::packets::{PlayerListAction, PlayerListEntry, PlayerListItem};
use mc_relay_proto::{Packet, PacketKind};

use super::{CacheHandler, Viewer};

#[derive(Debug, Default)]
pub struct PlayerInfoCache {
    entries: HashMap<Uuid, PlayerListEntry>,
    order: Vec<Uuid>,
}

impl PlayerInfoCache {
    pub fn get(&self, uuid: &Uuid) -> Option<&PlayerListEntry> {
        self.entries.get(uuid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&mut self, uuid: &Uuid) {
        if self.entries.remove(uuid).is_some() {
            self.order.retain(|id| id != uuid);
        }
    }
}

impl CacheHandler for PlayerInfoCache {
    fn observed(&self) -> &'static [PacketKind] {
        &[PacketKind::PlayerListItem]
    }

    fn observe(&mut self, packet: &Packet) {
        let Packet::PlayerListItem(item) = packet else {
            return;
        };
        match &item.action {
            PlayerListAction::AddPlayer(entries) => {
                for entry in entries {
                    if self.entries.insert(entry.uuid, entry.clone()).is_none() {
                        self.order.push(entry.uuid);
                    }
                }
            }
            PlayerListAction::UpdateGameMode(updates) => {
                for (uuid, gamemode) in updates {
                    if let Some(entry) = self.entries.get_mut(uuid) {
                        entry.gamemode = *gamemode;
                    }
                }
            }
            PlayerListAction::UpdateLatency(updates) => {
                for (uuid, ping) in updates {
                    if let Some(entry) = self.entries.get_mut(uuid) {
                        entry.ping = *ping;
                    }
                }
            }
            PlayerListAction::UpdateDisplayName(updates) => {
                for (uuid, display_name) in updates {
                    if let Some(entry) = self.entries.get_mut(uuid) {
                        entry.display_name = display_name.clone();
                    }
                }
            }
            PlayerListAction::RemovePlayer(uuids) => {
                for uuid in uuids {
                    self.remove(uuid);
                }
            }
        }
    }

    fn replay(&self, viewer: &mut Viewer) {
        if self.order.is_empty() {
            return;
        }
        let entries = self
            .order
            .iter()
            .filter_map(|uuid| self.entries.get(uuid).cloned())
            .collect();
        viewer.push(PlayerListItem {
            action: PlayerListAction::AddPlayer(entries),
        });
    }

    fn on_detach(&self, viewer: &mut Viewer) {
        if self.order.is_empty() {
            return;
        }
        viewer.push(PlayerListItem {
            action: PlayerListAction::RemovePlayer(self.order.clone()),
        });
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
