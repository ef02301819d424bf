//! The world the backend's player is in.

use mc_relay_proto::packets::{JoinGame, Respawn};
use mc_relay_proto::{Packet, PacketKind};

use super::{CacheHandler, Viewer};

#[derive(Debug, Default)]
pub struct JoinGameCache {
    join: Option<JoinGame>,
}

impl JoinGameCache {
    pub fn join_game(&self) -> Option<&JoinGame> {
        self.join.as_ref()
    }
}

impl CacheHandler for JoinGameCache {
    fn observed(&self) -> &'static [PacketKind] {
        &[PacketKind::JoinGame, PacketKind::Respawn]
    }

    fn observe(&mut self, packet: &Packet) {
        match packet {
            Packet::JoinGame(join) => self.join = Some(join.clone()),
            Packet::Respawn(respawn) => {
                if let Some(join) = self.join.as_mut() {
                    join.dimension = respawn.dimension as i8;
                    join.difficulty = respawn.difficulty;
                    join.gamemode = (join.gamemode & 0x08) | (respawn.gamemode & 0x07);
                    join.level_type = respawn.level_type.clone();
                }
            }
            _ => {}
        }
    }

    fn replay(&self, viewer: &mut Viewer) {
        let Some(join) = &self.join else {
            return;
        };
        if viewer.fresh {
            viewer.push(join.clone());
            return;
        }
        // A respawn into the current dimension is ignored by the client, so
        // bounce through another one first.
        let target = Respawn::from_join(join);
        let bounce = Respawn {
            dimension: if target.dimension == 0 { -1 } else { 0 },
            ..target.clone()
        };
        viewer.push(bounce);
        viewer.push(target);
    }

    fn on_detach(&self, _viewer: &mut Viewer) {}

    fn reset(&mut self) {
        self.join = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(dimension: i8) -> Packet {
        JoinGame {
            entity_id: 77,
            gamemode: 1,
            dimension,
            difficulty: 2,
            max_players: 20,
            level_type: "default".into(),
            reduced_debug_info: false,
        }
        .into()
    }

    #[test]
    fn fresh_viewer_gets_join_game() {
        let mut cache = JoinGameCache::default();
        cache.observe(&join(0));
        let mut viewer = Viewer::new(true);
        cache.replay(&mut viewer);
        assert_eq!(viewer.packets, vec![join(0)]);
    }

    #[test]
    fn joined_viewer_gets_two_respawns() {
        let mut cache = JoinGameCache::default();
        cache.observe(&join(0));
        cache.observe(
            &Respawn {
                dimension: 1,
                difficulty: 2,
                gamemode: 0,
                level_type: "default".into(),
            }
            .into(),
        );

        let mut viewer = Viewer::new(false);
        cache.replay(&mut viewer);
        let dims: Vec<_> = viewer
            .packets
            .iter()
            .map(|p| match p {
                Packet::Respawn(r) => r.dimension,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(dims, vec![0, 1]);
    }

    #[test]
    fn nothing_cached_nothing_replayed() {
        let cache = JoinGameCache::default();
        let mut viewer = Viewer::new(true);
        cache.replay(&mut viewer);
        assert!(viewer.packets.is_empty());
    }
}
