//! World-state snapshot of a backend session.
//!
//! Each handler owns one slice of server-pushed state. Handlers see only the
//! packet kinds they declare, mutate their slice without I/O, and can replay
//! that slice to a viewer or erase it from one.

pub mod entity;
pub mod join_game;
pub mod player_info;
pub mod scoreboard;

pub use entity::EntityCache;
pub use join_game::JoinGameCache;
pub use player_info::PlayerInfoCache;
pub use scoreboard::ScoreboardCache;

use mc_relay_proto::{Packet, PacketKind};

/// Packets collected for one viewer during replay or detach.
#[derive(Debug, Default)]
pub struct Viewer {
    /// The viewer has not joined any world yet.
    pub fresh: bool,
    pub packets: Vec<Packet>,
}

impl Viewer {
    pub fn new(fresh: bool) -> Self {
        Self {
            fresh,
            packets: Vec::new(),
        }
    }

    pub fn push(&mut self, packet: impl Into<Packet>) {
        self.packets.push(packet.into());
    }
}

pub trait CacheHandler: Send {
    /// Packet kinds routed to [`CacheHandler::observe`].
    fn observed(&self) -> &'static [PacketKind];

    fn observe(&mut self, packet: &Packet);

    /// Bring an empty viewer up to the cached state.
    fn replay(&self, viewer: &mut Viewer);

    /// Erase everything this handler would have shown the viewer.
    fn on_detach(&self, viewer: &mut Viewer);

    fn reset(&mut self);
}

/// The ordered handler set of one backend session.
pub struct WorldStateCache {
    handlers: Vec<Box<dyn CacheHandler>>,
}

impl Default for WorldStateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldStateCache {
    pub fn new() -> Self {
        Self::with_handlers(vec![
            Box::new(JoinGameCache::default()),
            Box::new(PlayerInfoCache::default()),
            Box::new(ScoreboardCache::default()),
            Box::new(EntityCache::default()),
        ])
    }

    pub fn with_handlers(handlers: Vec<Box<dyn CacheHandler>>) -> Self {
        Self { handlers }
    }

    pub fn observe(&mut self, packet: &Packet) {
        let kind = packet.kind();
        for handler in &mut self.handlers {
            if handler.observed().contains(&kind) {
                handler.observe(packet);
            }
        }
    }

    /// Replay every handler in registration order.
    pub fn replay_to(&self, viewer: &mut Viewer) {
        for handler in &self.handlers {
            handler.replay(viewer);
        }
    }

    /// Erase in reverse registration order, so entities go before the
    /// tab-list entries they reference.
    pub fn detach_from(&self, viewer: &mut Viewer) {
        for handler in self.handlers.iter().rev() {
            handler.on_detach(viewer);
        }
    }

    pub fn reset(&mut self) {
        for handler in &mut self.handlers {
            handler.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_relay_proto::metadata::EntityMetadata;
    use mc_relay_proto::packets::{
        DisplayScoreboard, ObjectiveAction, ScoreboardObjective, SpawnMob, UpdateScore,
    };

    fn mob(entity_id: i32) -> Packet {
        SpawnMob {
            entity_id,
            kind: 54,
            x: 0,
            y: 0,
            z: 0,
            yaw: 0,
            pitch: 0,
            head_pitch: 0,
            velocity: (0, 0, 0),
            metadata: EntityMetadata::new(),
        }
        .into()
    }

    #[test]
    fn replay_follows_handler_order() {
        let mut cache = WorldStateCache::new();
        cache.observe(&mob(1));
        cache.observe(
            &ScoreboardObjective {
                name: "kills".into(),
                action: ObjectiveAction::Create {
                    display_name: "Kills".into(),
                    render_type: "integer".into(),
                },
            }
            .into(),
        );
        cache.observe(
            &UpdateScore {
                entry: "Alice".into(),
                objective: "kills".into(),
                value: Some(3),
            }
            .into(),
        );
        cache.observe(
            &DisplayScoreboard {
                position: 1,
                objective: "kills".into(),
            }
            .into(),
        );

        let mut viewer = Viewer::new(true);
        cache.replay_to(&mut viewer);
        let kinds: Vec<_> = viewer.packets.iter().map(Packet::kind).collect();
        assert_eq!(
            kinds,
            vec![
                PacketKind::ScoreboardObjective,
                PacketKind::DisplayScoreboard,
                PacketKind::UpdateScore,
                PacketKind::SpawnMob,
            ]
        );
    }

    #[test]
    fn reset_empties_every_handler() {
        let mut cache = WorldStateCache::new();
        cache.observe(&mob(1));
        cache.reset();
        let mut viewer = Viewer::new(true);
        cache.replay_to(&mut viewer);
        cache.detach_from(&mut viewer);
        assert!(viewer.packets.is_empty());
    }

    #[test]
    fn unobserved_kinds_are_ignored() {
        let mut cache = WorldStateCache::new();
        cache.observe(&mc_relay_proto::packets::KeepAlive { id: 1 }.into());
        let mut viewer = Viewer::new(true);
        cache.replay_to(&mut viewer);
        assert!(viewer.packets.is_empty());
    }
}
