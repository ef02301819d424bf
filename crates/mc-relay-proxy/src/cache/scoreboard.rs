//! Objectives, display slots, scores, and teams.

use std::collections::BTreeMap;

use mc_relay_proto::packets::{
    DisplayScoreboard, ObjectiveAction, ScoreboardObjective, TeamAction, TeamInfo, Teams,
    UpdateScore,
};
use mc_relay_proto::{Packet, PacketKind};

use super::{CacheHandler, Viewer};

#[derive(Debug, Clone, PartialEq)]
struct Objective {
    name: String,
    display_name: String,
    render_type: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Score {
    objective: String,
    entry: String,
    value: i32,
}

#[derive(Debug, Clone, PartialEq)]
struct Team {
    name: String,
    info: TeamInfo,
    members: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ScoreboardCache {
    objectives: Vec<Objective>,
    display_slots: BTreeMap<i8, String>,
    scores: Vec<Score>,
    teams: Vec<Team>,
}

impl ScoreboardCache {
    pub fn objective_count(&self) -> usize {
        self.objectives.len()
    }

    pub fn score(&self, objective: &str, entry: &str) -> Option<i32> {
        self.scores
            .iter()
            .find(|s| s.objective == objective && s.entry == entry)
            .map(|s| s.value)
    }

    pub fn team_members(&self, team: &str) -> Option<&[String]> {
        self.teams
            .iter()
            .find(|t| t.name == team)
            .map(|t| t.members.as_slice())
    }

    fn upsert_objective(&mut self, name: &str, display_name: &str, render_type: &str) {
        let objective = Objective {
            name: name.to_string(),
            display_name: display_name.to_string(),
            render_type: render_type.to_string(),
        };
        match self.objectives.iter_mut().find(|o| o.name == name) {
            Some(existing) => *existing = objective,
            None => self.objectives.push(objective),
        }
    }

    fn remove_objective(&mut self, name: &str) {
        self.objectives.retain(|o| o.name != name);
        self.scores.retain(|s| s.objective != name);
        self.display_slots.retain(|_, objective| objective != name);
    }

    fn observe_objective(&mut self, packet: &ScoreboardObjective) {
        match &packet.action {
            ObjectiveAction::Create {
                display_name,
                render_type,
            }
            | ObjectiveAction::Update {
                display_name,
                render_type,
            } => self.upsert_objective(&packet.name, display_name, render_type),
            ObjectiveAction::Remove => self.remove_objective(&packet.name),
        }
    }

    fn observe_score(&mut self, packet: &UpdateScore) {
        match packet.value {
            Some(value) => {
                match self
                    .scores
                    .iter_mut()
                    .find(|s| s.objective == packet.objective && s.entry == packet.entry)
                {
                    Some(score) => score.value = value,
                    None => self.scores.push(Score {
                        objective: packet.objective.clone(),
                        entry: packet.entry.clone(),
                        value,
                    }),
                }
            }
            None if packet.objective.is_empty() => {
                self.scores.retain(|s| s.entry != packet.entry);
            }
            None => self
                .scores
                .retain(|s| !(s.objective == packet.objective && s.entry == packet.entry)),
        }
    }

    fn observe_team(&mut self, packet: &Teams) {
        let index = self.teams.iter().position(|t| t.name == packet.name);
        // a player belongs to at most one team; joining one leaves the rest
        let joining = match (&packet.action, index) {
            (TeamAction::Create { players, .. }, _) | (TeamAction::AddPlayers(players), Some(_)) => {
                Some(players)
            }
            _ => None,
        };
        if let Some(players) = joining {
            for team in self.teams.iter_mut().filter(|t| t.name != packet.name) {
                team.members.retain(|m| !players.contains(m));
            }
        }
        match (&packet.action, index) {
            (TeamAction::Create { info, players }, existing) => {
                let team = Team {
                    name: packet.name.clone(),
                    info: info.clone(),
                    members: players.clone(),
                };
                match existing {
                    Some(i) => self.teams[i] = team,
                    None => self.teams.push(team),
                }
            }
            (TeamAction::Remove, Some(i)) => {
                self.teams.remove(i);
            }
            (TeamAction::UpdateInfo(info), Some(i)) => self.teams[i].info = info.clone(),
            (TeamAction::AddPlayers(players), Some(i)) => {
                let members = &mut self.teams[i].members;
                for player in players {
                    if !members.contains(player) {
                        members.push(player.clone());
                    }
                }
            }
            (TeamAction::RemovePlayers(players), Some(i)) => {
                self.teams[i].members.retain(|m| !players.contains(m));
            }
            // updates for teams never created are dropped
            (_, None) => {}
        }
    }
}

impl CacheHandler for ScoreboardCache {
    fn observed(&self) -> &'static [PacketKind] {
        &[
            PacketKind::ScoreboardObjective,
            PacketKind::UpdateScore,
            PacketKind::DisplayScoreboard,
            PacketKind::Teams,
        ]
    }

    fn observe(&mut self, packet: &Packet) {
        match packet {
            Packet::ScoreboardObjective(p) => self.observe_objective(p),
            Packet::UpdateScore(p) => self.observe_score(p),
            Packet::DisplayScoreboard(p) => {
                if p.objective.is_empty() {
                    self.display_slots.remove(&p.position);
                } else {
                    self.display_slots.insert(p.position, p.objective.clone());
                }
            }
            Packet::Teams(p) => self.observe_team(p),
            _ => {}
        }
    }

    fn replay(&self, viewer: &mut Viewer) {
        for objective in &self.objectives {
            viewer.push(ScoreboardObjective {
                name: objective.name.clone(),
                action: ObjectiveAction::Create {
                    display_name: objective.display_name.clone(),
                    render_type: objective.render_type.clone(),
                },
            });
        }
        for (position, objective) in &self.display_slots {
            viewer.push(DisplayScoreboard {
                position: *position,
                objective: objective.clone(),
            });
        }
        for score in &self.scores {
            viewer.push(UpdateScore {
                entry: score.entry.clone(),
                objective: score.objective.clone(),
                value: Some(score.value),
            });
        }
        for team in &self.teams {
            viewer.push(Teams {
                name: team.name.clone(),
                action: TeamAction::Create {
                    info: team.info.clone(),
                    players: team.members.clone(),
                },
            });
        }
    }

    fn on_detach(&self, viewer: &mut Viewer) {
        for team in &self.teams {
            viewer.push(Teams {
                name: team.name.clone(),
                action: TeamAction::Remove,
            });
        }
        // removing an objective also clears its scores and display slots
        for objective in &self.objectives {
            viewer.push(ScoreboardObjective {
                name: objective.name.clone(),
                action: ObjectiveAction::Remove,
            });
        }
    }

    fn reset(&mut self) {
        self.objectives.clear();
        self.display_slots.clear();
        self.scores.clear();
        self.teams.clear();
    }
}
