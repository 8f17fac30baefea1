//! Post-encounter recap.
//!
//! A recap is a pure projection over an ended combat and its narration log:
//! regenerating it from the same inputs yields structurally equal output.
//! Nothing here mutates the combat or the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::combat::{ActionKind, Combat, PreconditionError};
use super::log::{CombatLog, LogEntryKind};

/// How per-participant damage and healing totals accumulate.
///
/// The default scores a fixed weight per event, which keeps totals
/// comparable even when callers skip amounts on some entries; `Summed`
/// uses the logged amounts instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    /// Every damage or healing event scores a fixed weight.
    PerEvent { weight: i64 },
    /// Sum the amounts carried on the log entries.
    Summed,
}

impl Default for Aggregation {
    fn default() -> Self {
        Self::PerEvent { weight: 10 }
    }
}

/// Recap generation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecapOptions {
    pub aggregation: Aggregation,
}

/// How much a major event matters to the summary screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Medium,
    High,
}

/// A log event worth surfacing on the summary screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorEvent {
    /// Round the event occurred in
    pub round: u32,
    pub message: String,
    pub importance: Importance,
}

/// Per-participant aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub entity_id: String,
    pub name: String,
    pub damage_dealt: i64,
    pub damage_taken: i64,
    pub healing_done: i64,
    pub spells_used: u32,
    /// Above 0 hit points when the encounter ended
    pub survived: bool,
    /// Conditions still applied at the end, in application order
    pub final_conditions: Vec<String>,
}

/// Summary of a finished encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatRecap {
    pub combat_id: String,
    pub combat_name: String,
    pub total_rounds: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// One summary per roster entity, in roster order
    pub participants: Vec<ParticipantSummary>,
    /// Deaths (high) and lifecycle transitions (medium), in log order
    pub major_events: Vec<MajorEvent>,
}

impl CombatRecap {
    /// Build the recap for a finished encounter.
    ///
    /// Fails with `NotFinished` unless both the start and end timestamps
    /// are set.
    pub fn generate(
        combat: &Combat,
        log: &CombatLog,
        options: &RecapOptions,
    ) -> Result<CombatRecap, PreconditionError> {
        let (started_at, ended_at) = match (combat.start_time, combat.end_time) {
            (Some(started), Some(ended)) => (started, ended),
            _ => return Err(PreconditionError::NotFinished),
        };

        let participants = combat
            .entities()
            .iter()
            .map(|entity| {
                let mut damage_dealt = 0;
                let mut damage_taken = 0;
                let mut healing_done = 0;

                for entry in log.entries() {
                    let value = match options.aggregation {
                        Aggregation::PerEvent { weight } => weight,
                        Aggregation::Summed => entry.amount.unwrap_or(0) as i64,
                    };
                    let acted = entry.entity_id.as_deref() == Some(entity.id.as_str());
                    let targeted = entry.target_id.as_deref() == Some(entity.id.as_str());

                    match entry.kind {
                        LogEntryKind::Damage => {
                            if acted {
                                damage_dealt += value;
                            }
                            if targeted {
                                damage_taken += value;
                            }
                        }
                        LogEntryKind::Healing => {
                            if acted {
                                healing_done += value;
                            }
                        }
                        _ => {}
                    }
                }

                let spells_used = combat
                    .rounds()
                    .iter()
                    .flat_map(|round| round.actions.iter())
                    .filter(|action| {
                        action.entity_id == entity.id
                            && (action.kind == ActionKind::Spell || action.spell_slot.is_some())
                    })
                    .count() as u32;

                ParticipantSummary {
                    entity_id: entity.id.clone(),
                    name: entity.name.clone(),
                    damage_dealt,
                    damage_taken,
                    healing_done,
                    spells_used,
                    survived: entity.hit_points.current > 0,
                    final_conditions: entity.conditions().to_vec(),
                }
            })
            .collect();

        let major_events = log
            .entries()
            .iter()
            .filter_map(|entry| {
                let importance = match entry.kind {
                    LogEntryKind::Death => Importance::High,
                    LogEntryKind::System => Importance::Medium,
                    _ => return None,
                };
                Some(MajorEvent {
                    round: entry.round,
                    message: entry.message.clone(),
                    importance,
                })
            })
            .collect();

        Ok(CombatRecap {
            combat_id: combat.id.clone(),
            combat_name: combat.name.clone(),
            total_rounds: combat.rounds().len() as u32,
            started_at,
            ended_at,
            participants,
            major_events,
        })
    }
}
