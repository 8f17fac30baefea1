//! Combat narration log.
//!
//! A second stream alongside the mechanical `CombatAction` records stored in
//! each round: the action list is the machine-readable record, the log is
//! the human-readable narration a client scrolls. Both are append-only and
//! timestamp-ordered. Log streams live outside the `Combat` aggregate, in a
//! `LogManager` keyed by combat id, so the aggregate stays a plain value and
//! the stream can be persisted on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// What a log entry narrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogEntryKind {
    /// Lifecycle transitions: combat started, round began, paused, ...
    System,
    /// A narrated action without a damage or healing payload
    Action,
    Damage,
    Healing,
    /// A condition label was applied or cleared
    Condition,
    /// An entity dropped to 0 hit points
    Death,
}

impl LogEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Action => "action",
            Self::Damage => "damage",
            Self::Healing => "healing",
            Self::Condition => "condition",
            Self::Death => "death",
        }
    }
}

/// One narration line. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub id: String,
    pub kind: LogEntryKind,

    /// Round the event occurred in; 0 while the combat is still in setup
    pub round: u32,

    pub message: String,

    /// Acting entity, when one is attributable
    pub entity_id: Option<String>,

    /// Target entity, for damage and healing lines
    pub target_id: Option<String>,

    /// Numeric payload for damage and healing lines
    pub amount: Option<i32>,

    pub timestamp: DateTime<Utc>,
}

/// Append-only narration stream for one combat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatLog {
    entries: Vec<CombatLogEntry>,
}

impl CombatLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(
        &mut self,
        kind: LogEntryKind,
        round: u32,
        message: String,
        entity_id: Option<&str>,
        target_id: Option<&str>,
        amount: Option<i32>,
    ) {
        self.entries.push(CombatLogEntry {
            id: Uuid::new_v4().to_string(),
            kind,
            round,
            message,
            entity_id: entity_id.map(str::to_string),
            target_id: target_id.map(str::to_string),
            amount,
            timestamp: Utc::now(),
        });
    }

    /// Narrate a lifecycle transition.
    pub fn system(&mut self, round: u32, message: impl Into<String>) {
        self.append(LogEntryKind::System, round, message.into(), None, None, None);
    }

    /// Narrate an action taken by an entity.
    pub fn action(&mut self, round: u32, entity_id: &str, message: impl Into<String>) {
        self.append(LogEntryKind::Action, round, message.into(), Some(entity_id), None, None);
    }

    /// Narrate damage. `entity_id` is the attacker when one is known.
    pub fn damage(
        &mut self,
        round: u32,
        entity_id: Option<&str>,
        target_id: Option<&str>,
        amount: i32,
        message: impl Into<String>,
    ) {
        self.append(LogEntryKind::Damage, round, message.into(), entity_id, target_id, Some(amount));
    }

    /// Narrate healing. `entity_id` is the healer when one is known.
    pub fn healing(
        &mut self,
        round: u32,
        entity_id: Option<&str>,
        target_id: Option<&str>,
        amount: i32,
        message: impl Into<String>,
    ) {
        self.append(LogEntryKind::Healing, round, message.into(), entity_id, target_id, Some(amount));
    }

    /// Narrate a condition change on an entity.
    pub fn condition(&mut self, round: u32, entity_id: &str, message: impl Into<String>) {
        self.append(LogEntryKind::Condition, round, message.into(), Some(entity_id), None, None);
    }

    /// Narrate an entity dropping to 0 hit points.
    pub fn death(&mut self, round: u32, entity_id: &str, message: impl Into<String>) {
        self.append(LogEntryKind::Death, round, message.into(), Some(entity_id), None, None);
    }

    /// Entries in append order.
    pub fn entries(&self) -> &[CombatLogEntry] {
        &self.entries
    }

    /// Entries of one kind, in append order.
    pub fn of_kind(&self, kind: LogEntryKind) -> impl Iterator<Item = &CombatLogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Entries where the entity acted or was targeted.
    pub fn involving(&self, entity_id: &str) -> impl Iterator<Item = &CombatLogEntry> + '_ {
        let entity_id = entity_id.to_string();
        self.entries.iter().filter(move |e| {
            e.entity_id.as_deref() == Some(entity_id.as_str())
                || e.target_id.as_deref() == Some(entity_id.as_str())
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to JSON for a scrolling narration panel.
    pub fn to_json(&self) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "kind": e.kind.as_str(),
                    "round": e.round,
                    "message": e.message,
                    "entity_id": e.entity_id,
                    "target_id": e.target_id,
                    "amount": e.amount,
                    "timestamp": e.timestamp.to_rfc3339()
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    }
}

/// Log manager - one narration stream per combat, keyed by combat id.
#[derive(Debug, Default)]
pub struct LogManager {
    streams: HashMap<String, CombatLog>,
}

impl LogManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the stream for a combat, creating it if needed.
    pub fn create(&mut self, combat_id: &str) -> &mut CombatLog {
        self.streams.entry(combat_id.to_string()).or_default()
    }

    pub fn get(&self, combat_id: &str) -> Option<&CombatLog> {
        self.streams.get(combat_id)
    }

    pub fn get_mut(&mut self, combat_id: &str) -> Option<&mut CombatLog> {
        self.streams.get_mut(combat_id)
    }

    pub fn remove(&mut self, combat_id: &str) -> Option<CombatLog> {
        self.streams.remove(combat_id)
    }

    pub fn count(&self) -> usize {
        self.streams.len()
    }
}
