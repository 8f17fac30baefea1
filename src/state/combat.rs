//! Combat encounter state.
//!
//! One `Combat` aggregate per encounter: roster, initiative order, round
//! records, and the lifecycle state machine. Every state-changing call
//! narrates itself into the encounter's `CombatLog` stream, which the
//! caller passes in (the stream lives outside the aggregate).
//!
//! # State Diagram
//!
//! ```text
//! ┌───────┐  start   ┌────────┐   pause    ┌────────┐
//! │ Setup │─────────▶│ Active │───────────▶│ Paused │
//! └───────┘          └───┬────┘◀───────────└───┬────┘
//!                        │        resume       │
//!                        │ end                 │ end
//!                        ▼                     │
//!                    ┌───────┐                 │
//!                    │ Ended │◀────────────────┘
//!                    └───────┘
//! ```
//!
//! Lifecycle calls return a [`Transition`]: invalid-for-this-status calls
//! are silently rejected (the UI is expected to disable them), while caller
//! mistakes surface as [`PreconditionError`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::entity::{CombatEntity, CombatMap, EntitySnapshot, GridPosition};
use super::initiative::InitiativeRoller;
use super::log::CombatLog;

/// Minimum roster size to start an encounter.
pub const MIN_ENTITIES_TO_START: usize = 2;

/// Combat state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatStatus {
    /// Roster assembly; initiative not locked in
    #[default]
    Setup,
    /// Turns are advancing
    Active,
    /// Halted, may resume
    Paused,
    /// Terminal; roster, rounds and order are frozen
    Ended,
}

impl CombatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }

    /// Check if turns can advance.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the combat can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// Caller mistakes. These fail loudly, unlike the silent lifecycle guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    NotEnoughEntities { required: usize, actual: usize },
    UnknownCombat,
    UnknownEntity(String),
    CombatEnded,
    NotStarted,
    NotFinished,
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEnoughEntities { required, actual } => {
                write!(f, "Need at least {} entities to start, have {}", required, actual)
            }
            Self::UnknownCombat => write!(f, "No combat with that id"),
            Self::UnknownEntity(id) => write!(f, "No entity {} in this combat", id),
            Self::CombatEnded => write!(f, "Combat has ended; roster and rounds are frozen"),
            Self::NotStarted => write!(f, "Combat has not started; no round is open"),
            Self::NotFinished => write!(f, "Combat is missing a start or end time"),
        }
    }
}

impl std::error::Error for PreconditionError {}

/// Outcome of a lifecycle call.
///
/// `Rejected` is the permissive-UI path: the call was not valid in the
/// current status and was ignored without changing anything. `Failed`
/// means the caller passed input that can never be valid, regardless of
/// status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The transition applied and the aggregate changed
    Applied,
    /// Guarded no-op; state unchanged
    Rejected {
        status: CombatStatus,
        reason: &'static str,
    },
    /// Precondition violation; state unchanged
    Failed(PreconditionError),
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Mechanical action categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Attack,
    Spell,
    Move,
    Other,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Spell => "spell",
            Self::Move => "move",
            Self::Other => "other",
        }
    }
}

/// Damage payload on an action. The amount arrives already resolved; the
/// engine does no rule math.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    pub amount: i32,
    pub damage_type: String,
}

/// Movement payload on an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub from: GridPosition,
    pub to: GridPosition,
}

/// One mechanical action inside a round. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatAction {
    pub id: String,
    pub entity_id: String,
    pub round: u32,
    pub kind: ActionKind,
    pub description: String,
    pub target: Option<String>,
    pub damage: Option<DamageRoll>,
    pub healing: Option<i32>,
    pub spell_slot: Option<u8>,
    pub movement: Option<Movement>,
    pub timestamp: DateTime<Utc>,
}

/// Caller-supplied part of an action; the engine stamps id, round and
/// timestamp on append.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub entity_id: String,
    pub kind: ActionKind,
    pub description: String,
    pub target: Option<String>,
    pub damage: Option<DamageRoll>,
    pub healing: Option<i32>,
    pub spell_slot: Option<u8>,
}

impl NewAction {
    pub fn new(entity_id: impl Into<String>, kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind,
            description: description.into(),
            target: None,
            damage: None,
            healing: None,
            spell_slot: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_damage(mut self, amount: i32, damage_type: impl Into<String>) -> Self {
        self.damage = Some(DamageRoll {
            amount,
            damage_type: damage_type.into(),
        });
        self
    }

    pub fn with_healing(mut self, amount: i32) -> Self {
        self.healing = Some(amount);
        self
    }

    pub fn with_spell_slot(mut self, level: u8) -> Self {
        self.spell_slot = Some(level);
        self
    }
}

/// One full pass through the initiative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRound {
    /// 1-indexed round number
    pub number: u32,
    pub start_time: DateTime<Utc>,
    /// Set when the round has been fully played out
    pub end_time: Option<DateTime<Utc>>,
    /// Actions in append order
    pub actions: Vec<CombatAction>,
}

impl CombatRound {
    fn open(number: u32) -> Self {
        Self {
            number,
            start_time: Utc::now(),
            end_time: None,
            actions: Vec::new(),
        }
    }
}

/// One combat encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combat {
    /// Unique combat ID
    pub id: String,

    pub name: String,
    pub description: Option<String>,

    /// Current status
    pub status: CombatStatus,

    /// Roster in insertion order
    entities: Vec<CombatEntity>,

    /// Turn sequence as entity ids; empty until initiative is rolled
    initiative_order: Vec<String>,

    /// 0 before the encounter starts
    pub current_round: u32,

    /// Index into `initiative_order`; meaningful only while active
    pub current_turn_index: usize,

    /// Round records, oldest first
    rounds: Vec<CombatRound>,

    /// Opaque reference to the external grid
    pub map: Option<CombatMap>,

    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Combat {
    /// Create a new encounter in setup.
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description,
            status: CombatStatus::Setup,
            entities: Vec::new(),
            initiative_order: Vec::new(),
            current_round: 0,
            current_turn_index: 0,
            rounds: Vec::new(),
            map: None,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
        }
    }

    /// Roster in insertion order.
    pub fn entities(&self) -> &[CombatEntity] {
        &self.entities
    }

    pub fn entity(&self, entity_id: &str) -> Option<&CombatEntity> {
        self.entities.iter().find(|e| e.id == entity_id)
    }

    pub fn entity_mut(&mut self, entity_id: &str) -> Option<&mut CombatEntity> {
        self.entities.iter_mut().find(|e| e.id == entity_id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Turn sequence as entity ids, highest initiative first.
    pub fn initiative_order(&self) -> &[String] {
        &self.initiative_order
    }

    /// Round records, oldest first.
    pub fn rounds(&self) -> &[CombatRound] {
        &self.rounds
    }

    /// The entity whose turn it is.
    ///
    /// May be `None` even while active: removing an entity does not compact
    /// `current_turn_index`, so after a removal the index can point past the
    /// end of the order. Callers re-resolve before rendering.
    pub fn current_entity(&self) -> Option<&CombatEntity> {
        let id = self.initiative_order.get(self.current_turn_index)?;
        self.entity(id)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the encounter.
    ///
    /// Rolls initiative for the whole roster, opens round 1 and transitions
    /// to active. Rejected outside setup; fails below the roster minimum.
    pub fn start(&mut self, roller: &mut dyn InitiativeRoller, log: &mut CombatLog) -> Transition {
        if self.status != CombatStatus::Setup {
            return Transition::Rejected {
                status: self.status,
                reason: "combat can only start from setup",
            };
        }
        if self.entities.len() < MIN_ENTITIES_TO_START {
            return Transition::Failed(PreconditionError::NotEnoughEntities {
                required: MIN_ENTITIES_TO_START,
                actual: self.entities.len(),
            });
        }

        self.reroll_initiative(roller);
        self.status = CombatStatus::Active;
        self.current_round = 1;
        self.current_turn_index = 0;
        self.start_time = Some(Utc::now());
        self.rounds.push(CombatRound::open(1));

        log.system(1, format!("{} begins.", self.name));
        log.system(1, "Round 1 begins.");
        Transition::Applied
    }

    /// Pause an active encounter. Silent no-op otherwise.
    pub fn pause(&mut self, log: &mut CombatLog) -> Transition {
        if self.status != CombatStatus::Active {
            return Transition::Rejected {
                status: self.status,
                reason: "only an active combat can pause",
            };
        }
        self.status = CombatStatus::Paused;
        log.system(self.current_round, "Combat paused.");
        Transition::Applied
    }

    /// Resume a paused encounter. Silent no-op otherwise.
    pub fn resume(&mut self, log: &mut CombatLog) -> Transition {
        if self.status != CombatStatus::Paused {
            return Transition::Rejected {
                status: self.status,
                reason: "only a paused combat can resume",
            };
        }
        self.status = CombatStatus::Active;
        log.system(self.current_round, "Combat resumed.");
        Transition::Applied
    }

    /// End the encounter from active or paused. Irreversible.
    pub fn end(&mut self, log: &mut CombatLog) -> Transition {
        if !matches!(self.status, CombatStatus::Active | CombatStatus::Paused) {
            return Transition::Rejected {
                status: self.status,
                reason: "only a running combat can end",
            };
        }

        let now = Utc::now();
        if let Some(round) = self.rounds.last_mut() {
            if round.end_time.is_none() {
                round.end_time = Some(now);
            }
        }
        self.end_time = Some(now);
        self.status = CombatStatus::Ended;
        log.system(self.current_round, "Combat ends.");
        Transition::Applied
    }

    /// Advance to the next turn, wrapping into a new round past the end of
    /// the initiative order.
    pub fn next_turn(&mut self, log: &mut CombatLog) -> Transition {
        if self.status != CombatStatus::Active {
            return Transition::Rejected {
                status: self.status,
                reason: "turns only advance while active",
            };
        }
        if self.initiative_order.is_empty() {
            return Transition::Rejected {
                status: self.status,
                reason: "initiative order is empty",
            };
        }

        if self.current_turn_index + 1 >= self.initiative_order.len() {
            if let Some(round) = self.rounds.last_mut() {
                round.end_time = Some(Utc::now());
            }
            self.current_turn_index = 0;
            self.current_round += 1;
            self.rounds.push(CombatRound::open(self.current_round));
            log.system(self.current_round, format!("Round {} begins.", self.current_round));
        } else {
            self.current_turn_index += 1;
        }
        Transition::Applied
    }

    /// Step back one turn.
    ///
    /// Crossing a round boundary backwards discards the newest round record,
    /// actions included. At round 1, turn 0 this is a silent no-op.
    pub fn previous_turn(&mut self, log: &mut CombatLog) -> Transition {
        if self.status != CombatStatus::Active {
            return Transition::Rejected {
                status: self.status,
                reason: "turns only advance while active",
            };
        }

        if self.current_turn_index > 0 {
            self.current_turn_index -= 1;
            return Transition::Applied;
        }
        if self.current_round <= 1 {
            return Transition::Rejected {
                status: self.status,
                reason: "already at the first turn of round 1",
            };
        }

        self.discard_newest_round();
        self.current_round -= 1;
        self.current_turn_index = self.initiative_order.len().saturating_sub(1);
        log.system(self.current_round, format!("Rewound to round {}.", self.current_round));
        Transition::Applied
    }

    /// Drop the newest round record, actions included, and reopen the round
    /// before it. Backward navigation across a round boundary loses that
    /// round's actions; this is the one place that happens.
    fn discard_newest_round(&mut self) {
        self.rounds.pop();
        if let Some(round) = self.rounds.last_mut() {
            round.end_time = None;
        }
    }

    // ------------------------------------------------------------------
    // Initiative
    // ------------------------------------------------------------------

    /// Re-roll initiative for the whole roster.
    ///
    /// Normally done in setup (and implicitly by `start`); the engine never
    /// re-rolls on its own once active, but the operation stays available
    /// for callers that want a fresh order mid-encounter.
    pub fn roll_initiative(&mut self, roller: &mut dyn InitiativeRoller, log: &mut CombatLog) -> Transition {
        if self.status.is_terminal() {
            return Transition::Rejected {
                status: self.status,
                reason: "an ended combat cannot re-roll",
            };
        }
        self.reroll_initiative(roller);
        log.system(self.current_round, "Initiative rolled.");
        Transition::Applied
    }

    fn reroll_initiative(&mut self, roller: &mut dyn InitiativeRoller) {
        for entity in &mut self.entities {
            entity.initiative = roller.roll(entity.initiative_bonus);
        }

        // Stable sort: ties keep roster insertion order, no dice tie-break.
        let mut order: Vec<(i32, String)> = self
            .entities
            .iter()
            .map(|e| (e.initiative, e.id.clone()))
            .collect();
        order.sort_by(|a, b| b.0.cmp(&a.0));
        self.initiative_order = order.into_iter().map(|(_, id)| id).collect();
    }

    // ------------------------------------------------------------------
    // Roster mutation
    // ------------------------------------------------------------------

    /// Add an entity from an external snapshot.
    ///
    /// Permitted any time the combat has not ended. The entity joins with
    /// initiative 0 and stays out of the initiative order until the next
    /// roll. Returns the new entity's id.
    pub fn add_entity(
        &mut self,
        snapshot: &EntitySnapshot,
        position: GridPosition,
        log: &mut CombatLog,
    ) -> Result<String, PreconditionError> {
        if self.status.is_terminal() {
            return Err(PreconditionError::CombatEnded);
        }

        let entity = CombatEntity::from_snapshot(snapshot, position);
        let id = entity.id.clone();
        log.system(self.current_round, format!("{} joins the encounter.", entity.name));
        self.entities.push(entity);
        Ok(id)
    }

    /// Remove an entity from the roster and the initiative order.
    ///
    /// `current_turn_index` is deliberately left untouched; it may now point
    /// at a different slot or past the end of the order. Callers re-resolve
    /// the current entity before rendering.
    pub fn remove_entity(
        &mut self,
        entity_id: &str,
        log: &mut CombatLog,
    ) -> Result<CombatEntity, PreconditionError> {
        if self.status.is_terminal() {
            return Err(PreconditionError::CombatEnded);
        }

        let pos = self
            .entities
            .iter()
            .position(|e| e.id == entity_id)
            .ok_or_else(|| PreconditionError::UnknownEntity(entity_id.to_string()))?;
        let removed = self.entities.remove(pos);
        self.initiative_order.retain(|id| id != entity_id);

        log.system(self.current_round, format!("{} leaves the encounter.", removed.name));
        Ok(removed)
    }

    /// Set an entity's current and temporary hit points.
    ///
    /// `new_current` is clamped to 0 from below but not clamped to the
    /// maximum: overheal persists. Emits damage or healing narration from
    /// the sign of the delta, and a death entry exactly once per
    /// zero-crossing.
    pub fn update_hp(
        &mut self,
        entity_id: &str,
        new_current: i32,
        new_temporary: i32,
        log: &mut CombatLog,
    ) -> Result<(), PreconditionError> {
        if self.status.is_terminal() {
            return Err(PreconditionError::CombatEnded);
        }

        let round = self.current_round;
        let entity = self
            .entity_mut(entity_id)
            .ok_or_else(|| PreconditionError::UnknownEntity(entity_id.to_string()))?;

        let previous = entity.hit_points.current;
        let current = new_current.max(0);
        entity.hit_points.current = current;
        entity.hit_points.temporary = new_temporary.max(0);

        let delta = current - previous;
        if delta < 0 {
            log.damage(
                round,
                None,
                Some(entity.id.as_str()),
                -delta,
                format!("{} takes {} damage.", entity.name, -delta),
            );
        } else if delta > 0 {
            log.healing(
                round,
                None,
                Some(entity.id.as_str()),
                delta,
                format!("{} regains {} hit points.", entity.name, delta),
            );
        }
        if current == 0 && previous > 0 {
            log.death(round, &entity.id, format!("{} falls.", entity.name));
        }
        Ok(())
    }

    /// Add a condition label to an entity. Set semantics: narrates and
    /// returns true only when the label was not already present.
    pub fn add_condition(
        &mut self,
        entity_id: &str,
        label: &str,
        log: &mut CombatLog,
    ) -> Result<bool, PreconditionError> {
        if self.status.is_terminal() {
            return Err(PreconditionError::CombatEnded);
        }

        let round = self.current_round;
        let entity = self
            .entity_mut(entity_id)
            .ok_or_else(|| PreconditionError::UnknownEntity(entity_id.to_string()))?;

        let added = entity.add_condition(label);
        if added {
            log.condition(round, &entity.id, format!("{} is {}.", entity.name, label));
        }
        Ok(added)
    }

    /// Remove a condition label from an entity. Narrates and returns true
    /// only when the label was present.
    pub fn remove_condition(
        &mut self,
        entity_id: &str,
        label: &str,
        log: &mut CombatLog,
    ) -> Result<bool, PreconditionError> {
        if self.status.is_terminal() {
            return Err(PreconditionError::CombatEnded);
        }

        let round = self.current_round;
        let entity = self
            .entity_mut(entity_id)
            .ok_or_else(|| PreconditionError::UnknownEntity(entity_id.to_string()))?;

        let removed = entity.remove_condition(label);
        if removed {
            log.condition(round, &entity.id, format!("{} is no longer {}.", entity.name, label));
        }
        Ok(removed)
    }

    /// Move an entity to a new grid position.
    ///
    /// The position update and the narration always happen; a move
    /// `CombatAction` is recorded only while a round is open (placing
    /// entities during setup is not an action).
    pub fn move_entity(
        &mut self,
        entity_id: &str,
        to: GridPosition,
        log: &mut CombatLog,
    ) -> Result<(), PreconditionError> {
        if self.status.is_terminal() {
            return Err(PreconditionError::CombatEnded);
        }

        let round = self.current_round;
        let entity = self
            .entity_mut(entity_id)
            .ok_or_else(|| PreconditionError::UnknownEntity(entity_id.to_string()))?;

        let from = entity.position;
        entity.position = to;
        let id = entity.id.clone();
        let name = entity.name.clone();

        log.action(
            round,
            &id,
            format!(
                "{} moves from ({}, {}) to ({}, {}).",
                name, from.x, from.y, to.x, to.y
            ),
        );

        if let Some(open) = self.rounds.last_mut() {
            open.actions.push(CombatAction {
                id: Uuid::new_v4().to_string(),
                entity_id: id,
                round,
                kind: ActionKind::Move,
                description: format!("Moved to ({}, {})", to.x, to.y),
                target: None,
                damage: None,
                healing: None,
                spell_slot: None,
                movement: Some(Movement { from, to }),
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Record a narrative or mechanical action in the current round.
    ///
    /// Stamps id, round and timestamp, appends to the round's action list
    /// and mirrors a one-line summary into the narration stream. Requires
    /// an open round. Returns the new action's id.
    pub fn add_action(
        &mut self,
        action: NewAction,
        log: &mut CombatLog,
    ) -> Result<String, PreconditionError> {
        if self.status.is_terminal() {
            return Err(PreconditionError::CombatEnded);
        }

        let actor_name = self
            .entity(&action.entity_id)
            .map(|e| e.name.clone())
            .ok_or_else(|| PreconditionError::UnknownEntity(action.entity_id.clone()))?;
        if self.rounds.is_empty() {
            return Err(PreconditionError::NotStarted);
        }
        let round = self.current_round;

        let record = CombatAction {
            id: Uuid::new_v4().to_string(),
            entity_id: action.entity_id,
            round,
            kind: action.kind,
            description: action.description,
            target: action.target,
            damage: action.damage,
            healing: action.healing,
            spell_slot: action.spell_slot,
            movement: None,
            timestamp: Utc::now(),
        };

        let message = format!("{}: {}", actor_name, record.description);
        if let Some(damage) = &record.damage {
            log.damage(
                round,
                Some(record.entity_id.as_str()),
                record.target.as_deref(),
                damage.amount,
                message,
            );
        } else if let Some(healing) = record.healing {
            log.healing(
                round,
                Some(record.entity_id.as_str()),
                record.target.as_deref(),
                healing,
                message,
            );
        } else {
            log.action(round, &record.entity_id, message);
        }

        let id = record.id.clone();
        if let Some(open) = self.rounds.last_mut() {
            open.actions.push(record);
        }
        Ok(id)
    }

    /// Convert the aggregate to a JSON snapshot for rendering.
    pub fn to_json(&self) -> serde_json::Value {
        let entities: Vec<serde_json::Value> = self.entities.iter().map(|e| e.to_json()).collect();

        serde_json::json!({
            "combat_id": self.id,
            "name": self.name,
            "description": self.description,
            "status": self.status.as_str(),
            "entities": entities,
            "initiative_order": self.initiative_order,
            "current_round": self.current_round,
            "current_turn_index": self.current_turn_index,
            "current_entity_id": self.current_entity().map(|e| e.id.clone()),
            "round_count": self.rounds.len(),
            "start_time": self.start_time.map(|t| t.to_rfc3339()),
            "end_time": self.end_time.map(|t| t.to_rfc3339())
        })
    }
}

/// Combat manager - tracks all encounters by id.
#[derive(Debug, Default)]
pub struct CombatManager {
    combats: HashMap<String, Combat>,
}

impl CombatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a combat.
    pub fn add(&mut self, combat: Combat) {
        self.combats.insert(combat.id.clone(), combat);
    }

    pub fn get(&self, combat_id: &str) -> Option<&Combat> {
        self.combats.get(combat_id)
    }

    pub fn get_mut(&mut self, combat_id: &str) -> Option<&mut Combat> {
        self.combats.get_mut(combat_id)
    }

    pub fn remove(&mut self, combat_id: &str) -> Option<Combat> {
        self.combats.remove(combat_id)
    }

    /// Count encounters whose turns are advancing.
    pub fn active_count(&self) -> usize {
        self.combats.values().filter(|c| c.status.is_active()).count()
    }

    pub fn count(&self) -> usize {
        self.combats.len()
    }

    pub fn combat_ids(&self) -> impl Iterator<Item = &String> {
        self.combats.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::entity::{AbilityScores, EntityKind};
    use crate::state::log::LogEntryKind;

    /// Deterministic roller: initiative is just the bonus times ten.
    struct BonusRoller;

    impl InitiativeRoller for BonusRoller {
        fn roll(&mut self, bonus: i32) -> i32 {
            bonus * 10
        }
    }

    /// Deterministic roller: everyone rolls the same value.
    struct FlatRoller(i32);

    impl InitiativeRoller for FlatRoller {
        fn roll(&mut self, _bonus: i32) -> i32 {
            self.0
        }
    }

    fn snapshot(name: &str, dexterity: i32) -> EntitySnapshot {
        EntitySnapshot {
            id: format!("src-{}", name),
            name: name.to_string(),
            kind: EntityKind::Player,
            armor_class: 12,
            current_hit_points: 20,
            max_hit_points: 20,
            ability_scores: AbilityScores {
                dexterity,
                ..AbilityScores::default()
            },
        }
    }

    /// Build a setup-stage combat. Dexterity 10 + 2*bonus yields the wanted
    /// initiative bonus per entity.
    fn setup_combat(entries: &[(&str, i32)]) -> (Combat, CombatLog, Vec<String>) {
        let mut combat = Combat::new("Skirmish", None);
        let mut log = CombatLog::new();
        let mut ids = Vec::new();
        for (name, bonus) in entries {
            let id = combat
                .add_entity(&snapshot(name, 10 + bonus * 2), GridPosition::new(0, 0), &mut log)
                .unwrap();
            ids.push(id);
        }
        (combat, log, ids)
    }

    #[test]
    fn test_combat_new() {
        let combat = Combat::new("Ambush", Some("At the ford".to_string()));
        assert_eq!(combat.status, CombatStatus::Setup);
        assert_eq!(combat.current_round, 0);
        assert!(combat.entities().is_empty());
        assert!(combat.initiative_order().is_empty());
        assert!(combat.rounds().is_empty());
        assert!(combat.start_time.is_none());
    }

    #[test]
    fn test_start_requires_roster_minimum() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 2)]);

        let result = combat.start(&mut BonusRoller, &mut log);
        assert_eq!(
            result,
            Transition::Failed(PreconditionError::NotEnoughEntities {
                required: 2,
                actual: 1
            })
        );
        assert_eq!(combat.status, CombatStatus::Setup);
        assert_eq!(combat.current_round, 0);
    }

    #[test]
    fn test_start_transitions_and_opens_round_one() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 2), ("B", 0)]);

        assert!(combat.start(&mut BonusRoller, &mut log).applied());
        assert_eq!(combat.status, CombatStatus::Active);
        assert_eq!(combat.current_round, 1);
        assert_eq!(combat.current_turn_index, 0);
        assert_eq!(combat.rounds().len(), 1);
        assert!(combat.start_time.is_some());

        // A has the higher bonus, so the higher roll, so the first slot.
        assert_eq!(combat.initiative_order(), &[ids[0].clone(), ids[1].clone()]);
        assert_eq!(combat.current_entity().unwrap().name, "A");

        // Starting again is a silent no-op.
        let result = combat.start(&mut BonusRoller, &mut log);
        assert!(matches!(result, Transition::Rejected { .. }));
        assert_eq!(combat.status, CombatStatus::Active);
    }

    #[test]
    fn test_pause_resume_guards() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 0), ("B", 0)]);

        // Not active yet: pause is ignored.
        assert!(matches!(combat.pause(&mut log), Transition::Rejected { .. }));
        assert_eq!(combat.status, CombatStatus::Setup);

        combat.start(&mut BonusRoller, &mut log);
        assert!(combat.pause(&mut log).applied());
        assert_eq!(combat.status, CombatStatus::Paused);

        assert!(matches!(combat.pause(&mut log), Transition::Rejected { .. }));
        assert!(combat.resume(&mut log).applied());
        assert_eq!(combat.status, CombatStatus::Active);
        assert!(matches!(combat.resume(&mut log), Transition::Rejected { .. }));
    }

    #[test]
    fn test_end_is_terminal() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        assert!(combat.end(&mut log).applied());
        assert_eq!(combat.status, CombatStatus::Ended);
        assert!(combat.end_time.is_some());
        assert!(combat.rounds().last().unwrap().end_time.is_some());

        // Everything is frozen now.
        assert!(matches!(combat.resume(&mut log), Transition::Rejected { .. }));
        assert!(matches!(combat.next_turn(&mut log), Transition::Rejected { .. }));
        assert_eq!(
            combat.add_entity(&snapshot("C", 0), GridPosition::new(0, 0), &mut log),
            Err(PreconditionError::CombatEnded)
        );
        assert_eq!(
            combat.update_hp(&ids[0], 5, 0, &mut log),
            Err(PreconditionError::CombatEnded)
        );
        assert!(matches!(
            combat.roll_initiative(&mut BonusRoller, &mut log),
            Transition::Rejected { .. }
        ));
    }

    #[test]
    fn test_end_from_paused() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 0), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);
        combat.pause(&mut log);

        assert!(combat.end(&mut log).applied());
        assert_eq!(combat.status, CombatStatus::Ended);
    }

    #[test]
    fn test_next_turn_wraps_into_new_round() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 2), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        assert!(combat.next_turn(&mut log).applied());
        assert_eq!(combat.current_turn_index, 1);
        assert_eq!(combat.current_round, 1);

        // Wrap: back to turn 0, round 2, previous round closed.
        assert!(combat.next_turn(&mut log).applied());
        assert_eq!(combat.current_turn_index, 0);
        assert_eq!(combat.current_round, 2);
        assert_eq!(combat.rounds().len(), 2);
        assert!(combat.rounds()[0].end_time.is_some());
        assert!(combat.rounds()[1].end_time.is_none());

        let round_starts: Vec<&str> = log
            .of_kind(LogEntryKind::System)
            .filter(|e| e.message.contains("Round"))
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(round_starts, &["Round 1 begins.", "Round 2 begins."]);
    }

    #[test]
    fn test_next_turn_rejected_outside_active() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 0), ("B", 0)]);

        assert!(matches!(combat.next_turn(&mut log), Transition::Rejected { .. }));

        combat.start(&mut BonusRoller, &mut log);
        combat.pause(&mut log);
        assert!(matches!(combat.next_turn(&mut log), Transition::Rejected { .. }));
        assert_eq!(combat.current_turn_index, 0);
    }

    #[test]
    fn test_previous_turn_is_intra_round_inverse() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 2), ("B", 1), ("C", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        combat.next_turn(&mut log);
        assert_eq!(combat.current_turn_index, 1);

        assert!(combat.previous_turn(&mut log).applied());
        assert_eq!(combat.current_turn_index, 0);
        assert_eq!(combat.current_round, 1);
        assert_eq!(combat.rounds().len(), 1);
    }

    #[test]
    fn test_previous_turn_discards_round_record() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 2), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        // Into round 2, then log an action there.
        combat.next_turn(&mut log);
        combat.next_turn(&mut log);
        assert_eq!(combat.current_round, 2);
        combat
            .add_action(
                NewAction::new(ids[0].clone(), ActionKind::Attack, "Swings wide"),
                &mut log,
            )
            .unwrap();
        assert_eq!(combat.rounds()[1].actions.len(), 1);

        // Backward across the boundary: round 2 and its actions are gone.
        assert!(combat.previous_turn(&mut log).applied());
        assert_eq!(combat.current_round, 1);
        assert_eq!(combat.current_turn_index, 1);
        assert_eq!(combat.rounds().len(), 1);
        assert!(combat.rounds()[0].end_time.is_none());
    }

    #[test]
    fn test_previous_turn_clamps_at_round_one() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 0), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        let result = combat.previous_turn(&mut log);
        assert!(matches!(result, Transition::Rejected { .. }));
        assert_eq!(combat.current_turn_index, 0);
        assert_eq!(combat.current_round, 1);
        assert_eq!(combat.rounds().len(), 1);
    }

    #[test]
    fn test_full_pass_returns_to_turn_zero() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 3), ("B", 2), ("C", 1)]);
        combat.start(&mut BonusRoller, &mut log);

        for _ in 0..combat.initiative_order().len() {
            combat.next_turn(&mut log);
        }
        assert_eq!(combat.current_turn_index, 0);
        assert_eq!(combat.current_round, 2);
        assert_eq!(combat.rounds().len(), 2);
    }

    #[test]
    fn test_initiative_stable_on_ties() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0), ("C", 0)]);

        combat.roll_initiative(&mut FlatRoller(11), &mut log);

        // All rolls equal: order is roster insertion order.
        assert_eq!(combat.initiative_order(), &ids[..]);
        for entity in combat.entities() {
            assert_eq!(entity.initiative, 11);
        }
    }

    #[test]
    fn test_reroll_in_setup_reorders() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 3)]);

        combat.roll_initiative(&mut BonusRoller, &mut log);
        assert_eq!(combat.initiative_order(), &[ids[1].clone(), ids[0].clone()]);

        combat.roll_initiative(&mut FlatRoller(5), &mut log);
        assert_eq!(combat.initiative_order(), &ids[..]);
    }

    #[test]
    fn test_entity_added_after_roll_waits_for_next_roll() {
        let (mut combat, mut log, _) = setup_combat(&[("A", 1), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        let late = combat
            .add_entity(&snapshot("C", 18), GridPosition::new(4, 4), &mut log)
            .unwrap();
        assert_eq!(combat.entity_count(), 3);
        assert_eq!(combat.initiative_order().len(), 2);
        assert_eq!(combat.entity(&late).unwrap().initiative, 0);

        combat.roll_initiative(&mut BonusRoller, &mut log);
        assert_eq!(combat.initiative_order().len(), 3);
        // Dex 18 gives +4, the highest bonus on the roster.
        assert_eq!(combat.initiative_order()[0], late);
    }

    #[test]
    fn test_remove_entity_does_not_compact_turn_index() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 2), ("B", 1), ("C", 0)]);
        combat.start(&mut BonusRoller, &mut log);
        combat.next_turn(&mut log);
        assert_eq!(combat.current_turn_index, 1);
        assert_eq!(combat.current_entity().unwrap().name, "B");

        // Remove the entity whose turn it is.
        combat.remove_entity(&ids[1], &mut log).unwrap();

        // Index unchanged, order shorter; the slot now names someone else.
        assert_eq!(combat.current_turn_index, 1);
        assert_eq!(combat.initiative_order().len(), 2);
        assert_eq!(combat.current_entity().unwrap().name, "C");
    }

    #[test]
    fn test_remove_last_slot_leaves_dangling_index() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 1), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);
        combat.next_turn(&mut log);
        assert_eq!(combat.current_turn_index, 1);

        combat.remove_entity(&ids[1], &mut log).unwrap();

        // The index now points past the end; current_entity is None until
        // the caller re-resolves.
        assert_eq!(combat.current_turn_index, 1);
        assert!(combat.current_entity().is_none());
    }

    #[test]
    fn test_update_hp_damage_healing_and_overheal() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        combat.update_hp(&ids[0], 12, 0, &mut log).unwrap();
        let damage: Vec<_> = log.of_kind(LogEntryKind::Damage).collect();
        assert_eq!(damage.len(), 1);
        assert_eq!(damage[0].amount, Some(8));
        assert_eq!(damage[0].target_id.as_deref(), Some(ids[0].as_str()));

        combat.update_hp(&ids[0], 18, 0, &mut log).unwrap();
        let healing: Vec<_> = log.of_kind(LogEntryKind::Healing).collect();
        assert_eq!(healing.len(), 1);
        assert_eq!(healing[0].amount, Some(6));

        // Overheal is allowed to persist above the maximum.
        combat.update_hp(&ids[0], 25, 0, &mut log).unwrap();
        assert_eq!(combat.entity(&ids[0]).unwrap().hit_points.current, 25);
        assert_eq!(combat.entity(&ids[0]).unwrap().hit_points.maximum, 20);
    }

    #[test]
    fn test_update_hp_clamps_below_zero_and_logs_death_once() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        combat.update_hp(&ids[0], -7, 0, &mut log).unwrap();
        assert_eq!(combat.entity(&ids[0]).unwrap().hit_points.current, 0);
        assert_eq!(log.of_kind(LogEntryKind::Death).count(), 1);

        // Still at 0: no second death entry.
        combat.update_hp(&ids[0], 0, 0, &mut log).unwrap();
        assert_eq!(log.of_kind(LogEntryKind::Death).count(), 1);

        // Back up, then down again: a second zero-crossing narrates again.
        combat.update_hp(&ids[0], 5, 0, &mut log).unwrap();
        combat.update_hp(&ids[0], 0, 0, &mut log).unwrap();
        assert_eq!(log.of_kind(LogEntryKind::Death).count(), 2);
    }

    #[test]
    fn test_update_hp_temporary_clamped() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0)]);

        combat.update_hp(&ids[0], 20, -3, &mut log).unwrap();
        assert_eq!(combat.entity(&ids[0]).unwrap().hit_points.temporary, 0);

        combat.update_hp(&ids[0], 20, 8, &mut log).unwrap();
        assert_eq!(combat.entity(&ids[0]).unwrap().hit_points.temporary, 8);
    }

    #[test]
    fn test_conditions_narrate_only_on_change() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0)]);

        assert!(combat.add_condition(&ids[0], "prone", &mut log).unwrap());
        assert!(!combat.add_condition(&ids[0], "prone", &mut log).unwrap());
        assert_eq!(log.of_kind(LogEntryKind::Condition).count(), 1);

        assert!(combat.remove_condition(&ids[0], "prone", &mut log).unwrap());
        assert!(!combat.remove_condition(&ids[0], "prone", &mut log).unwrap());
        assert_eq!(log.of_kind(LogEntryKind::Condition).count(), 2);
    }

    #[test]
    fn test_move_entity_records_action_once_started() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0)]);

        // During setup: position changes and narration happens, no action
        // record (there is no round yet).
        combat.move_entity(&ids[0], GridPosition::new(3, 1), &mut log).unwrap();
        assert_eq!(combat.entity(&ids[0]).unwrap().position, GridPosition::new(3, 1));
        assert_eq!(log.of_kind(LogEntryKind::Action).count(), 1);

        combat.start(&mut BonusRoller, &mut log);
        combat.move_entity(&ids[0], GridPosition::new(5, 2), &mut log).unwrap();

        let actions = &combat.rounds()[0].actions;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Move);
        assert_eq!(
            actions[0].movement,
            Some(Movement {
                from: GridPosition::new(3, 1),
                to: GridPosition::new(5, 2),
            })
        );
    }

    #[test]
    fn test_add_action_requires_open_round() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0)]);

        let result = combat.add_action(
            NewAction::new(ids[0].clone(), ActionKind::Attack, "Too eager"),
            &mut log,
        );
        assert_eq!(result, Err(PreconditionError::NotStarted));

        let result = combat.add_action(
            NewAction::new("nobody", ActionKind::Attack, "Ghost swing"),
            &mut log,
        );
        assert_eq!(result, Err(PreconditionError::UnknownEntity("nobody".to_string())));
    }

    #[test]
    fn test_add_action_appends_and_mirrors_to_log() {
        let (mut combat, mut log, ids) = setup_combat(&[("A", 0), ("B", 0)]);
        combat.start(&mut BonusRoller, &mut log);

        let action = NewAction::new(ids[0].clone(), ActionKind::Spell, "Casts burning hands")
            .with_target(ids[1].clone())
            .with_damage(12, "fire")
            .with_spell_slot(1);
        combat.add_action(action, &mut log).unwrap();

        let recorded = &combat.rounds()[0].actions[0];
        assert_eq!(recorded.kind, ActionKind::Spell);
        assert_eq!(recorded.round, 1);
        assert_eq!(recorded.spell_slot, Some(1));
        assert_eq!(recorded.target.as_deref(), Some(ids[1].as_str()));

        // Damage payload mirrors as a damage narration credited to the actor.
        let mirrored: Vec<_> = log.of_kind(LogEntryKind::Damage).collect();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].entity_id.as_deref(), Some(ids[0].as_str()));
        assert_eq!(mirrored[0].target_id.as_deref(), Some(ids[1].as_str()));
        assert_eq!(mirrored[0].amount, Some(12));
    }

    #[test]
    fn test_manager_basic() {
        let mut manager = CombatManager::new();

        let combat = Combat::new("One", None);
        let id = combat.id.clone();
        manager.add(combat);
        manager.add(Combat::new("Two", None));

        assert_eq!(manager.count(), 2);
        assert_eq!(manager.active_count(), 0);
        assert!(manager.get(&id).is_some());

        let removed = manager.remove(&id);
        assert!(removed.is_some());
        assert_eq!(manager.count(), 1);
    }
}
