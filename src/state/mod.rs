//! State management for combat encounters.
//!
//! This module provides the core state types and managers:
//!
//! - `entity` - Combat entities and the external snapshot adapter
//! - `combat` - The `Combat` aggregate, lifecycle and roster mutation
//! - `initiative` - Initiative rolling strategies
//! - `log` - The narration log stream, one per combat
//! - `recap` - Post-encounter summaries
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       EncounterState                         │
//! │                                                              │
//! │  ┌─────────────────┐           ┌─────────────────┐           │
//! │  │  CombatManager  │           │   LogManager    │           │
//! │  │                 │           │                 │           │
//! │  │ combat_id →     │           │ combat_id →     │           │
//! │  │   Combat        │           │   CombatLog     │           │
//! │  └─────────────────┘           └─────────────────┘           │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              CombatStatus (per combat)                 │  │
//! │  │                                                        │  │
//! │  │     Setup ──▶ Active ◀──▶ Paused ──▶ Ended             │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each combat is an independent value: the aggregate holds the roster,
//! initiative order and round records, while its narration stream lives in
//! the `LogManager` under the same id. Every engine call is synchronous and
//! either applies, is silently rejected (invalid-for-this-status lifecycle
//! calls), or fails a precondition (caller mistakes).
//!
//! # Usage
//!
//! ```rust,ignore
//! use encounter_state::state::{EncounterState, NewAction, ActionKind};
//!
//! let mut state = EncounterState::new();
//! let combat_id = state.create_combat("Ambush at the ford", None);
//! // ... add at least two entities ...
//! state.start(&combat_id);
//! state.next_turn(&combat_id);
//! let recap = state.generate_recap(&combat_id)?;
//! ```

pub mod combat;
pub mod entity;
pub mod initiative;
pub mod log;
pub mod recap;

// Re-export commonly used types
pub use combat::{
    ActionKind, Combat, CombatAction, CombatManager, CombatRound, CombatStatus, DamageRoll,
    Movement, NewAction, PreconditionError, Transition, MIN_ENTITIES_TO_START,
};
pub use entity::{
    AbilityScores, CombatEntity, CombatMap, EntityKind, EntitySnapshot, GridPosition, HitPoints,
};
pub use initiative::{D20Roller, InitiativeRoller, WeightedRoller};
pub use log::{CombatLog, CombatLogEntry, LogEntryKind, LogManager};
pub use recap::{
    Aggregation, CombatRecap, Importance, MajorEvent, ParticipantSummary, RecapOptions,
};

/// Combined encounter state.
///
/// An optional convenience façade that keeps each combat and its narration
/// stream in step. The managers are public; callers that want to drive a
/// `Combat` value directly can still do so.
pub struct EncounterState {
    pub combats: CombatManager,
    pub logs: LogManager,
    pub recap_options: RecapOptions,
    roller: Box<dyn InitiativeRoller>,
}

impl std::fmt::Debug for EncounterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncounterState")
            .field("combats", &self.combats)
            .field("logs", &self.logs)
            .field("recap_options", &self.recap_options)
            .finish_non_exhaustive()
    }
}

impl Default for EncounterState {
    fn default() -> Self {
        Self::new()
    }
}

impl EncounterState {
    /// Create an empty state with the default initiative roller.
    pub fn new() -> Self {
        Self {
            combats: CombatManager::new(),
            logs: LogManager::new(),
            recap_options: RecapOptions::default(),
            roller: Box::new(WeightedRoller::new()),
        }
    }

    /// Create an empty state with a specific initiative roller.
    pub fn with_roller(roller: Box<dyn InitiativeRoller>) -> Self {
        Self {
            combats: CombatManager::new(),
            logs: LogManager::new(),
            recap_options: RecapOptions::default(),
            roller,
        }
    }

    /// Create a new encounter in setup. Returns its id.
    pub fn create_combat(&mut self, name: impl Into<String>, description: Option<String>) -> String {
        let combat = Combat::new(name, description);
        let id = combat.id.clone();
        self.logs.create(&id);
        self.combats.add(combat);
        id
    }

    pub fn combat(&self, combat_id: &str) -> Option<&Combat> {
        self.combats.get(combat_id)
    }

    pub fn log(&self, combat_id: &str) -> Option<&CombatLog> {
        self.logs.get(combat_id)
    }

    /// Remove a combat and hand back the aggregate and its stream, e.g.
    /// for persistence once the encounter is over. Nothing is swept
    /// automatically; an ended combat stays available for recaps until the
    /// caller removes it.
    pub fn remove_combat(&mut self, combat_id: &str) -> Option<(Combat, CombatLog)> {
        let combat = self.combats.remove(combat_id)?;
        let log = self.logs.remove(combat_id).unwrap_or_default();
        Some((combat, log))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn start(&mut self, combat_id: &str) -> Transition {
        match self.combats.get_mut(combat_id) {
            Some(combat) => combat.start(self.roller.as_mut(), self.logs.create(combat_id)),
            None => Transition::Failed(PreconditionError::UnknownCombat),
        }
    }

    pub fn pause(&mut self, combat_id: &str) -> Transition {
        match self.combats.get_mut(combat_id) {
            Some(combat) => combat.pause(self.logs.create(combat_id)),
            None => Transition::Failed(PreconditionError::UnknownCombat),
        }
    }

    pub fn resume(&mut self, combat_id: &str) -> Transition {
        match self.combats.get_mut(combat_id) {
            Some(combat) => combat.resume(self.logs.create(combat_id)),
            None => Transition::Failed(PreconditionError::UnknownCombat),
        }
    }

    pub fn end(&mut self, combat_id: &str) -> Transition {
        match self.combats.get_mut(combat_id) {
            Some(combat) => combat.end(self.logs.create(combat_id)),
            None => Transition::Failed(PreconditionError::UnknownCombat),
        }
    }

    pub fn next_turn(&mut self, combat_id: &str) -> Transition {
        match self.combats.get_mut(combat_id) {
            Some(combat) => combat.next_turn(self.logs.create(combat_id)),
            None => Transition::Failed(PreconditionError::UnknownCombat),
        }
    }

    pub fn previous_turn(&mut self, combat_id: &str) -> Transition {
        match self.combats.get_mut(combat_id) {
            Some(combat) => combat.previous_turn(self.logs.create(combat_id)),
            None => Transition::Failed(PreconditionError::UnknownCombat),
        }
    }

    pub fn roll_initiative(&mut self, combat_id: &str) -> Transition {
        match self.combats.get_mut(combat_id) {
            Some(combat) => combat.roll_initiative(self.roller.as_mut(), self.logs.create(combat_id)),
            None => Transition::Failed(PreconditionError::UnknownCombat),
        }
    }

    // ------------------------------------------------------------------
    // Roster mutation
    // ------------------------------------------------------------------

    /// Add an entity from an external snapshot. Returns the entity id.
    pub fn add_entity(
        &mut self,
        combat_id: &str,
        snapshot: &EntitySnapshot,
        position: GridPosition,
    ) -> Result<String, PreconditionError> {
        let combat = self
            .combats
            .get_mut(combat_id)
            .ok_or(PreconditionError::UnknownCombat)?;
        combat.add_entity(snapshot, position, self.logs.create(combat_id))
    }

    pub fn remove_entity(
        &mut self,
        combat_id: &str,
        entity_id: &str,
    ) -> Result<CombatEntity, PreconditionError> {
        let combat = self
            .combats
            .get_mut(combat_id)
            .ok_or(PreconditionError::UnknownCombat)?;
        combat.remove_entity(entity_id, self.logs.create(combat_id))
    }

    pub fn update_hp(
        &mut self,
        combat_id: &str,
        entity_id: &str,
        new_current: i32,
        new_temporary: i32,
    ) -> Result<(), PreconditionError> {
        let combat = self
            .combats
            .get_mut(combat_id)
            .ok_or(PreconditionError::UnknownCombat)?;
        combat.update_hp(entity_id, new_current, new_temporary, self.logs.create(combat_id))
    }

    pub fn add_condition(
        &mut self,
        combat_id: &str,
        entity_id: &str,
        label: &str,
    ) -> Result<bool, PreconditionError> {
        let combat = self
            .combats
            .get_mut(combat_id)
            .ok_or(PreconditionError::UnknownCombat)?;
        combat.add_condition(entity_id, label, self.logs.create(combat_id))
    }

    pub fn remove_condition(
        &mut self,
        combat_id: &str,
        entity_id: &str,
        label: &str,
    ) -> Result<bool, PreconditionError> {
        let combat = self
            .combats
            .get_mut(combat_id)
            .ok_or(PreconditionError::UnknownCombat)?;
        combat.remove_condition(entity_id, label, self.logs.create(combat_id))
    }

    pub fn move_entity(
        &mut self,
        combat_id: &str,
        entity_id: &str,
        to: GridPosition,
    ) -> Result<(), PreconditionError> {
        let combat = self
            .combats
            .get_mut(combat_id)
            .ok_or(PreconditionError::UnknownCombat)?;
        combat.move_entity(entity_id, to, self.logs.create(combat_id))
    }

    /// Record an action in the current round. Returns the action id.
    pub fn add_action(
        &mut self,
        combat_id: &str,
        action: NewAction,
    ) -> Result<String, PreconditionError> {
        let combat = self
            .combats
            .get_mut(combat_id)
            .ok_or(PreconditionError::UnknownCombat)?;
        combat.add_action(action, self.logs.create(combat_id))
    }

    // ------------------------------------------------------------------
    // Recap
    // ------------------------------------------------------------------

    /// Build the post-encounter summary for a finished combat.
    pub fn generate_recap(&self, combat_id: &str) -> Result<CombatRecap, PreconditionError> {
        let combat = self
            .combats
            .get(combat_id)
            .ok_or(PreconditionError::UnknownCombat)?;
        let log = self.logs.get(combat_id).ok_or(PreconditionError::UnknownCombat)?;
        CombatRecap::generate(combat, log, &self.recap_options)
    }
}
