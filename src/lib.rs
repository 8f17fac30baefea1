//! Encounter State Library
//!
//! This crate provides state management for turn-based tabletop combat
//! encounters.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Encounter State Machine** - Tracks each combat's lifecycle (setup,
//!   active, paused, ended) and turn/round advancement with validated
//!   transitions.
//!
//! - **Roster Management** - Entities join from external character/NPC
//!   snapshots; hit points, conditions and positions mutate through the
//!   engine so every change is narrated.
//!
//! - **Initiative Rolling** - Swappable roll strategies that keep the
//!   "higher bonus, higher roll" contract, sorted into a stable turn order.
//!
//! - **Action & Narration Logs** - Mechanical actions recorded per round,
//!   plus a separate human-readable log stream per combat. Both append-only.
//!
//! - **Recaps** - Post-encounter summaries derived purely from the logs.
//!
//! # Design Principles
//!
//! 1. **State machines guard transitions** - Invalid lifecycle calls are
//!    silently rejected (the UI disables them); caller mistakes fail with
//!    explicit precondition errors.
//!
//! 2. **Combats are plain values** - No globals, no interior mutability.
//!    Multiple encounters run independently; callers own persistence.
//!
//! 3. **Two append-only logs** - The per-round action list is the
//!    mechanical record; the narration stream feeds a scrolling log panel
//!    and the recap.
//!
//! 4. **No rule math** - Attack rolls, saves and damage arrive already
//!    resolved; the engine only tracks state and narrates it.
//!
//! # Example
//!
//! ```rust
//! use encounter_state::state::{
//!     AbilityScores, EncounterState, EntityKind, EntitySnapshot, GridPosition,
//! };
//!
//! let mut state = EncounterState::new();
//! let combat_id = state.create_combat("Ambush at the ford", None);
//!
//! let mira = EntitySnapshot {
//!     id: "char-1".to_string(),
//!     name: "Mira".to_string(),
//!     kind: EntityKind::Player,
//!     armor_class: 16,
//!     current_hit_points: 24,
//!     max_hit_points: 24,
//!     ability_scores: AbilityScores { dexterity: 16, ..AbilityScores::default() },
//! };
//! let goblin = EntitySnapshot {
//!     id: "npc-7".to_string(),
//!     name: "Goblin".to_string(),
//!     kind: EntityKind::Monster,
//!     armor_class: 13,
//!     current_hit_points: 7,
//!     max_hit_points: 7,
//!     ability_scores: AbilityScores::default(),
//! };
//!
//! let mira_id = state.add_entity(&combat_id, &mira, GridPosition::new(0, 0)).unwrap();
//! state.add_entity(&combat_id, &goblin, GridPosition::new(3, 2)).unwrap();
//!
//! // Starting rolls initiative and opens round 1.
//! assert!(state.start(&combat_id).applied());
//!
//! // Mutations narrate themselves into the combat's log stream.
//! state.update_hp(&combat_id, &mira_id, 12, 0).unwrap();
//! assert!(!state.log(&combat_id).unwrap().is_empty());
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
