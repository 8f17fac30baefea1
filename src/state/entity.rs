//! Combat entities and the snapshot adapter.
//!
//! An entity joins an encounter as a copy of an external character or NPC
//! record. The copy is taken once, at join time, and never synced back to
//! the source record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six ability scores carried on an entity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl AbilityScores {
    /// Standard ability modifier: `(score - 10) / 2`, rounded down.
    pub fn modifier(score: i32) -> i32 {
        (score - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// What kind of participant an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Npc,
    Monster,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Npc => "npc",
            Self::Monster => "monster",
        }
    }
}

/// Snapshot of an external character or NPC record, supplied by the caller
/// when an entity joins combat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Id of the source record
    pub id: String,

    /// Display name
    pub name: String,

    /// Participant kind; decides which back-reference is kept
    pub kind: EntityKind,

    pub armor_class: i32,
    pub current_hit_points: i32,
    pub max_hit_points: i32,
    pub ability_scores: AbilityScores,
}

/// Hit point pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    pub temporary: i32,
}

impl HitPoints {
    /// Create a pool with `current` clamped into `0..=maximum`.
    pub fn new(current: i32, maximum: i32) -> Self {
        let maximum = maximum.max(0);
        Self {
            current: current.max(0).min(maximum),
            maximum,
            temporary: 0,
        }
    }
}

/// Position on the external map grid. Opaque to the engine; only used to
/// narrate movement deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// External grid description: dimensions and obstacles. The engine carries
/// it for the caller but never validates movement against it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombatMap {
    pub width: u32,
    pub height: u32,
    pub obstacles: Vec<GridPosition>,
}

/// One participant in an encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatEntity {
    /// Engine-assigned id, unique within the encounter
    pub id: String,

    /// Display name
    pub name: String,

    /// Participant kind
    pub kind: EntityKind,

    /// Back-reference to the character record this was snapshotted from
    pub character_id: Option<String>,

    /// Back-reference to the NPC record this was snapshotted from
    pub npc_id: Option<String>,

    pub armor_class: i32,
    pub hit_points: HitPoints,

    /// Resolved roll value; 0 until initiative is rolled
    pub initiative: i32,

    /// Static modifier fed into every re-roll
    pub initiative_bonus: i32,

    /// Current position on the external grid
    pub position: GridPosition,

    /// Condition labels, no duplicates
    conditions: Vec<String>,

    pub is_player_controlled: bool,
}

impl CombatEntity {
    /// Build a combat entity from an external snapshot.
    ///
    /// The initiative bonus is derived from dexterity; the back-reference
    /// (`character_id` or `npc_id`) follows the snapshot kind.
    pub fn from_snapshot(snapshot: &EntitySnapshot, position: GridPosition) -> Self {
        let (character_id, npc_id) = match snapshot.kind {
            EntityKind::Player => (Some(snapshot.id.clone()), None),
            EntityKind::Npc | EntityKind::Monster => (None, Some(snapshot.id.clone())),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            name: snapshot.name.clone(),
            kind: snapshot.kind,
            character_id,
            npc_id,
            armor_class: snapshot.armor_class,
            hit_points: HitPoints::new(snapshot.current_hit_points, snapshot.max_hit_points),
            initiative: 0,
            initiative_bonus: AbilityScores::modifier(snapshot.ability_scores.dexterity),
            position,
            conditions: Vec::new(),
            is_player_controlled: snapshot.kind == EntityKind::Player,
        }
    }

    /// Add a condition label. Returns false if it was already present.
    pub fn add_condition(&mut self, label: &str) -> bool {
        if self.has_condition(label) {
            return false;
        }
        self.conditions.push(label.to_string());
        true
    }

    /// Remove a condition label. Returns false if it was not present.
    pub fn remove_condition(&mut self, label: &str) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c != label);
        self.conditions.len() != before
    }

    pub fn has_condition(&self, label: &str) -> bool {
        self.conditions.iter().any(|c| c == label)
    }

    /// Conditions in the order they were applied.
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn is_alive(&self) -> bool {
        self.hit_points.current > 0
    }

    /// Convert to JSON for sending to clients.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "type": self.kind.as_str(),
            "character_id": self.character_id,
            "npc_id": self.npc_id,
            "armor_class": self.armor_class,
            "hit_points": {
                "current": self.hit_points.current,
                "maximum": self.hit_points.maximum,
                "temporary": self.hit_points.temporary
            },
            "initiative": self.initiative,
            "initiative_bonus": self.initiative_bonus,
            "position": { "x": self.position.x, "y": self.position.y },
            "conditions": self.conditions,
            "is_player_controlled": self.is_player_controlled
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(kind: EntityKind, dexterity: i32) -> EntitySnapshot {
        EntitySnapshot {
            id: "record-1".to_string(),
            name: "Mira".to_string(),
            kind,
            armor_class: 15,
            current_hit_points: 24,
            max_hit_points: 30,
            ability_scores: AbilityScores {
                dexterity,
                ..AbilityScores::default()
            },
        }
    }

    #[test]
    fn test_ability_modifier() {
        assert_eq!(AbilityScores::modifier(10), 0);
        assert_eq!(AbilityScores::modifier(11), 0);
        assert_eq!(AbilityScores::modifier(14), 2);
        assert_eq!(AbilityScores::modifier(8), -1);
        assert_eq!(AbilityScores::modifier(7), -2);
        assert_eq!(AbilityScores::modifier(20), 5);
    }

    #[test]
    fn test_from_snapshot_player() {
        let entity = CombatEntity::from_snapshot(&snapshot(EntityKind::Player, 16), GridPosition::new(1, 2));

        assert_eq!(entity.character_id.as_deref(), Some("record-1"));
        assert_eq!(entity.npc_id, None);
        assert!(entity.is_player_controlled);
        assert_eq!(entity.initiative_bonus, 3);
        assert_eq!(entity.initiative, 0);
        assert_eq!(entity.position, GridPosition::new(1, 2));
        assert_eq!(entity.hit_points.current, 24);
        assert_eq!(entity.hit_points.maximum, 30);
        assert_eq!(entity.hit_points.temporary, 0);
    }

    #[test]
    fn test_from_snapshot_monster() {
        let entity = CombatEntity::from_snapshot(&snapshot(EntityKind::Monster, 10), GridPosition::new(0, 0));

        assert_eq!(entity.character_id, None);
        assert_eq!(entity.npc_id.as_deref(), Some("record-1"));
        assert!(!entity.is_player_controlled);
        assert_eq!(entity.initiative_bonus, 0);
    }

    #[test]
    fn test_hit_points_clamped_at_creation() {
        let hp = HitPoints::new(-5, 20);
        assert_eq!(hp.current, 0);

        let hp = HitPoints::new(50, 20);
        assert_eq!(hp.current, 20);
    }

    #[test]
    fn test_condition_set_semantics() {
        let mut entity = CombatEntity::from_snapshot(&snapshot(EntityKind::Player, 10), GridPosition::new(0, 0));

        assert!(entity.add_condition("prone"));
        assert!(!entity.add_condition("prone")); // No duplicate
        assert!(entity.add_condition("poisoned"));
        assert_eq!(entity.conditions(), &["prone", "poisoned"]);

        assert!(entity.remove_condition("prone"));
        assert!(!entity.remove_condition("prone"));
        assert_eq!(entity.conditions(), &["poisoned"]);
    }
}
