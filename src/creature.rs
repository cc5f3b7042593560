// Creature records: the persistent fighting units derived from bug photos.

use serde::{Deserialize, Serialize};

/// The seven combat dimensions the analysis model reports for a bug.
///
/// Values are intended to land in 0-100, but the model's output is taken
/// at face value and is not clamped anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatBlock {
    pub strength: i64,
    pub attack: i64,
    pub size: i64,
    pub willingness_to_live: i64,
    pub stamina: i64,
    pub agility: i64,
    pub quantity: i64,
}

/// What the inference gateway returns for an accepted bug, before the user
/// confirms recruitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatureProfile {
    pub species: String,
    pub description: String,
    pub stats: StatBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creature {
    pub id: String,
    pub owner_id: String,
    /// Denormalized at recruitment; not resynchronized if the owner renames.
    pub owner_name: String,
    pub species: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub description: String,
    pub image_url: String,
    pub stats: StatBlock,
    /// Derived once at recruitment, immutable afterwards.
    pub max_hp: f64,
    pub current_hp: f64,
    pub wins: i64,
    pub losses: i64,
    /// Unix timestamp in milliseconds.
    pub created_at: i64,
}

/// HP pool derived from the stat block. Computed exactly once, when a
/// creature is recruited; later stat edits (there is no edit path) would
/// not change it.
pub fn derive_max_hp(stats: &StatBlock) -> f64 {
    100.0 + 0.5 * stats.size as f64 + 0.5 * stats.stamina as f64
}

impl Creature {
    /// Build a fresh record from an accepted analysis. The caller supplies
    /// the identifier.
    pub fn recruit(
        id: String,
        owner_id: &str,
        owner_name: &str,
        profile: CreatureProfile,
        image_url: String,
        nickname: Option<String>,
    ) -> Self {
        let max_hp = derive_max_hp(&profile.stats);
        Creature {
            id,
            owner_id: owner_id.to_string(),
            owner_name: owner_name.to_string(),
            species: profile.species,
            nickname,
            description: profile.description,
            image_url,
            stats: profile.stats,
            max_hp,
            current_hp: max_hp,
            wins: 0,
            losses: 0,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// A defeated creature stays in the collection and the rankings but is
    /// excluded from opponent pools.
    pub fn is_defeated(&self) -> bool {
        self.current_hp <= 0.0
    }
}
