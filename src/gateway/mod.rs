// Contracts for the external model service: image analysis and battle
// narration. Both are plain request/response calls; the model's reasoning
// is a black box behind these traits.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::creature::{Creature, CreatureProfile};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model returned malformed output: {0}")]
    Malformed(String),
}

/// Result of running a photo through the analysis model.
#[derive(Debug, Clone)]
pub enum Analysis {
    /// The image is a bug; the profile is ready for recruitment.
    Accepted(CreatureProfile),
    /// Not a bug. The insult is display-only; nothing is persisted.
    Rejected { insult: String },
}

/// What the battle model reports for one encounter. Transient: consumed to
/// update the two combatant records, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleOutcome {
    /// Narrative lines, displayed in order.
    pub log: Vec<String>,
    /// Expected to be one of the two combatant ids. The caller does not
    /// verify this and will misattribute the result if the model strays.
    pub winner_id: String,
    /// HP the eventual winner lost during this encounter.
    pub damage_dealt_to_winner: i64,
    /// HP the eventual loser lost during this encounter.
    pub damage_dealt_to_loser: i64,
}

/// Deterministic stand-in used when the battle model is unreachable: a
/// no-harm draw with the fighter declared winner by convention. Counters
/// still move; HP does not.
pub fn fallback_outcome(fighter_id: &str) -> BattleOutcome {
    BattleOutcome {
        log: vec!["The arena collapsed! It's a draw due to technical difficulties.".to_string()],
        winner_id: fighter_id.to_string(),
        damage_dealt_to_winner: 0,
        damage_dealt_to_loser: 0,
    }
}

#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Analyze one image (base64 JPEG, data-URL header tolerated). Errors
    /// are retryable by the user; a rejection is a normal branch.
    async fn analyze_image(&self, image_base64: &str) -> Result<Analysis, GatewayError>;
}

#[async_trait]
pub trait BattleGateway: Send + Sync {
    /// Narrate one battle between two full creature snapshots and pick a
    /// winner. Callers must absorb failures; see `fallback_outcome`.
    async fn simulate_battle(
        &self,
        fighter: &Creature,
        opponent: &Creature,
    ) -> Result<BattleOutcome, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_outcome_is_harmless() {
        let outcome = fallback_outcome("bug-7");
        assert_eq!(outcome.winner_id, "bug-7");
        assert_eq!(outcome.damage_dealt_to_winner, 0);
        assert_eq!(outcome.damage_dealt_to_loser, 0);
        assert_eq!(outcome.log.len(), 1);
    }

    #[test]
    fn test_battle_outcome_wire_names() {
        let json = r#"{
            "log": ["clash"],
            "winnerId": "a",
            "damageDealtToWinner": 20,
            "damageDealtToLoser": 90
        }"#;
        let outcome: BattleOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.winner_id, "a");
        assert_eq!(outcome.damage_dealt_to_winner, 20);
        assert_eq!(outcome.damage_dealt_to_loser, 90);
    }
}
