// Battle orchestration: the one stateful workflow in the system. Selects a
// random eligible opponent, asks the battle model for an outcome, applies
// damage and win/loss counters, and persists both combatants.

use rand::Rng;
use serde::Serialize;

use crate::creature::Creature;
use crate::gateway::{fallback_outcome, BattleGateway, BattleOutcome};
use crate::metrics;
use crate::store::{CreatureStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("No worthy opponents found (or everyone is dead). Upload more bugs to populate the arena!")]
    NoEligibleOpponents,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the caller needs to render one finished battle. The fighter
/// and opponent carry their post-battle HP and counters, so the interface
/// can reflect the result without a reload (and a rematch can reuse the
/// updated fighter directly).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleReport {
    pub log: Vec<String>,
    pub winner_id: String,
    pub fighter: Creature,
    pub opponent: Creature,
}

/// Creatures a fighter may be matched against: a different owner, and still
/// standing.
pub fn eligible_opponents(collection: &[Creature], fighter_owner_id: &str) -> Vec<Creature> {
    collection
        .iter()
        .filter(|c| c.owner_id != fighter_owner_id && c.current_hp > 0.0)
        .cloned()
        .collect()
}

/// New HP after taking a hit, floored at zero.
pub fn apply_damage(current_hp: f64, damage_taken: i64) -> f64 {
    (current_hp - damage_taken as f64).round().max(0.0)
}

fn apply_outcome(fighter: &Creature, opponent: &Creature, outcome: &BattleOutcome) -> (Creature, Creature) {
    // The reported winner id is trusted as-is. Anything that is not the
    // fighter's id makes the opponent the winner.
    let fighter_won = outcome.winner_id == fighter.id;
    let (winner, loser) = if fighter_won {
        (fighter, opponent)
    } else {
        (opponent, fighter)
    };

    let mut winner = winner.clone();
    winner.current_hp = apply_damage(winner.current_hp, outcome.damage_dealt_to_winner);
    winner.wins += 1;

    let mut loser = loser.clone();
    loser.current_hp = apply_damage(loser.current_hp, outcome.damage_dealt_to_loser);
    loser.losses += 1;

    if fighter_won {
        (winner, loser)
    } else {
        (loser, winner)
    }
}

/// Run one battle for the given fighter. The collection is re-fetched first
/// to reduce (not eliminate) staleness; across concurrent invocations the
/// store is last-write-wins with no transactional guard.
///
/// A gateway failure is absorbed: the deterministic no-harm fallback keeps
/// both HP totals intact, declares the fighter winner by convention, and
/// still moves the counters.
pub async fn run_battle(
    store: &dyn CreatureStore,
    gateway: &dyn BattleGateway,
    fighter: &Creature,
) -> Result<BattleReport, ArenaError> {
    let collection = store.list_creatures().await?;
    let pool = eligible_opponents(&collection, &fighter.owner_id);
    if pool.is_empty() {
        return Err(ArenaError::NoEligibleOpponents);
    }

    let opponent = {
        let mut rng = rand::thread_rng();
        pool[rng.gen_range(0..pool.len())].clone()
    };

    let outcome = match gateway.simulate_battle(fighter, &opponent).await {
        Ok(outcome) => {
            metrics::BATTLES_RESOLVED_TOTAL
                .with_label_values(&["resolved"])
                .inc();
            outcome
        }
        Err(e) => {
            tracing::warn!("Battle gateway failed, using fallback outcome: {e}");
            metrics::GATEWAY_ERRORS_TOTAL
                .with_label_values(&["battle"])
                .inc();
            metrics::BATTLES_RESOLVED_TOTAL
                .with_label_values(&["fallback"])
                .inc();
            fallback_outcome(&fighter.id)
        }
    };

    let (updated_fighter, updated_opponent) = apply_outcome(fighter, &opponent, &outcome);

    store.update_creature(&updated_fighter).await?;
    store.update_creature(&updated_opponent).await?;

    Ok(BattleReport {
        log: outcome.log,
        winner_id: outcome.winner_id,
        fighter: updated_fighter,
        opponent: updated_opponent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::{CreatureProfile, StatBlock};

    fn creature(id: &str, owner: &str, hp: f64) -> Creature {
        let mut c = Creature::recruit(
            id.to_string(),
            owner,
            owner,
            CreatureProfile {
                species: "Test bug".into(),
                description: "desc".into(),
                stats: StatBlock {
                    strength: 50,
                    attack: 50,
                    size: 60,
                    willingness_to_live: 50,
                    stamina: 40,
                    agility: 50,
                    quantity: 1,
                },
            },
            "img".into(),
            None,
        );
        c.current_hp = hp;
        c
    }

    #[test]
    fn test_apply_damage_floors_at_zero() {
        assert_eq!(apply_damage(150.0, 20), 130.0);
        assert_eq!(apply_damage(30.0, 90), 0.0);
        assert_eq!(apply_damage(0.0, 10), 0.0);
    }

    #[test]
    fn test_apply_damage_rounds() {
        assert_eq!(apply_damage(116.5, 10), 107.0);
        assert_eq!(apply_damage(100.4, 0), 100.0);
    }

    #[test]
    fn test_eligible_opponents_excludes_own_and_defeated() {
        let collection = vec![
            creature("mine", "me", 100.0),
            creature("dead", "rival", 0.0),
            creature("alive", "rival", 80.0),
        ];
        let pool = eligible_opponents(&collection, "me");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, "alive");
    }

    #[test]
    fn test_eligible_opponents_empty_when_everyone_is_mine() {
        let collection = vec![creature("a", "me", 100.0), creature("b", "me", 50.0)];
        assert!(eligible_opponents(&collection, "me").is_empty());
    }

    #[test]
    fn test_apply_outcome_fighter_wins() {
        let fighter = creature("a", "me", 150.0);
        let opponent = creature("b", "rival", 120.0);
        let outcome = BattleOutcome {
            log: vec!["clash".into()],
            winner_id: "a".into(),
            damage_dealt_to_winner: 20,
            damage_dealt_to_loser: 90,
        };

        let (f, o) = apply_outcome(&fighter, &opponent, &outcome);
        assert_eq!(f.current_hp, 130.0);
        assert_eq!(f.wins, 1);
        assert_eq!(f.losses, 0);
        assert_eq!(o.current_hp, 30.0);
        assert_eq!(o.losses, 1);
        assert_eq!(o.wins, 0);
    }

    #[test]
    fn test_apply_outcome_opponent_wins() {
        let fighter = creature("a", "me", 150.0);
        let opponent = creature("b", "rival", 120.0);
        let outcome = BattleOutcome {
            log: vec![],
            winner_id: "b".into(),
            damage_dealt_to_winner: 15,
            damage_dealt_to_loser: 200,
        };

        let (f, o) = apply_outcome(&fighter, &opponent, &outcome);
        assert_eq!(f.current_hp, 0.0);
        assert_eq!(f.losses, 1);
        assert_eq!(o.current_hp, 105.0);
        assert_eq!(o.wins, 1);
    }

    #[test]
    fn test_apply_outcome_trusts_unknown_winner_id() {
        // Hardening opportunity: a winner id that is neither combatant is
        // taken at face value and credits the opponent with the win.
        let fighter = creature("a", "me", 150.0);
        let opponent = creature("b", "rival", 120.0);
        let outcome = BattleOutcome {
            log: vec![],
            winner_id: "someone-else".into(),
            damage_dealt_to_winner: 0,
            damage_dealt_to_loser: 0,
        };

        let (f, o) = apply_outcome(&fighter, &opponent, &outcome);
        assert_eq!(f.losses, 1);
        assert_eq!(o.wins, 1);
    }

    #[test]
    fn test_max_hp_untouched_by_outcome() {
        let fighter = creature("a", "me", 150.0);
        let opponent = creature("b", "rival", 120.0);
        let outcome = BattleOutcome {
            log: vec![],
            winner_id: "a".into(),
            damage_dealt_to_winner: 49,
            damage_dealt_to_loser: 50,
        };
        let (f, o) = apply_outcome(&fighter, &opponent, &outcome);
        assert_eq!(f.max_hp, fighter.max_hp);
        assert_eq!(o.max_hp, opponent.max_hp);
    }
}
