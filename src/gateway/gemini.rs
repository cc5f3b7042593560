// Gemini generateContent client backing both gateways. Prompts go out with
// a JSON response schema so the model replies with machine-parseable text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Analysis, BattleGateway, BattleOutcome, GatewayError, InferenceGateway};
use crate::creature::{Creature, CreatureProfile, StatBlock};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    analysis_model: String,
    battle_model: String,
}

// ── REST envelope ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisResponse {
    is_bug: bool,
    species: Option<String>,
    description: Option<String>,
    insult: Option<String>,
    stats: Option<StatBlock>,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        base_url: String,
        analysis_model: String,
        battle_model: String,
    ) -> Self {
        GeminiClient {
            http: reqwest::Client::new(),
            api_key,
            base_url,
            analysis_model,
            battle_model,
        }
    }

    async fn generate(&self, model: &str, body: serde_json::Value) -> Result<String, GatewayError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| GatewayError::Malformed("empty model response".to_string()))
    }
}

/// Strip a `data:image/...;base64,` header if the client sent a data URL.
fn clean_base64(image: &str) -> &str {
    image.rsplit(',').next().unwrap_or(image)
}

fn analysis_prompt() -> &'static str {
    "Analyze this image. Is this a real insect, arachnid, or bug?\n\n\
     If it is NOT a bug (e.g. a cat, a car, a human, a drawing), return valid JSON with:\n\
     - isBug: false\n\
     - insult: A creative, mean, and funny name-calling insult for the user \
       (e.g. bozo, bimbo, walnut, cheater). Be savage.\n\n\
     If it IS a bug, return valid JSON with:\n\
     - isBug: true\n\
     - species: The scientific or common name.\n\
     - description: A one paragraph analysis of the bug's combat potential.\n\
     - stats: An object containing integer values 0-100 for: strength, attack, \
       size, willingnessToLive, stamina, agility, quantity."
}

fn analysis_schema() -> serde_json::Value {
    let dimension = || json!({ "type": "INTEGER" });
    json!({
        "type": "OBJECT",
        "properties": {
            "isBug": { "type": "BOOLEAN" },
            "species": { "type": "STRING" },
            "description": { "type": "STRING" },
            "insult": { "type": "STRING" },
            "stats": {
                "type": "OBJECT",
                "properties": {
                    "strength": dimension(),
                    "attack": dimension(),
                    "size": dimension(),
                    "willingnessToLive": dimension(),
                    "stamina": dimension(),
                    "agility": dimension(),
                    "quantity": dimension()
                }
            }
        }
    })
}

fn battle_prompt(fighter: &Creature, opponent: &Creature) -> String {
    let fighter_stats = serde_json::to_string(&fighter.stats).unwrap_or_default();
    let opponent_stats = serde_json::to_string(&opponent.stats).unwrap_or_default();
    format!(
        "Simulate a battle between two bugs.\n\n\
         Combatant 1: {} named \"{}\" owned by {}.\n\
         Stats: {}.\n\
         Description: {}.\n\
         Current HP: {}/{}.\n\n\
         Combatant 2: {} named \"{}\" owned by {}.\n\
         Stats: {}.\n\
         Description: {}.\n\
         Current HP: {}/{}.\n\n\
         Simulate a short, intense battle (3-5 rounds).\n\
         Decide a winner based on stats and RNG.\n\
         Calculated damage should be realistic (10-50 HP range per big hit).\n\n\
         Return JSON:\n\
         - log: Array of strings describing the action.\n\
         - winnerId: The ID of the winning bug ({} or {}).\n\
         - damageDealtToWinner: How much damage the winner TOOK during this specific fight.\n\
         - damageDealtToLoser: How much damage the loser TOOK during this specific fight \
           (usually enough to reduce to 0 or low, but don't kill them if it's close).",
        fighter.species,
        fighter.nickname.as_deref().unwrap_or("The Challenger"),
        fighter.owner_name,
        fighter_stats,
        fighter.description,
        fighter.current_hp,
        fighter.max_hp,
        opponent.species,
        opponent.nickname.as_deref().unwrap_or("The Defender"),
        opponent.owner_name,
        opponent_stats,
        opponent.description,
        opponent.current_hp,
        opponent.max_hp,
        fighter.id,
        opponent.id,
    )
}

fn battle_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "log": { "type": "ARRAY", "items": { "type": "STRING" } },
            "winnerId": { "type": "STRING" },
            "damageDealtToWinner": { "type": "INTEGER" },
            "damageDealtToLoser": { "type": "INTEGER" }
        }
    })
}

#[async_trait]
impl InferenceGateway for GeminiClient {
    async fn analyze_image(&self, image_base64: &str) -> Result<Analysis, GatewayError> {
        let body = json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": "image/jpeg",
                            "data": clean_base64(image_base64)
                        }
                    },
                    { "text": analysis_prompt() }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": analysis_schema()
            }
        });

        let text = self.generate(&self.analysis_model, body).await?;
        let parsed: AnalysisResponse =
            serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))?;

        if !parsed.is_bug {
            return Ok(Analysis::Rejected {
                insult: parsed
                    .insult
                    .unwrap_or_else(|| "That's not a bug, that's a mistake.".to_string()),
            });
        }

        match (parsed.species, parsed.description, parsed.stats) {
            (Some(species), Some(description), Some(stats)) => {
                Ok(Analysis::Accepted(CreatureProfile {
                    species,
                    description,
                    stats,
                }))
            }
            _ => Err(GatewayError::Malformed(
                "accepted analysis is missing species, description, or stats".to_string(),
            )),
        }
    }
}

#[async_trait]
impl BattleGateway for GeminiClient {
    async fn simulate_battle(
        &self,
        fighter: &Creature,
        opponent: &Creature,
    ) -> Result<BattleOutcome, GatewayError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": battle_prompt(fighter, opponent) }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": battle_schema()
            }
        });

        let text = self.generate(&self.battle_model, body).await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}
