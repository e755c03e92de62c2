//! Natural-language game analysis from a hosted language model.
//!
//! Every path returns a well-formed [`AiPrediction`]. Missing credentials,
//! quota exhaustion and transport errors produce a degraded prediction that
//! carries an explanatory message instead of an error.

use anyhow::{Context, Result, anyhow};
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::http_client::{http_client, snippet};
use crate::state::{Game, GameStatus, Language, OddsSource};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEMPERATURE: f64 = 0.4;
const DEGRADED_CONFIDENCE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPrediction {
    pub winner_id: String,
    /// Percentage in [0, 100].
    pub confidence: f64,
    pub reasoning: String,
    pub key_matchup_factor: String,
}

pub trait GameAnalyst: Send + Sync {
    fn analyze(&self, game: &Game, lang: Language) -> AiPrediction;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    MissingKey,
    Quota,
    Unavailable,
}

/// Used when no API key is configured.
pub struct DisabledAnalyst;

impl GameAnalyst for DisabledAnalyst {
    fn analyze(&self, game: &Game, lang: Language) -> AiPrediction {
        fallback_prediction(game, lang, FallbackReason::MissingKey)
    }
}

pub struct GeminiAnalyst {
    api_key: String,
    model: String,
}

impl GeminiAnalyst {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn request(&self, game: &Game, lang: Language) -> Result<AiPrediction> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(game, lang) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
                "temperature": TEMPERATURE,
            },
        });

        let resp = http_client()?
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header(USER_AGENT, "hoops-oracle/0.1")
            .json(&body)
            .send()
            .context("analysis request failed")?;
        let status = resp.status();
        let text = resp.text().context("failed reading analysis body")?;
        if !status.is_success() {
            return Err(anyhow!("analysis http {}: {}", status, snippet(&text)));
        }
        parse_generate_response(&text, game)
    }
}

impl GameAnalyst for GeminiAnalyst {
    fn analyze(&self, game: &Game, lang: Language) -> AiPrediction {
        match self.request(game, lang) {
            Ok(prediction) => prediction,
            Err(err) => {
                let reason = classify_failure(&format!("{err:#}"));
                warn!(game_id = %game.id, ?reason, %err, "analysis failed, returning degraded result");
                fallback_prediction(game, lang, reason)
            }
        }
    }
}

pub fn analyst_from_key(api_key: Option<&str>, model: &str) -> Box<dyn GameAnalyst> {
    match api_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Box::new(GeminiAnalyst::new(key, model)),
        None => Box::new(DisabledAnalyst),
    }
}

pub fn classify_failure(message: &str) -> FallbackReason {
    let lower = message.to_ascii_lowercase();
    if lower.contains("429") || lower.contains("quota") || lower.contains("exhausted") {
        FallbackReason::Quota
    } else {
        FallbackReason::Unavailable
    }
}

/// Same-shaped result for when the model cannot be reached. The winner is
/// whichever side the market currently favours.
pub fn fallback_prediction(game: &Game, lang: Language, reason: FallbackReason) -> AiPrediction {
    let winner = if game.market.home_win_prob > game.market.away_win_prob {
        &game.home
    } else {
        &game.away
    };
    let (reasoning, factor) = match (reason, lang) {
        (FallbackReason::MissingKey, Language::En) => (
            "Error: API key not configured. Set GEMINI_API_KEY in the environment.",
            "Missing API Key",
        ),
        (FallbackReason::MissingKey, Language::Zh) => (
            "錯誤：未設定 API 金鑰。請設定環境變數 GEMINI_API_KEY。",
            "缺少 API 金鑰",
        ),
        (FallbackReason::Quota, Language::En) => (
            "Free API quota exceeded. Please try again in a minute.",
            "API Limit",
        ),
        (FallbackReason::Quota, Language::Zh) => (
            "免費 API 額度已達上限。請稍後再試（約 1 分鐘）。",
            "API 限制",
        ),
        (FallbackReason::Unavailable, Language::En) => ("AI analysis unavailable.", "API Limit"),
        (FallbackReason::Unavailable, Language::Zh) => ("AI 分析暫時無法使用。", "API 限制"),
    };
    AiPrediction {
        winner_id: winner.id.clone(),
        confidence: DEGRADED_CONFIDENCE,
        reasoning: reasoning.to_string(),
        key_matchup_factor: factor.to_string(),
    }
}

pub fn build_prompt(game: &Game, lang: Language) -> String {
    let home = &game.home;
    let away = &game.away;
    let home_name = home.display_name(lang);
    let away_name = away.display_name(lang);
    let output_lang = match lang {
        Language::En => "English",
        Language::Zh => "Traditional Chinese (繁體中文)",
    };
    let source = match game.odds_source {
        OddsSource::PredictionMarket => "Polymarket (Prediction Market)",
        OddsSource::Sportsbook | OddsSource::Stats => "Sportsbook/Stats",
    };
    let (hscore, ascore) = match game.score.filter(|_| game.status != GameStatus::Scheduled) {
        Some(s) => (s.home.to_string(), s.away.to_string()),
        None => ("-".to_string(), "-".to_string()),
    };

    format!(
        "Act as a professional NBA sports analyst.\n\
         Analyze the following matchup and predict the winner.\n\
         Provide 'reasoning' and 'keyMatchupFactor' in {output_lang}.\n\
         Prediction data source: {source}\n\n\
         Home team: {home_name} ({hid})\n\
         - Record: {hrec}\n- PPG: {hppg:.1}\n- Opp PPG: {hoppg:.1}\n- Last 10: {hl10}\n- Score: {hscore}\n\n\
         Away team: {away_name} ({aid})\n\
         - Record: {arec}\n- PPG: {appg:.1}\n- Opp PPG: {aoppg:.1}\n- Last 10: {al10}\n- Score: {ascore}\n\n\
         Status: {status}\n\
         Market sentiment:\n- {home_name} win probability: {hp:.1}%\n- {away_name} win probability: {ap:.1}%\n\n\
         Task:\n1. Compare the season stats.\n2. Weigh the market probabilities heavily when available.\n\
         3. Pick a winner; winnerId must be {hid} or {aid}.",
        hid = home.id,
        hrec = home.record(),
        hppg = home.ppg,
        hoppg = home.oppg,
        hl10 = home.last10,
        aid = away.id,
        arec = away.record(),
        appg = away.ppg,
        aoppg = away.oppg,
        al10 = away.last10,
        status = game.status.label(),
        hp = game.market.home_win_prob * 100.0,
        ap = game.market.away_win_prob * 100.0,
    )
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "winnerId": {
                "type": "STRING",
                "description": "ID of the team predicted to win. Must match one of the input team IDs."
            },
            "confidence": { "type": "NUMBER", "description": "Confidence percentage from 0 to 100." },
            "reasoning": { "type": "STRING", "description": "A concise paragraph explaining the prediction." },
            "keyMatchupFactor": { "type": "STRING", "description": "One short sentence naming the key factor." }
        },
        "required": ["winnerId", "confidence", "reasoning", "keyMatchupFactor"]
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Extracts the structured prediction from a `generateContent` response body
/// and checks it names one of the two teams.
pub fn parse_generate_response(raw: &str, game: &Game) -> Result<AiPrediction> {
    let resp: GenerateResponse = serde_json::from_str(raw).context("invalid analysis response")?;
    let text = resp
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| anyhow!("no response text from model"))?;

    let mut prediction: AiPrediction =
        serde_json::from_str(text.trim()).context("model returned malformed prediction")?;
    let winner = crate::team_db::canonical_id(&prediction.winner_id);
    if winner != game.home.id && winner != game.away.id {
        return Err(anyhow!("model picked unknown team {}", prediction.winner_id));
    }
    prediction.winner_id = winner;
    prediction.confidence = if prediction.confidence.is_finite() {
        prediction.confidence.clamp(0.0, 100.0)
    } else {
        DEGRADED_CONFIDENCE
    };
    Ok(prediction)
}
