//! Client side of the remote gameplay service that drives word ordering.
//!
//! Every endpoint is scoped to one gameplay id:
//! `GET /gameplays/:id/data`, `POST /gameplays/:id/check-answer`,
//! `PUT /gameplays/:id/results`, `POST /gameplays/:id/advance` and
//! `POST /gameplays/:id/regress`.

use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameplayData {
    pub level_number: u32,
    pub level_data: LevelData,
    #[serde(default)]
    pub game_info: Option<GameInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LevelData {
    pub word_set: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GameInfo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckAnswer<'a> {
    user_sentence: &'a str,
}

/// Verdict on one submitted sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct AnswerCheck {
    pub is_correct: bool,
    /// Words used that belong to no valid sentence.
    #[serde(default)]
    pub distractors_used: u32,
}

/// Body of `PUT /results`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsPayload {
    pub score: u32,
    pub results_data: ResultsData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultsData {
    Level(LevelStats),
    GameOver(GameOverStats),
}

/// Stats of one solved level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelStats {
    pub completed_level: u32,
    pub time_taken_ms: u64,
    pub first_attempt_success: bool,
    /// Level score per second taken, two decimals.
    pub efficiency_score: f64,
    pub first_interaction_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameOverStats {
    pub status: String,
    pub reached_level: u32,
    pub levels_completed: u32,
    pub last_completed_level_stats: Option<LevelStats>,
    pub total_errors: u32,
    pub total_attempts: u32,
    pub distractors_used: u32,
    /// Percentage of attempts that were correct sentences, one decimal.
    pub syntactic_accuracy: f64,
}

/// The remote service, bound to one gameplay.
pub trait GameplayApi {
    fn fetch_level(&self) -> Result<GameplayData>;
    fn check_answer(&self, sentence: &str) -> Result<AnswerCheck>;
    fn put_results(&self, payload: &ResultsPayload) -> Result<()>;
    fn advance(&self) -> Result<()>;
    fn regress(&self) -> Result<()>;
}

/// Blocking HTTP client with bearer auth.
#[derive(Debug, Clone)]
pub struct HttpGameplayApi {
    client: Client,
    base_url: String,
    gameplay_id: String,
    token: Option<String>,
}

impl HttpGameplayApi {
    pub fn new(base_url: &str, gameplay_id: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gameplay_id: gameplay_id.to_string(),
            token,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/gameplays/{}/{path}", self.base_url, self.gameplay_id)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authed(request).send()?;
        let status = response.status();
        debug!("gameplay {}: {} {status}", self.gameplay_id, response.url());
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl GameplayApi for HttpGameplayApi {
    fn fetch_level(&self) -> Result<GameplayData> {
        let response = self.send(self.client.get(self.endpoint("data")))?;
        Ok(response.json()?)
    }

    fn check_answer(&self, sentence: &str) -> Result<AnswerCheck> {
        let request = self
            .client
            .post(self.endpoint("check-answer"))
            .json(&CheckAnswer {
                user_sentence: sentence,
            });
        Ok(self.send(request)?.json()?)
    }

    fn put_results(&self, payload: &ResultsPayload) -> Result<()> {
        self.send(self.client.put(self.endpoint("results")).json(payload))?;
        Ok(())
    }

    fn advance(&self) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint("advance"))
            .json(&serde_json::json!({}));
        self.send(request)?;
        Ok(())
    }

    fn regress(&self) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint("regress"))
            .json(&serde_json::json!({}));
        self.send(request)?;
        Ok(())
    }
}
