use log::{debug, info, warn};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::api::{
    GameOverStats, GameplayApi, GameplayData, LevelStats, ResultsData, ResultsPayload,
};
use crate::metrics::{percentage, round_to};
use crate::{Error, Result};

pub const LEVEL_SCORE: u32 = 100;
pub const TOTAL_LEVELS: u32 = 20;
/// Running out of lives from this level on drops a level instead of ending.
pub const REGRESS_FROM_LEVEL: u32 = 11;
pub const STARTING_LIVES: u32 = 3;

/// What happens to lives when a new level loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LivesPolicy {
    /// Every level starts with full lives.
    ResetPerLevel,
    /// Lives carry over; only a regression refills them.
    CarryOver,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WordStatus {
    Loading,
    Ready,
    Failed(String),
    /// The last level was solved.
    Completed,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Solved; `finished` when it was the last level, otherwise the next
    /// level is already loaded.
    Correct { finished: bool },
    Retry { lives_left: u32 },
    /// Out of lives on a high level: one level down, lives refilled.
    Regressed,
    GameOver,
}

/// One player's run through a remote word-ordering gameplay.
#[derive(Debug)]
pub struct WordOrderingSession<A: GameplayApi> {
    api: A,
    policy: LivesPolicy,
    status: WordStatus,
    level: Option<GameplayData>,
    available: Vec<String>,
    selected: Vec<String>,
    lives: u32,
    total_score: u32,
    levels_completed: u32,
    attempts: u32,
    total_errors: u32,
    total_attempts: u32,
    distractors_used: u32,
    level_started_at: u64,
    first_interaction_at: Option<u64>,
    last_level_stats: Option<LevelStats>,
    rng: StdRng,
}

impl<A: GameplayApi> WordOrderingSession<A> {
    pub fn new(api: A, policy: LivesPolicy, seed: Option<u64>) -> Self {
        Self {
            api,
            policy,
            status: WordStatus::Loading,
            level: None,
            available: Vec::new(),
            selected: Vec::new(),
            lives: STARTING_LIVES,
            total_score: 0,
            levels_completed: 0,
            attempts: 0,
            total_errors: 0,
            total_attempts: 0,
            distractors_used: 0,
            level_started_at: 0,
            first_interaction_at: None,
            last_level_stats: None,
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }

    /// Fetch the gameplay's current level. A failure leaves the session in
    /// [`WordStatus::Failed`]; there is no retry.
    pub fn load(&mut self, now: u64) -> Result<()> {
        self.status = WordStatus::Loading;
        let data = match self.api.fetch_level() {
            Ok(data) => data,
            Err(e) => {
                warn!("could not load gameplay level: {e}");
                self.status = WordStatus::Failed(e.to_string());
                return Err(e);
            }
        };

        let mut words = data.level_data.word_set.clone();
        words.shuffle(&mut self.rng);
        info!(
            "word ordering level {} loaded with {} words",
            data.level_number,
            words.len()
        );
        self.available = words;
        self.selected.clear();
        self.attempts = 0;
        self.first_interaction_at = None;
        self.level_started_at = now;
        if self.policy == LivesPolicy::ResetPerLevel {
            self.lives = STARTING_LIVES;
        }
        self.level = Some(data);
        self.status = WordStatus::Ready;
        Ok(())
    }

    /// Move `available[index]` to the end of the sentence.
    pub fn select(&mut self, index: usize, now: u64) -> bool {
        if self.status != WordStatus::Ready || index >= self.available.len() {
            return false;
        }
        self.first_interaction_at.get_or_insert(now);
        let word = self.available.remove(index);
        self.selected.push(word);
        true
    }

    /// Put `selected[index]` back among the available words.
    pub fn deselect(&mut self, index: usize) -> bool {
        if self.status != WordStatus::Ready || index >= self.selected.len() {
            return false;
        }
        let word = self.selected.remove(index);
        self.available.push(word);
        true
    }

    pub fn sentence(&self) -> String {
        self.selected.join(" ")
    }

    /// Submit the sentence built so far.
    ///
    /// A failed answer check leaves the level as it was. Once the answer is
    /// judged, failing to save results is logged and play goes on; failing to
    /// move to another level abandons the session.
    pub fn check(&mut self, now: u64) -> Result<CheckOutcome> {
        let Some(level_number) = self.level_number() else {
            return Err(Error::Load("no level loaded".into()));
        };
        if self.status != WordStatus::Ready {
            return Err(Error::Load(format!(
                "cannot check an answer while {:?}",
                self.status
            )));
        }
        let verdict = self.api.check_answer(&self.sentence())?;
        self.attempts += 1;
        self.total_attempts += 1;
        self.distractors_used += verdict.distractors_used;
        debug!(
            "level {level_number} attempt {}: correct={} distractors={}",
            self.attempts, verdict.is_correct, verdict.distractors_used
        );
        if verdict.is_correct {
            self.solved(level_number, now)
        } else {
            self.missed(level_number, now)
        }
    }

    fn solved(&mut self, level_number: u32, now: u64) -> Result<CheckOutcome> {
        let time_taken_ms = now.saturating_sub(self.level_started_at);
        let seconds = time_taken_ms as f64 / 1000.0;
        let efficiency_score = if seconds > 0.0 {
            round_to(LEVEL_SCORE as f64 / seconds, 2)
        } else {
            0.0
        };
        let stats = LevelStats {
            completed_level: level_number,
            time_taken_ms,
            first_attempt_success: self.attempts == 1,
            efficiency_score,
            first_interaction_ms: self
                .first_interaction_at
                .map_or(0, |t| t.saturating_sub(self.level_started_at)),
        };

        self.total_score += LEVEL_SCORE;
        self.levels_completed += 1;
        self.last_level_stats = Some(stats.clone());
        self.save(ResultsPayload {
            score: self.total_score,
            results_data: ResultsData::Level(stats),
        });

        if level_number >= TOTAL_LEVELS {
            info!("word ordering completed at level {level_number}");
            self.status = WordStatus::Completed;
            return Ok(CheckOutcome::Correct { finished: true });
        }
        if let Err(e) = self.api.advance() {
            return Err(self.abandon(e));
        }
        self.load(now)?;
        Ok(CheckOutcome::Correct { finished: false })
    }

    fn missed(&mut self, level_number: u32, now: u64) -> Result<CheckOutcome> {
        self.total_errors += 1;
        self.lives = self.lives.saturating_sub(1);
        if self.lives > 0 {
            return Ok(CheckOutcome::Retry {
                lives_left: self.lives,
            });
        }

        if level_number >= REGRESS_FROM_LEVEL {
            info!("out of lives on level {level_number}, regressing");
            if let Err(e) = self.api.regress() {
                return Err(self.abandon(e));
            }
            self.lives = STARTING_LIVES;
            self.load(now)?;
            return Ok(CheckOutcome::Regressed);
        }

        info!("word ordering over at level {level_number}");
        self.status = WordStatus::GameOver;
        self.save(ResultsPayload {
            score: self.total_score,
            results_data: ResultsData::GameOver(GameOverStats {
                status: "game_over".to_string(),
                reached_level: level_number,
                levels_completed: self.levels_completed,
                last_completed_level_stats: self.last_level_stats.clone(),
                total_errors: self.total_errors,
                total_attempts: self.total_attempts,
                distractors_used: self.distractors_used,
                syntactic_accuracy: self.syntactic_accuracy(),
            }),
        });
        Ok(CheckOutcome::GameOver)
    }

    fn save(&self, payload: ResultsPayload) {
        if let Err(e) = self.api.put_results(&payload) {
            warn!("could not save word ordering results: {e}");
        }
    }

    fn abandon(&mut self, e: Error) -> Error {
        warn!("word ordering abandoned: {e}");
        self.status = WordStatus::Failed(e.to_string());
        e
    }

    pub fn status(&self) -> &WordStatus {
        &self.status
    }

    pub fn level_number(&self) -> Option<u32> {
        self.level.as_ref().map(|l| l.level_number)
    }

    pub fn game_name(&self) -> Option<&str> {
        self.level
            .as_ref()
            .and_then(|l| l.game_info.as_ref())
            .and_then(|g| g.name.as_deref())
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    pub fn levels_completed(&self) -> u32 {
        self.levels_completed
    }

    /// Wrong sentences submitted over the whole run.
    pub fn total_errors(&self) -> u32 {
        self.total_errors
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn distractors_used(&self) -> u32 {
        self.distractors_used
    }

    /// Share of attempts that were correct sentences, one decimal.
    pub fn syntactic_accuracy(&self) -> f64 {
        round_to(
            percentage(self.levels_completed as usize, self.total_attempts as usize),
            1,
        )
    }

    pub fn last_level_stats(&self) -> Option<&LevelStats> {
        self.last_level_stats.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            WordStatus::Completed | WordStatus::GameOver | WordStatus::Failed(_)
        )
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}
