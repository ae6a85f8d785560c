use serde::{Deserialize, Serialize};

/// Where a session is in its countdown → trial → feedback cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Countdown,
    Memorize,
    Playing,
    Feedback,
    GameOver,
}

/// What happens to the level when a trial fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The failed trial counts toward the level quota like any other.
    Continue,
    /// The level is replayed with a fresh stimulus; the failure does not count.
    RetryLevel,
    /// Drop back one level (never below 1) and start its quota over.
    RegressLevel,
}

/// How a game picks up after the pause menu closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumePolicy {
    /// Continue the in-progress trial; timers shift by the paused span.
    Resume,
    /// Throw away the in-progress trial and present a new one.
    Regenerate,
}

/// Fixed per-game timing and scoring parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct GameSettings {
    pub starting_lives: u32,
    pub countdown_secs: u8,
    pub pausable_countdown: bool,
    /// Time allowed before an omission is submitted.
    pub response_timeout_ms: u64,
    /// Pending inputs of multi-step trials restart the response timeout.
    /// When false the timeout covers the whole trial.
    pub timeout_per_input: bool,
    /// Upper bound on recorded reaction times; omissions record exactly this.
    pub max_response_ms: u64,
    pub feedback_ms: u64,
    pub base_reward: u32,
    pub failure_policy: FailurePolicy,
    pub resume_policy: ResumePolicy,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            starting_lives: 3,
            countdown_secs: 3,
            pausable_countdown: false,
            response_timeout_ms: 3_000,
            timeout_per_input: true,
            max_response_ms: 3_000,
            feedback_ms: 1_000,
            base_reward: 10,
            failure_policy: FailurePolicy::Continue,
            resume_policy: ResumePolicy::Resume,
        }
    }
}

/// Static per-level parameters, indexed from level 1.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelTable<T> {
    levels: Vec<T>,
}

impl<T> LevelTable<T> {
    /// Panics if `levels` is empty; every game ships at least one level.
    pub fn new(levels: Vec<T>) -> Self {
        assert!(!levels.is_empty(), "a level table needs at least one level");
        Self { levels }
    }

    /// Config for `level`, falling back to the last entry past the end.
    pub fn get(&self, level: u32) -> &T {
        let idx = (level.max(1) as usize - 1).min(self.levels.len() - 1);
        &self.levels[idx]
    }

    pub fn len(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// One completed trial. `detail` carries the game-specific classification.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialRecord<D> {
    pub level: u32,
    pub correct: bool,
    /// No response before the timeout.
    pub omission: bool,
    pub rt_ms: u64,
    pub detail: D,
}

impl<D> TrialRecord<D> {
    /// An incorrect active response.
    pub fn commission(&self) -> bool {
        !self.correct && !self.omission
    }
}

/// Values injected when a session is built, read once.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionOptions {
    pub sound_enabled: bool,
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            seed: None,
        }
    }
}

/// Mutable counters of a running session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionState {
    pub phase: Phase,
    pub level: u32,
    pub lives: u32,
    pub score: u32,
    pub paused: bool,
    /// Seconds left on the countdown while in [`Phase::Countdown`].
    pub countdown: u8,
    /// Trials counted toward the current level's quota.
    pub trials_in_level: u32,
    /// Highest level reached so far.
    pub max_level: u32,
    pub levels_completed: u32,
    pub sound_enabled: bool,
}

impl SessionState {
    pub fn new(settings: &GameSettings, sound_enabled: bool) -> Self {
        Self {
            phase: Phase::Countdown,
            level: 1,
            lives: settings.starting_lives,
            score: 0,
            paused: false,
            countdown: settings.countdown_secs,
            trials_in_level: 0,
            max_level: 1,
            levels_completed: 0,
            sound_enabled,
        }
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    /// Input is only accepted while playing and not paused.
    pub fn accepts_input(&self) -> bool {
        self.phase == Phase::Playing && !self.paused
    }
}
