//! The session controller shared by every mini-game.
//!
//! A [`Game`] supplies the level table, the stimulus generator, the judge and
//! the metrics reducer. [`SessionController`] owns everything mutable (state,
//! trial log, timers, RNG) and drives the countdown → trial → feedback cycle.
//! Time is passed in explicitly as milliseconds on a monotonic clock, which
//! keeps the controller deterministic under test.

use std::fmt;

use log::{debug, info, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::games::GameKind;
use crate::session::{
    FailurePolicy, GameSettings, Phase, ResumePolicy, SessionOptions, SessionState, TrialRecord,
};
use crate::sound::{Silent, SoundCue, SoundSink};
use crate::timers::{TimerKind, Timers};

const COUNTDOWN_TICK_MS: u64 = 1_000;

/// What the generator and judge may look at besides the stimulus.
#[derive(Debug)]
pub struct TrialContext<'a, D> {
    pub level: u32,
    /// Trials already counted toward this level's quota.
    pub trial_in_level: u32,
    pub log: &'a [TrialRecord<D>],
}

impl<D> TrialContext<'_, D> {
    pub fn previous(&self) -> Option<&TrialRecord<D>> {
        self.log.last()
    }
}

/// The judge's verdict on one input.
#[derive(Clone, Debug, PartialEq)]
pub enum Judgement<D> {
    /// A partial answer was accepted; keep playing the same trial.
    Pending,
    /// The trial is over.
    Complete { correct: bool, detail: D },
}

/// A mini-game definition.
pub trait Game {
    type Stimulus: Clone + fmt::Debug;
    type Response: Clone + fmt::Debug + PartialEq;
    type Detail: Clone + fmt::Debug + Serialize;
    type Metrics: Clone + fmt::Debug + Serialize;

    fn kind(&self) -> GameKind;
    fn settings(&self) -> &GameSettings;
    fn level_count(&self) -> u32;
    /// Trials needed to clear `level`.
    fn trials_in_level(&self, level: u32) -> u32;

    /// Forget any generator state (active rule and the like) on restart.
    fn reset(&mut self) {}

    fn generate(
        &mut self,
        ctx: &TrialContext<'_, Self::Detail>,
        rng: &mut StdRng,
    ) -> Self::Stimulus;

    /// Length of the uninterruptible presentation before input opens.
    fn memorize_ms(&self, _stimulus: &Self::Stimulus) -> Option<u64> {
        None
    }

    /// Classify one input; `None` means the response timed out.
    fn judge(
        &self,
        stimulus: &mut Self::Stimulus,
        response: Option<&Self::Response>,
        ctx: &TrialContext<'_, Self::Detail>,
    ) -> Judgement<Self::Detail>;

    /// Points granted for a correct trial.
    fn reward(&self, record: &TrialRecord<Self::Detail>) -> u32 {
        self.settings().base_reward * record.level
    }

    fn metrics(&self, log: &[TrialRecord<Self::Detail>], state: &SessionState) -> Self::Metrics;

    /// The correct next input for `stimulus`.
    fn solve(&self, stimulus: &Self::Stimulus) -> Self::Response;

    /// A wrong input for `stimulus`.
    fn lure(&self, stimulus: &Self::Stimulus) -> Self::Response;
}

/// Everything handed to the game-over collaborator.
#[derive(Clone, Debug, Serialize)]
pub struct GameReport<M> {
    pub game: GameKind,
    pub score: u32,
    pub level_reached: u32,
    pub levels_completed: u32,
    pub trials: usize,
    pub lives_left: u32,
    pub metrics: M,
}

type GameOverHook<M> = Box<dyn FnOnce(&GameReport<M>)>;

pub struct SessionController<G: Game> {
    game: G,
    state: SessionState,
    timers: Timers,
    log: Vec<TrialRecord<G::Detail>>,
    stimulus: Option<G::Stimulus>,
    trial_started_at: Option<u64>,
    phase_started_at: u64,
    started: bool,
    rng: StdRng,
    seed: Option<u64>,
    sound: Box<dyn SoundSink>,
    on_game_over: Option<GameOverHook<G::Metrics>>,
    report: Option<GameReport<G::Metrics>>,
}

impl<G: Game> fmt::Debug for SessionController<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("game", &self.game.kind())
            .field("state", &self.state)
            .field("trials", &self.log.len())
            .field("stimulus", &self.stimulus)
            .finish()
    }
}

impl<G: Game> SessionController<G> {
    pub fn new(game: G, options: SessionOptions) -> Self {
        let state = SessionState::new(game.settings(), options.sound_enabled);
        Self {
            game,
            state,
            timers: Timers::new(),
            log: Vec::new(),
            stimulus: None,
            trial_started_at: None,
            phase_started_at: 0,
            started: false,
            rng: seeded_rng(options.seed),
            seed: options.seed,
            sound: Box::new(Silent),
            on_game_over: None,
            report: None,
        }
    }

    pub fn with_sound(mut self, sink: impl SoundSink + 'static) -> Self {
        self.sound = Box::new(sink);
        self
    }

    /// Register the collaborator that receives the final report. It runs at
    /// most once per controller.
    pub fn on_game_over(mut self, hook: impl FnOnce(&GameReport<G::Metrics>) + 'static) -> Self {
        self.on_game_over = Some(Box::new(hook));
        self
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn log(&self) -> &[TrialRecord<G::Detail>] {
        &self.log
    }

    pub fn stimulus(&self) -> Option<&G::Stimulus> {
        self.stimulus.as_ref()
    }

    pub fn report(&self) -> Option<&GameReport<G::Metrics>> {
        self.report.as_ref()
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    /// Outcome of the trial being shown in the feedback phase.
    pub fn last_outcome(&self) -> Option<bool> {
        self.log.last().map(|r| r.correct)
    }

    pub fn phase_elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.phase_started_at)
    }

    /// Time left to answer the current trial.
    pub fn response_time_left(&self, now: u64) -> Option<u64> {
        self.timers.remaining(TimerKind::ResponseTimeout, now)
    }

    /// Earliest pending timer; `None` when paused or idle.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_due()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Begin the countdown. Calling it again is a no-op.
    pub fn start(&mut self, now: u64) {
        if self.started {
            return;
        }
        self.started = true;
        self.enter(Phase::Countdown, now);
        self.state.countdown = self.game.settings().countdown_secs;
        self.play(SoundCue::Start, 1.0);
        debug!("{}: countdown started", self.game.kind());
        if self.state.countdown == 0 {
            self.present(now);
        } else {
            self.timers
                .schedule(TimerKind::CountdownTick, now, COUNTDOWN_TICK_MS);
        }
    }

    /// Fire every timer due at or before `now`, oldest first.
    pub fn tick(&mut self, now: u64) {
        while let Some((kind, due)) = self.timers.pop_due(now) {
            self.fire(kind, due);
        }
    }

    /// Submit a response. Returns whether it was accepted; input outside the
    /// playing phase or while paused is ignored.
    pub fn respond(&mut self, response: G::Response, now: u64) -> bool {
        self.tick(now);
        if !self.state.accepts_input() || self.stimulus.is_none() {
            trace!(
                "{}: ignoring {:?} in {}",
                self.game.kind(),
                response,
                self.state.phase
            );
            return false;
        }
        self.handle(Some(&response), now);
        true
    }

    pub fn pause(&mut self, now: u64) {
        if self.state.paused || self.state.is_over() || !self.started {
            return;
        }
        if self.state.phase == Phase::Countdown && !self.game.settings().pausable_countdown {
            return;
        }
        self.tick(now);
        self.state.paused = true;
        self.timers.pause(now);
        self.play(SoundCue::PauseIn, 0.5);
        debug!("{}: paused in {}", self.game.kind(), self.state.phase);
    }

    /// Leave the pause menu. Safe to call from any state.
    pub fn resume(&mut self, now: u64) {
        if !self.state.paused {
            return;
        }
        self.state.paused = false;
        let paused_for = self.timers.resume(now);
        self.phase_started_at = self.phase_started_at.saturating_add(paused_for);
        if let Some(started) = self.trial_started_at.as_mut() {
            *started = started.saturating_add(paused_for);
        }
        self.play(SoundCue::PauseOut, 0.5);
        debug!(
            "{}: resumed after {paused_for} ms in {}",
            self.game.kind(),
            self.state.phase
        );

        let regenerate = self.game.settings().resume_policy == ResumePolicy::Regenerate;
        if regenerate && matches!(self.state.phase, Phase::Memorize | Phase::Playing) {
            self.timers.cancel(TimerKind::MemorizeEnd);
            self.timers.cancel(TimerKind::ResponseTimeout);
            self.present(now);
        }
    }

    pub fn toggle_pause(&mut self, now: u64) {
        if self.state.paused {
            self.resume(now);
        } else {
            self.pause(now);
        }
    }

    /// Throw the session away and count down again from level 1.
    pub fn restart(&mut self, now: u64) {
        self.timers = Timers::new();
        self.game.reset();
        self.state = SessionState::new(self.game.settings(), self.state.sound_enabled);
        self.log.clear();
        self.stimulus = None;
        self.trial_started_at = None;
        self.report = None;
        self.rng = seeded_rng(self.seed);
        self.started = false;
        info!("{}: restarted", self.game.kind());
        self.start(now);
    }

    /// Tear the session down without reporting: every timer is cancelled and
    /// the game-over collaborator is dropped unused.
    pub fn abandon(&mut self) {
        self.timers.cancel_all();
        self.on_game_over = None;
        self.trial_started_at = None;
        self.state.phase = Phase::GameOver;
    }

    pub fn toggle_sound(&mut self) -> bool {
        self.state.sound_enabled = !self.state.sound_enabled;
        self.state.sound_enabled
    }

    fn fire(&mut self, kind: TimerKind, at: u64) {
        trace!("{}: {kind:?} fired at {at}", self.game.kind());
        match (kind, self.state.phase) {
            (TimerKind::CountdownTick, Phase::Countdown) => {
                self.state.countdown = self.state.countdown.saturating_sub(1);
                if self.state.countdown == 0 {
                    self.present(at);
                } else {
                    self.timers
                        .schedule(TimerKind::CountdownTick, at, COUNTDOWN_TICK_MS);
                }
            }
            (TimerKind::MemorizeEnd, Phase::Memorize) => self.open_input(at),
            (TimerKind::ResponseTimeout, Phase::Playing) => self.handle(None, at),
            (TimerKind::FeedbackEnd, Phase::Feedback) => self.advance(at),
            (kind, phase) => trace!("{}: stale {kind:?} in {phase}", self.game.kind()),
        }
    }

    /// Generate the next stimulus for the current level.
    fn present(&mut self, now: u64) {
        let ctx = TrialContext {
            level: self.state.level,
            trial_in_level: self.state.trials_in_level,
            log: &self.log,
        };
        let stimulus = self.game.generate(&ctx, &mut self.rng);
        trace!("{}: presenting {stimulus:?}", self.game.kind());
        let memorize = self.game.memorize_ms(&stimulus);
        self.stimulus = Some(stimulus);
        self.trial_started_at = None;

        match memorize {
            Some(ms) => {
                self.enter(Phase::Memorize, now);
                self.timers.schedule(TimerKind::MemorizeEnd, now, ms);
            }
            None => self.open_input(now),
        }
    }

    fn open_input(&mut self, now: u64) {
        self.enter(Phase::Playing, now);
        self.trial_started_at = Some(now);
        self.timers.schedule(
            TimerKind::ResponseTimeout,
            now,
            self.game.settings().response_timeout_ms,
        );
    }

    fn handle(&mut self, response: Option<&G::Response>, now: u64) {
        let ctx = TrialContext {
            level: self.state.level,
            trial_in_level: self.state.trials_in_level,
            log: &self.log,
        };
        let Some(stimulus) = self.stimulus.as_mut() else {
            return;
        };
        match self.game.judge(stimulus, response, &ctx) {
            Judgement::Pending => {
                self.play(SoundCue::Click, 0.6);
                let settings = self.game.settings();
                if settings.timeout_per_input {
                    let timeout = settings.response_timeout_ms;
                    self.timers
                        .schedule(TimerKind::ResponseTimeout, now, timeout);
                }
            }
            Judgement::Complete { correct, detail } => {
                self.record(correct, response.is_none(), detail, now)
            }
        }
    }

    fn record(&mut self, correct: bool, omission: bool, detail: G::Detail, now: u64) {
        let settings = self.game.settings();
        let max_rt = settings.max_response_ms;
        let policy = settings.failure_policy;
        let feedback_ms = settings.feedback_ms;

        let rt_ms = if omission {
            max_rt
        } else {
            let started = self.trial_started_at.unwrap_or(now);
            now.saturating_sub(started).min(max_rt)
        };
        let record = TrialRecord {
            level: self.state.level,
            correct,
            omission,
            rt_ms,
            detail,
        };

        if correct {
            self.state.score += self.game.reward(&record);
            self.play(SoundCue::Correct, 0.4);
        } else {
            self.state.lives = self.state.lives.saturating_sub(1);
            self.play(SoundCue::Incorrect, 0.5);
        }
        if correct || policy == FailurePolicy::Continue {
            self.state.trials_in_level += 1;
        }
        debug!(
            "{}: trial {} level {} correct={correct} omission={omission} rt={rt_ms}ms lives={}",
            self.game.kind(),
            self.log.len() + 1,
            record.level,
            self.state.lives
        );
        self.log.push(record);

        self.timers.cancel(TimerKind::ResponseTimeout);
        self.trial_started_at = None;
        self.enter(Phase::Feedback, now);
        self.timers.schedule(TimerKind::FeedbackEnd, now, feedback_ms);
    }

    /// Decide what follows the feedback display, from the state as it is now.
    fn advance(&mut self, now: u64) {
        if self.state.lives == 0 {
            self.finish(now);
            return;
        }

        let last_correct = self.log.last().map_or(true, |r| r.correct);
        if !last_correct {
            match self.game.settings().failure_policy {
                FailurePolicy::Continue => {}
                FailurePolicy::RetryLevel => {
                    self.present(now);
                    return;
                }
                FailurePolicy::RegressLevel => {
                    self.state.level = self.state.level.saturating_sub(1).max(1);
                    self.state.trials_in_level = 0;
                    info!("{}: back to level {}", self.game.kind(), self.state.level);
                    self.present(now);
                    return;
                }
            }
        }

        if self.state.trials_in_level >= self.game.trials_in_level(self.state.level) {
            self.state.levels_completed += 1;
            if self.state.level >= self.game.level_count() {
                self.finish(now);
                return;
            }
            self.state.level += 1;
            self.state.trials_in_level = 0;
            self.state.max_level = self.state.max_level.max(self.state.level);
            info!("{}: up to level {}", self.game.kind(), self.state.level);
        }
        self.present(now);
    }

    fn finish(&mut self, now: u64) {
        self.timers.cancel_all();
        self.trial_started_at = None;
        self.enter(Phase::GameOver, now);
        self.play(SoundCue::GameOver, 1.0);

        let report = GameReport {
            game: self.game.kind(),
            score: self.state.score,
            level_reached: self.state.max_level,
            levels_completed: self.state.levels_completed,
            trials: self.log.len(),
            lives_left: self.state.lives,
            metrics: self.game.metrics(&self.log, &self.state),
        };
        info!(
            "{}: game over, score {} after {} trials",
            report.game, report.score, report.trials
        );
        if let Some(hook) = self.on_game_over.take() {
            hook(&report);
        }
        self.report = Some(report);
    }

    fn enter(&mut self, phase: Phase, now: u64) {
        if self.state.phase != phase {
            trace!("{}: {} -> {phase}", self.game.kind(), self.state.phase);
        }
        self.state.phase = phase;
        self.phase_started_at = now;
    }

    fn play(&mut self, cue: SoundCue, volume: f32) {
        if !self.state.sound_enabled {
            return;
        }
        if let Err(e) = self.sound.play(cue, volume) {
            debug!("sound cue {cue} failed: {e}");
        }
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Plays a session headlessly on a virtual clock: answers correctly with
/// probability `accuracy`, otherwise with the game's lure.
#[derive(Debug)]
pub struct Autoplay {
    pub accuracy: f64,
    pub think_ms: u64,
    rng: StdRng,
}

impl Autoplay {
    pub fn new(accuracy: f64, think_ms: u64, seed: u64) -> Self {
        Self {
            accuracy: accuracy.clamp(0.0, 1.0),
            think_ms,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Drive `session` from `now` until game over. Returns the clock at the
    /// end. Gives up after a bounded number of steps.
    pub fn run<G: Game>(&mut self, session: &mut SessionController<G>, mut now: u64) -> u64 {
        session.start(now);
        for _ in 0..1_000_000u32 {
            if session.is_over() {
                break;
            }
            if session.state().accepts_input() {
                let Some(stimulus) = session.stimulus() else {
                    break;
                };
                let response = if self.rng.gen_bool(self.accuracy) {
                    session.game().solve(stimulus)
                } else {
                    session.game().lure(stimulus)
                };
                now += self.think_ms;
                session.respond(response, now);
            } else {
                match session.next_deadline() {
                    Some(due) => {
                        now = now.max(due);
                        session.tick(now);
                    }
                    None => break,
                }
            }
        }
        now
    }
}
