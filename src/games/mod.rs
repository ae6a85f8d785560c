//! The mini-game catalogue and the type-erased handle the front ends drive.

pub mod color_match;
pub mod flanker;
pub mod pattern_recall;
pub mod rule_switch;
pub mod sequence_recall;
pub mod spatial_cue;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::controller::{Autoplay, Game, SessionController};
use crate::session::{Phase, SessionOptions, SessionState};
use crate::sound::{Silent, SoundSink};
use crate::stats::SessionResult;

pub use color_match::ColorMatch;
pub use flanker::Flanker;
pub use pattern_recall::PatternRecall;
pub use rule_switch::RuleSwitch;
pub use sequence_recall::SequenceRecall;
pub use spatial_cue::SpatialCue;

/// Think time of the simulated player.
const SIMULATED_THINK_MS: u64 = 450;

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GameKind {
    ColorMatch,
    RuleSwitch,
    Flanker,
    SpatialCue,
    SequenceRecall,
    ReverseRecall,
    PatternRecall,
}

impl GameKind {
    pub const ALL: [GameKind; 7] = [
        GameKind::ColorMatch,
        GameKind::RuleSwitch,
        GameKind::Flanker,
        GameKind::SpatialCue,
        GameKind::SequenceRecall,
        GameKind::ReverseRecall,
        GameKind::PatternRecall,
    ];

    pub fn title(self) -> &'static str {
        match self {
            GameKind::ColorMatch => "Color Match",
            GameKind::RuleSwitch => "Rule Switch",
            GameKind::Flanker => "Flanker Arrows",
            GameKind::SpatialCue => "Spatial Cue",
            GameKind::SequenceRecall => "Sequence Recall",
            GameKind::ReverseRecall => "Reverse Recall",
            GameKind::PatternRecall => "Pattern Recall",
        }
    }

    pub fn about(self) -> &'static str {
        match self {
            GameKind::ColorMatch => "does the word's meaning match the colour patch? (inhibition)",
            GameKind::RuleSwitch => "judge parity or vowels as the rule flips (cognitive flexibility)",
            GameKind::Flanker => "point where the middle arrow points, ignore its neighbours",
            GameKind::SpatialCue => "react to a target after a cue that may lie (orienting)",
            GameKind::SequenceRecall => "repeat a growing sequence of lit digits (verbal span)",
            GameKind::ReverseRecall => "repeat the lit digits backwards (working memory)",
            GameKind::PatternRecall => "reproduce a briefly shown grid pattern (visuospatial span)",
        }
    }

    /// Parse the name stored in the results database.
    pub fn parse(name: &str) -> Option<GameKind> {
        <GameKind as ValueEnum>::from_str(name, true).ok()
    }
}

/// Keys the games understand, independent of the terminal backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Left,
    Right,
    Up,
    Down,
    Enter,
}

/// What a presenter needs to know to draw the current trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrialView {
    pub phase: Phase,
    /// Time spent in `phase` so far.
    pub elapsed_ms: u64,
    /// Outcome shown during feedback.
    pub outcome: Option<bool>,
}

/// Terminal presentation of a game: key bindings and stimulus text.
pub trait Presenter: Game {
    fn controls(&self) -> &'static str;
    fn map_key(&self, key: Key, stimulus: &Self::Stimulus) -> Option<Self::Response>;
    fn render(&self, stimulus: &Self::Stimulus, view: &TrialView) -> Vec<String>;
}

/// Snapshot of a session for one frame.
#[derive(Clone, Debug)]
pub struct Screen {
    pub kind: GameKind,
    pub state: SessionState,
    pub lines: Vec<String>,
    pub controls: &'static str,
    pub outcome: Option<bool>,
    pub time_left_ms: Option<u64>,
}

/// A running session of any game.
pub trait Playable {
    fn kind(&self) -> GameKind;
    fn start(&mut self, now: u64);
    fn tick(&mut self, now: u64);
    /// Translate and submit a key. Returns whether the session accepted it.
    fn press(&mut self, key: Key, now: u64) -> bool;
    fn toggle_pause(&mut self, now: u64);
    fn restart(&mut self, now: u64);
    fn toggle_sound(&mut self) -> bool;
    fn abandon(&mut self);
    fn state(&self) -> &SessionState;
    fn screen(&self, now: u64) -> Screen;
    /// `(trial number, reaction time)` of every answered trial.
    fn reaction_times(&self) -> Vec<(f64, f64)>;
    fn report_json(&self) -> Option<serde_json::Value>;
    fn autoplay(&mut self, bot: &mut Autoplay, now: u64) -> u64;
}

impl<G: Presenter> Playable for SessionController<G> {
    fn kind(&self) -> GameKind {
        self.game().kind()
    }

    fn start(&mut self, now: u64) {
        SessionController::start(self, now)
    }

    fn tick(&mut self, now: u64) {
        SessionController::tick(self, now)
    }

    fn press(&mut self, key: Key, now: u64) -> bool {
        let response = match self.stimulus() {
            Some(stimulus) => self.game().map_key(key, stimulus),
            None => None,
        };
        match response {
            Some(response) => self.respond(response, now),
            None => false,
        }
    }

    fn toggle_pause(&mut self, now: u64) {
        SessionController::toggle_pause(self, now)
    }

    fn restart(&mut self, now: u64) {
        SessionController::restart(self, now)
    }

    fn toggle_sound(&mut self) -> bool {
        SessionController::toggle_sound(self)
    }

    fn abandon(&mut self) {
        SessionController::abandon(self)
    }

    fn state(&self) -> &SessionState {
        SessionController::state(self)
    }

    fn screen(&self, now: u64) -> Screen {
        let state = SessionController::state(self).clone();
        let outcome = match state.phase {
            Phase::Feedback => self.last_outcome(),
            _ => None,
        };
        let view = TrialView {
            phase: state.phase,
            elapsed_ms: self.phase_elapsed(now),
            outcome,
        };
        let lines = match (state.phase, self.stimulus()) {
            (Phase::Memorize | Phase::Playing | Phase::Feedback, Some(stimulus)) => {
                self.game().render(stimulus, &view)
            }
            _ => Vec::new(),
        };
        Screen {
            kind: self.game().kind(),
            lines,
            controls: self.game().controls(),
            outcome,
            time_left_ms: self.response_time_left(now),
            state,
        }
    }

    fn reaction_times(&self) -> Vec<(f64, f64)> {
        self.log()
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.omission)
            .map(|(i, r)| ((i + 1) as f64, r.rt_ms as f64))
            .collect()
    }

    fn report_json(&self) -> Option<serde_json::Value> {
        self.report()
            .and_then(|report| serde_json::to_value(report).ok())
    }

    fn autoplay(&mut self, bot: &mut Autoplay, now: u64) -> u64 {
        bot.run(self, now)
    }
}

pub type ResultHook = Box<dyn FnOnce(SessionResult)>;

pub fn build(kind: GameKind, options: SessionOptions) -> Box<dyn Playable> {
    build_with(kind, options, Box::new(Silent), None)
}

/// Build a session of `kind` with a sound sink and an optional collaborator
/// that receives the finished result.
pub fn build_with(
    kind: GameKind,
    options: SessionOptions,
    sound: Box<dyn SoundSink>,
    on_result: Option<ResultHook>,
) -> Box<dyn Playable> {
    match kind {
        GameKind::ColorMatch => wire(ColorMatch::new(), options, sound, on_result),
        GameKind::RuleSwitch => wire(RuleSwitch::new(), options, sound, on_result),
        GameKind::Flanker => wire(Flanker::new(), options, sound, on_result),
        GameKind::SpatialCue => wire(SpatialCue::new(), options, sound, on_result),
        GameKind::SequenceRecall => wire(SequenceRecall::new(), options, sound, on_result),
        GameKind::ReverseRecall => wire(SequenceRecall::reversed(), options, sound, on_result),
        GameKind::PatternRecall => wire(PatternRecall::new(), options, sound, on_result),
    }
}

fn wire<G: Presenter + 'static>(
    game: G,
    options: SessionOptions,
    sound: Box<dyn SoundSink>,
    on_result: Option<ResultHook>,
) -> Box<dyn Playable> {
    let mut session = SessionController::new(game, options).with_sound(sound);
    if let Some(hook) = on_result {
        session = session.on_game_over(move |report| hook(SessionResult::from_report(report)));
    }
    Box::new(session)
}

/// Play a whole session of `kind` headlessly and return its final report.
pub fn simulate(kind: GameKind, seed: u64, accuracy: f64) -> Option<serde_json::Value> {
    let mut session = build(
        kind,
        SessionOptions {
            sound_enabled: false,
            seed: Some(seed),
        },
    );
    let mut bot = Autoplay::new(accuracy, SIMULATED_THINK_MS, seed.wrapping_add(1));
    session.autoplay(&mut bot, 0);
    session.report_json()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_parse() {
        for kind in GameKind::ALL {
            assert_eq!(GameKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(GameKind::parse("nope"), None);
        assert_eq!(GameKind::SpatialCue.to_string(), "spatial-cue");
    }

    #[test]
    fn every_game_simulates_to_a_report() {
        for kind in GameKind::ALL {
            let report = simulate(kind, 11, 0.9).unwrap();
            assert_eq!(report["game"], kind.to_string());
            assert!(report["metrics"].is_object(), "{kind}");
            assert_eq!(report["metrics"]["score"], report["score"], "{kind}");
        }
    }

    #[test]
    fn reverse_recall_reports_reverse_span() {
        let report = simulate(GameKind::ReverseRecall, 7, 1.0).unwrap();
        assert_eq!(report["game"], "reverse-recall");
        assert!(report["metrics"]["amplitud_inversa_max"].as_u64().unwrap() >= 3);
        assert!(report["metrics"].get("amplitud_digitos_max").is_none());
    }

    #[test]
    fn simulation_is_reproducible() {
        let a = simulate(GameKind::Flanker, 3, 0.7);
        let b = simulate(GameKind::Flanker, 3, 0.7);
        assert_eq!(a, b);
    }

    #[test]
    fn keys_before_the_countdown_ends_are_ignored() {
        let mut session = build(GameKind::ColorMatch, SessionOptions::default());
        session.start(0);
        assert!(!session.press(Key::Char('y'), 100));
        assert_eq!(session.state().phase, Phase::Countdown);
        assert!(session.screen(100).lines.is_empty());
    }

    #[test]
    fn hook_receives_the_result() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        let mut session = build_with(
            GameKind::SequenceRecall,
            SessionOptions {
                sound_enabled: false,
                seed: Some(5),
            },
            Box::new(Silent),
            Some(Box::new(move |result: SessionResult| {
                *sink.borrow_mut() = Some(result)
            })),
        );
        session.autoplay(&mut Autoplay::new(0.0, 300, 1), 0);
        let result = seen.borrow_mut().take().unwrap();
        assert_eq!(result.game, GameKind::SequenceRecall);
        assert_eq!(result.score, 0);
        assert_eq!(result.trials, 3);
    }
}
