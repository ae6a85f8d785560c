//! Stroop-style colour matching: does the meaning of the word match the
//! colour patch, whatever ink it is printed in?

use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use serde::Serialize;

use super::{GameKind, Key, Presenter, TrialView};
use crate::controller::{Game, Judgement, TrialContext};
use crate::metrics::{mean_or_zero, percentage, round_to};
use crate::session::{GameSettings, LevelTable, Phase, SessionState, TrialRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Colour {
    Red,
    Blue,
    Green,
    Yellow,
    Pink,
}

const COLOURS: [Colour; 5] = [
    Colour::Red,
    Colour::Blue,
    Colour::Green,
    Colour::Yellow,
    Colour::Pink,
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Level {
    pub trials: u32,
    pub p_incongruent: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stimulus {
    /// Meaning of the printed word.
    pub word: Colour,
    pub ink: Colour,
    pub patch: Colour,
}

impl Stimulus {
    pub fn congruent(&self) -> bool {
        self.word == self.ink
    }

    /// The right answer to "does the word match the patch?".
    pub fn matches(&self) -> bool {
        self.word == self.patch
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detail {
    pub congruent: bool,
    pub answer: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub precision_incongruente: f64,
    pub tiempo_reaccion_ms: u64,
    pub errores_comision: u32,
    pub errores_omision: u32,
    pub score: u32,
}

#[derive(Debug)]
pub struct ColorMatch {
    settings: GameSettings,
    levels: LevelTable<Level>,
}

impl ColorMatch {
    pub fn new() -> Self {
        Self::with_levels(vec![
            Level {
                trials: 10,
                p_incongruent: 0.2,
            },
            Level {
                trials: 15,
                p_incongruent: 0.5,
            },
            Level {
                trials: 25,
                p_incongruent: 0.8,
            },
        ])
    }

    pub fn with_levels(levels: Vec<Level>) -> Self {
        Self {
            settings: GameSettings {
                response_timeout_ms: 2_500,
                max_response_ms: 2_500,
                feedback_ms: 1_000,
                ..GameSettings::default()
            },
            levels: LevelTable::new(levels),
        }
    }
}

impl Default for ColorMatch {
    fn default() -> Self {
        Self::new()
    }
}

fn other_than(colour: Colour, rng: &mut StdRng) -> Colour {
    let others: Vec<Colour> = COLOURS.into_iter().filter(|c| *c != colour).collect();
    others.choose(rng).copied().unwrap_or(colour)
}

impl Game for ColorMatch {
    type Stimulus = Stimulus;
    type Response = bool;
    type Detail = Detail;
    type Metrics = Metrics;

    fn kind(&self) -> GameKind {
        GameKind::ColorMatch
    }

    fn settings(&self) -> &GameSettings {
        &self.settings
    }

    fn level_count(&self) -> u32 {
        self.levels.len()
    }

    fn trials_in_level(&self, level: u32) -> u32 {
        self.levels.get(level).trials
    }

    fn generate(&mut self, ctx: &TrialContext<'_, Detail>, rng: &mut StdRng) -> Stimulus {
        let level = self.levels.get(ctx.level);
        let word = *COLOURS.choose(rng).unwrap_or(&Colour::Red);
        let ink = if rng.gen_bool(level.p_incongruent) {
            other_than(word, rng)
        } else {
            word
        };
        let patch = if rng.gen_bool(0.5) {
            word
        } else {
            other_than(word, rng)
        };
        Stimulus { word, ink, patch }
    }

    fn judge(
        &self,
        stimulus: &mut Stimulus,
        response: Option<&bool>,
        _ctx: &TrialContext<'_, Detail>,
    ) -> Judgement<Detail> {
        Judgement::Complete {
            correct: response == Some(&stimulus.matches()),
            detail: Detail {
                congruent: stimulus.congruent(),
                answer: response.copied(),
            },
        }
    }

    fn metrics(&self, log: &[TrialRecord<Detail>], state: &SessionState) -> Metrics {
        let incongruent: Vec<_> = log.iter().filter(|r| !r.detail.congruent).collect();
        let incongruent_correct = incongruent.iter().filter(|r| r.correct).count();
        let correct_rts: Vec<f64> = log
            .iter()
            .filter(|r| r.correct)
            .map(|r| r.rt_ms as f64)
            .collect();

        Metrics {
            precision_incongruente: round_to(
                percentage(incongruent_correct, incongruent.len()),
                2,
            ),
            tiempo_reaccion_ms: mean_or_zero(&correct_rts).round() as u64,
            errores_comision: log.iter().filter(|r| r.commission()).count() as u32,
            errores_omision: log.iter().filter(|r| r.omission).count() as u32,
            score: state.score,
        }
    }

    fn solve(&self, stimulus: &Stimulus) -> bool {
        stimulus.matches()
    }

    fn lure(&self, stimulus: &Stimulus) -> bool {
        !stimulus.matches()
    }
}

impl Presenter for ColorMatch {
    fn controls(&self) -> &'static str {
        "y / ← match   n / → no match"
    }

    fn map_key(&self, key: Key, _stimulus: &Stimulus) -> Option<bool> {
        match key {
            Key::Char('y') | Key::Left => Some(true),
            Key::Char('n') | Key::Right => Some(false),
            _ => None,
        }
    }

    fn render(&self, stimulus: &Stimulus, view: &TrialView) -> Vec<String> {
        let mut lines = vec![
            format!("{} (printed in {})", stimulus.word.to_string().to_uppercase(), stimulus.ink),
            String::new(),
            format!("patch: ■■ {}", stimulus.patch),
        ];
        if view.phase == Phase::Feedback {
            let verdict = if stimulus.matches() { "it matched" } else { "it did not match" };
            lines.push(String::new());
            lines.push(verdict.to_string());
        }
        lines
    }
}
