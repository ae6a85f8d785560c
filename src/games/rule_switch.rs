//! Task switching: a letter and a digit are shown together and the active
//! rule says which one to judge. The rule flips on a schedule that gets less
//! predictable level by level.

use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use serde::Serialize;

use super::{GameKind, Key, Presenter, TrialView};
use crate::controller::{Game, Judgement, TrialContext};
use crate::metrics::{guarded_mean, guarded_percentage, switch_cost};
use crate::session::{GameSettings, LevelTable, Phase, SessionState, TrialRecord};

const VOWELS: [char; 5] = ['A', 'E', 'I', 'O', 'U'];
const CONSONANTS: [char; 8] = ['B', 'C', 'D', 'F', 'G', 'H', 'J', 'K'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// "Is the digit even?"
    Parity,
    /// "Is the letter a vowel?"
    Vowel,
}

impl Rule {
    fn flipped(self) -> Rule {
        match self {
            Rule::Parity => Rule::Vowel,
            Rule::Vowel => Rule::Parity,
        }
    }

    fn question(self) -> &'static str {
        match self {
            Rule::Parity => "IS IT EVEN?",
            Rule::Vowel => "IS IT A VOWEL?",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Switching {
    /// Flip before every `n`th trial of the level.
    Every(u32),
    /// Flip before each trial with this probability.
    Random(f64),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Level {
    pub trials: u32,
    pub switching: Switching,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stimulus {
    pub letter: char,
    pub digit: u8,
    pub rule: Rule,
}

impl Stimulus {
    pub fn is_vowel(&self) -> bool {
        VOWELS.contains(&self.letter)
    }

    pub fn is_even(&self) -> bool {
        self.digit % 2 == 0
    }

    /// The two rules disagree on this stimulus.
    pub fn is_mixed(&self) -> bool {
        self.is_vowel() != self.is_even()
    }

    pub fn answer_under(&self, rule: Rule) -> bool {
        match rule {
            Rule::Parity => self.is_even(),
            Rule::Vowel => self.is_vowel(),
        }
    }

    pub fn answer(&self) -> bool {
        self.answer_under(self.rule)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detail {
    pub rule: Rule,
    pub is_switch: bool,
    pub is_mixed: bool,
    /// Wrong on a switch, but right under the previous rule.
    pub perseverative: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub costo_cambio_ms: u64,
    pub precision_cambio_porcentaje: u32,
    pub tasa_errores_perseverativos: u32,
    pub tiempo_medio_sin_cambio_ms: u64,
    pub score: u32,
}

#[derive(Debug)]
pub struct RuleSwitch {
    settings: GameSettings,
    levels: LevelTable<Level>,
    active: Rule,
}

impl RuleSwitch {
    pub fn new() -> Self {
        Self::with_levels(vec![
            Level {
                trials: 12,
                switching: Switching::Every(4),
            },
            Level {
                trials: 20,
                switching: Switching::Every(2),
            },
            Level {
                trials: 30,
                switching: Switching::Random(0.6),
            },
        ])
    }

    pub fn with_levels(levels: Vec<Level>) -> Self {
        Self {
            settings: GameSettings {
                response_timeout_ms: 3_000,
                max_response_ms: 3_000,
                feedback_ms: 600,
                ..GameSettings::default()
            },
            levels: LevelTable::new(levels),
            active: Rule::Parity,
        }
    }

    pub fn active_rule(&self) -> Rule {
        self.active
    }
}

impl Default for RuleSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for RuleSwitch {
    type Stimulus = Stimulus;
    type Response = bool;
    type Detail = Detail;
    type Metrics = Metrics;

    fn kind(&self) -> GameKind {
        GameKind::RuleSwitch
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

    fn reset(&mut self) {
        self.active = Rule::Parity;
    }

    fn generate(&mut self, ctx: &TrialContext<'_, Detail>, rng: &mut StdRng) -> Stimulus {
        let flip = match self.levels.get(ctx.level).switching {
            Switching::Every(n) => n > 0 && ctx.trial_in_level > 0 && ctx.trial_in_level % n == 0,
            Switching::Random(p) => rng.gen_bool(p),
        };
        if flip {
            self.active = self.active.flipped();
        }

        let pool: Vec<char> = VOWELS.iter().chain(CONSONANTS.iter()).copied().collect();
        Stimulus {
            letter: *pool.choose(rng).unwrap_or(&'A'),
            digit: rng.gen_range(2..=9),
            rule: self.active,
        }
    }

    fn judge(
        &self,
        stimulus: &mut Stimulus,
        response: Option<&bool>,
        ctx: &TrialContext<'_, Detail>,
    ) -> Judgement<Detail> {
        let previous_rule = ctx.previous().map(|r| r.detail.rule);
        let is_switch = previous_rule.is_some_and(|rule| rule != stimulus.rule);
        let is_mixed = stimulus.is_mixed();
        let correct = response == Some(&stimulus.answer());
        let perseverative = match (previous_rule, response) {
            (Some(rule), Some(&answer)) => {
                is_switch && is_mixed && !correct && answer == stimulus.answer_under(rule)
            }
            _ => false,
        };

        Judgement::Complete {
            correct,
            detail: Detail {
                rule: stimulus.rule,
                is_switch,
                is_mixed,
                perseverative,
            },
        }
    }

    fn metrics(&self, log: &[TrialRecord<Detail>], state: &SessionState) -> Metrics {
        let (switches, stays): (Vec<_>, Vec<_>) = log.iter().partition(|r| r.detail.is_switch);
        let correct_rts = |records: &[&TrialRecord<Detail>]| -> Vec<f64> {
            records
                .iter()
                .filter(|r| r.correct)
                .map(|r| r.rt_ms as f64)
                .collect()
        };
        let switch_rts = correct_rts(&switches);
        let stay_rts = correct_rts(&stays);
        let switch_mean = guarded_mean(&switch_rts);
        let stay_mean = guarded_mean(&stay_rts);

        let informative: Vec<_> = switches.iter().filter(|r| r.detail.is_mixed).collect();
        let perseverative = informative
            .iter()
            .filter(|r| r.detail.perseverative)
            .count();

        Metrics {
            costo_cambio_ms: switch_cost(switch_mean, stay_mean).round() as u64,
            precision_cambio_porcentaje: guarded_percentage(switch_rts.len(), switches.len())
                .round() as u32,
            tasa_errores_perseverativos: guarded_percentage(perseverative, informative.len())
                .round() as u32,
            tiempo_medio_sin_cambio_ms: stay_mean.round() as u64,
            score: state.score,
        }
    }

    fn solve(&self, stimulus: &Stimulus) -> bool {
        stimulus.answer()
    }

    fn lure(&self, stimulus: &Stimulus) -> bool {
        !stimulus.answer()
    }
}

impl Presenter for RuleSwitch {
    fn controls(&self) -> &'static str {
        "y / ← yes   n / → no"
    }

    fn map_key(&self, key: Key, _stimulus: &Stimulus) -> Option<bool> {
        match key {
            Key::Char('y') | Key::Left => Some(true),
            Key::Char('n') | Key::Right => Some(false),
            _ => None,
        }
    }

    fn render(&self, stimulus: &Stimulus, view: &TrialView) -> Vec<String> {
        let hint = match stimulus.rule {
            Rule::Parity => "look only at the number",
            Rule::Vowel => "look only at the letter",
        };
        let mut lines = vec![
            stimulus.rule.question().to_string(),
            String::new(),
            format!("[ {} {} ]", stimulus.letter, stimulus.digit),
            String::new(),
            hint.to_string(),
        ];
        if view.phase == Phase::Feedback {
            let answer = if stimulus.answer() { "yes" } else { "no" };
            lines.push(format!("the answer was {answer}"));
        }
        lines
    }
}
