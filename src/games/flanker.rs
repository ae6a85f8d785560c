//! Flanker task: report the direction of the middle arrow while the arrows
//! around it point wherever they like.

use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use serde::Serialize;

use super::{GameKind, Key, Presenter, TrialView};
use crate::controller::{Game, Judgement, TrialContext};
use crate::metrics::{mean_or_zero, percentage, round_to, stability_index};
use crate::session::{GameSettings, LevelTable, Phase, SessionState, TrialRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

const DIRECTIONS: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

impl Direction {
    pub fn arrow(self) -> char {
        match self {
            Direction::Up => '↑',
            Direction::Down => '↓',
            Direction::Left => '←',
            Direction::Right => '→',
        }
    }

    fn random(rng: &mut StdRng) -> Direction {
        *DIRECTIONS.choose(rng).unwrap_or(&Direction::Up)
    }
}

/// How the flankers relate to the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Flanking {
    Congruent,
    /// Congruent with this probability, otherwise random.
    Mixed(f64),
    Random,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Level {
    pub trials: u32,
    pub flanking: Flanking,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stimulus {
    pub target: Direction,
    pub flankers: Direction,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detail {
    pub target: Direction,
    pub congruent: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub tasa_aciertos: f64,
    pub tiempo_respuesta_promedio_ms: f64,
    pub errores_comision: u32,
    pub errores_omision: u32,
    pub estabilidad_desempeno: f64,
    pub estrellas_obtenidas: u32,
    pub score: u32,
}

#[derive(Debug)]
pub struct Flanker {
    settings: GameSettings,
    levels: LevelTable<Level>,
}

impl Flanker {
    pub fn new() -> Self {
        Self::with_levels(vec![
            Level {
                trials: 7,
                flanking: Flanking::Congruent,
            },
            Level {
                trials: 7,
                flanking: Flanking::Mixed(0.5),
            },
            Level {
                trials: 14,
                flanking: Flanking::Random,
            },
        ])
    }

    pub fn with_levels(levels: Vec<Level>) -> Self {
        Self {
            settings: GameSettings {
                response_timeout_ms: 2_000,
                max_response_ms: 2_000,
                feedback_ms: 300,
                ..GameSettings::default()
            },
            levels: LevelTable::new(levels),
        }
    }
}

impl Default for Flanker {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for Flanker {
    type Stimulus = Stimulus;
    type Response = Direction;
    type Detail = Detail;
    type Metrics = Metrics;

    fn kind(&self) -> GameKind {
        GameKind::Flanker
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
        let target = Direction::random(rng);
        let flankers = match self.levels.get(ctx.level).flanking {
            Flanking::Congruent => target,
            Flanking::Mixed(p) if rng.gen_bool(p) => target,
            Flanking::Mixed(_) | Flanking::Random => Direction::random(rng),
        };
        Stimulus { target, flankers }
    }

    fn judge(
        &self,
        stimulus: &mut Stimulus,
        response: Option<&Direction>,
        _ctx: &TrialContext<'_, Detail>,
    ) -> Judgement<Detail> {
        Judgement::Complete {
            correct: response == Some(&stimulus.target),
            detail: Detail {
                target: stimulus.target,
                congruent: stimulus.flankers == stimulus.target,
            },
        }
    }

    fn metrics(&self, log: &[TrialRecord<Detail>], state: &SessionState) -> Metrics {
        let correct_rts: Vec<f64> = log
            .iter()
            .filter(|r| r.correct)
            .map(|r| r.rt_ms as f64)
            .collect();

        Metrics {
            tasa_aciertos: round_to(percentage(correct_rts.len(), log.len()), 2),
            tiempo_respuesta_promedio_ms: round_to(mean_or_zero(&correct_rts), 2),
            errores_comision: log.iter().filter(|r| r.commission()).count() as u32,
            errores_omision: log.iter().filter(|r| r.omission).count() as u32,
            estabilidad_desempeno: round_to(stability_index(&correct_rts), 2),
            estrellas_obtenidas: state.levels_completed,
            score: state.score,
        }
    }

    fn solve(&self, stimulus: &Stimulus) -> Direction {
        stimulus.target
    }

    fn lure(&self, stimulus: &Stimulus) -> Direction {
        match stimulus.target {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl Presenter for Flanker {
    fn controls(&self) -> &'static str {
        "arrow keys: direction of the middle arrow"
    }

    fn map_key(&self, key: Key, _stimulus: &Stimulus) -> Option<Direction> {
        match key {
            Key::Up | Key::Char('k') => Some(Direction::Up),
            Key::Down | Key::Char('j') => Some(Direction::Down),
            Key::Left | Key::Char('h') => Some(Direction::Left),
            Key::Right | Key::Char('l') => Some(Direction::Right),
            _ => None,
        }
    }

    fn render(&self, stimulus: &Stimulus, view: &TrialView) -> Vec<String> {
        let f = stimulus.flankers.arrow();
        let t = stimulus.target.arrow();
        let mut lines = vec![format!("{f} {f} {t} {f} {f}")];
        if view.phase == Phase::Feedback {
            lines.push(String::new());
            lines.push(format!("the middle arrow was {t}"));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn ctx(level: u32) -> TrialContext<'static, Detail> {
        TrialContext {
            level,
            trial_in_level: 0,
            log: &[],
        }
    }

    fn record(correct: bool, omission: bool, rt_ms: u64) -> TrialRecord<Detail> {
        TrialRecord {
            level: 1,
            correct,
            omission,
            rt_ms,
            detail: Detail {
                target: Direction::Up,
                congruent: true,
            },
        }
    }

    #[test]
    fn first_level_is_all_congruent() {
        let mut game = Flanker::new();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..40 {
            let s = game.generate(&ctx(1), &mut rng);
            assert_eq!(s.flankers, s.target);
        }
    }

    #[test]
    fn later_levels_produce_incongruent_trials() {
        let mut game = Flanker::new();
        let mut rng = StdRng::seed_from_u64(4);
        let incongruent = (0..200)
            .map(|_| game.generate(&ctx(3), &mut rng))
            .filter(|s| s.flankers != s.target)
            .count();
        assert!(incongruent > 0);
    }

    #[test]
    fn levels_past_the_table_reuse_the_last_one() {
        let game = Flanker::new();
        assert_eq!(game.trials_in_level(3), 14);
        assert_eq!(game.trials_in_level(7), 14);
    }

    #[test]
    fn lure_is_never_correct() {
        let game = Flanker::new();
        for target in DIRECTIONS {
            let s = Stimulus {
                target,
                flankers: target,
            };
            assert_ne!(game.lure(&s), game.solve(&s));
        }
    }

    #[test]
    fn metrics_summarise_accuracy_and_stability() {
        let game = Flanker::new();
        let log = vec![
            record(true, false, 400),
            record(true, false, 600),
            record(false, false, 300),
            record(false, true, 2_000),
        ];
        let mut state = SessionState::new(game.settings(), false);
        state.levels_completed = 1;
        state.score = 20;
        let m = game.metrics(&log, &state);
        assert_eq!(m.tasa_aciertos, 50.0);
        assert_eq!(m.tiempo_respuesta_promedio_ms, 500.0);
        assert_eq!(m.errores_comision, 1);
        assert_eq!(m.errores_omision, 1);
        assert_eq!(m.estabilidad_desempeno, 0.8);
        assert_eq!(m.estrellas_obtenidas, 1);
    }

    #[test]
    fn single_correct_trial_has_no_stability() {
        let game = Flanker::new();
        let state = SessionState::new(game.settings(), false);
        let m = game.metrics(&[record(true, false, 450)], &state);
        assert_eq!(m.estabilidad_desempeno, 0.0);
        assert_eq!(m.tasa_aciertos, 100.0);
    }
}
