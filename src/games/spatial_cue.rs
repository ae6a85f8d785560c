//! Posner cueing: a fixation cross, then an arrow cue, then a target on one
//! side. The cue points the right way most of the time, less so as the levels
//! go up, and catching a target behind a lying cue pays double.

use rand::{rngs::StdRng, Rng};
use serde::Serialize;

use super::{GameKind, Key, Presenter, TrialView};
use crate::controller::{Game, Judgement, TrialContext};
use crate::metrics::{mean, percentage, round_to, variability};
use crate::session::{GameSettings, LevelTable, Phase, SessionState, TrialRecord};

const FIXATION_MS: u64 = 600;
const CUE_MS: u64 = 400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Level {
    pub trials: u32,
    pub p_valid: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stimulus {
    pub cue: Side,
    pub target: Side,
}

impl Stimulus {
    pub fn valid(&self) -> bool {
        self.cue == self.target
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detail {
    pub valid: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub tiempo_medio_reaccion_validos: f64,
    pub costo_reorientacion: f64,
    pub variabilidad_tr: f64,
    pub errores_comision: u32,
    pub errores_omision: u32,
    pub tasa_aciertos: f64,
    pub estrellas_obtenidas: u32,
    pub score: u32,
}

#[derive(Debug)]
pub struct SpatialCue {
    settings: GameSettings,
    levels: LevelTable<Level>,
}

impl SpatialCue {
    pub fn new() -> Self {
        Self::with_levels(vec![
            Level {
                trials: 15,
                p_valid: 0.75,
            },
            Level {
                trials: 15,
                p_valid: 0.6,
            },
            Level {
                trials: 15,
                p_valid: 0.5,
            },
        ])
    }

    pub fn with_levels(levels: Vec<Level>) -> Self {
        Self {
            settings: GameSettings {
                response_timeout_ms: 2_000,
                max_response_ms: 2_000,
                feedback_ms: 500,
                ..GameSettings::default()
            },
            levels: LevelTable::new(levels),
        }
    }
}

impl Default for SpatialCue {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for SpatialCue {
    type Stimulus = Stimulus;
    type Response = Side;
    type Detail = Detail;
    type Metrics = Metrics;

    fn kind(&self) -> GameKind {
        GameKind::SpatialCue
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
        let cue = if rng.gen_bool(0.5) {
            Side::Left
        } else {
            Side::Right
        };
        let target = if rng.gen_bool(self.levels.get(ctx.level).p_valid) {
            cue
        } else {
            cue.opposite()
        };
        Stimulus { cue, target }
    }

    fn memorize_ms(&self, _stimulus: &Stimulus) -> Option<u64> {
        Some(FIXATION_MS + CUE_MS)
    }

    fn judge(
        &self,
        stimulus: &mut Stimulus,
        response: Option<&Side>,
        _ctx: &TrialContext<'_, Detail>,
    ) -> Judgement<Detail> {
        Judgement::Complete {
            correct: response == Some(&stimulus.target),
            detail: Detail {
                valid: stimulus.valid(),
            },
        }
    }

    fn reward(&self, record: &TrialRecord<Detail>) -> u32 {
        let base = self.settings.base_reward * record.level;
        if record.detail.valid {
            base
        } else {
            base * 2
        }
    }

    fn metrics(&self, log: &[TrialRecord<Detail>], state: &SessionState) -> Metrics {
        let rts = |valid: bool| -> Vec<f64> {
            log.iter()
                .filter(|r| r.correct && r.detail.valid == valid)
                .map(|r| r.rt_ms as f64)
                .collect()
        };
        let valid_mean = mean(&rts(true));
        let invalid_mean = mean(&rts(false));
        let reorienting = match (valid_mean, invalid_mean) {
            (Some(valid), Some(invalid)) => invalid - valid,
            _ => 0.0,
        };
        let correct_rts: Vec<f64> = log
            .iter()
            .filter(|r| r.correct)
            .map(|r| r.rt_ms as f64)
            .collect();

        Metrics {
            tiempo_medio_reaccion_validos: round_to(valid_mean.unwrap_or(0.0), 2),
            costo_reorientacion: round_to(reorienting, 2),
            variabilidad_tr: round_to(variability(&correct_rts), 2),
            errores_comision: log.iter().filter(|r| r.commission()).count() as u32,
            errores_omision: log.iter().filter(|r| r.omission).count() as u32,
            tasa_aciertos: round_to(percentage(correct_rts.len(), log.len()), 2),
            estrellas_obtenidas: state.levels_completed,
            score: state.score,
        }
    }

    fn solve(&self, stimulus: &Stimulus) -> Side {
        stimulus.target
    }

    fn lure(&self, stimulus: &Stimulus) -> Side {
        stimulus.target.opposite()
    }
}

impl Presenter for SpatialCue {
    fn controls(&self) -> &'static str {
        "← / → : side of the target"
    }

    fn map_key(&self, key: Key, _stimulus: &Stimulus) -> Option<Side> {
        match key {
            Key::Left | Key::Char('h') => Some(Side::Left),
            Key::Right | Key::Char('l') => Some(Side::Right),
            _ => None,
        }
    }

    fn render(&self, stimulus: &Stimulus, view: &TrialView) -> Vec<String> {
        let centre = match view.phase {
            Phase::Memorize if view.elapsed_ms < FIXATION_MS => "+",
            Phase::Memorize => match stimulus.cue {
                Side::Left => "<",
                Side::Right => ">",
            },
            _ => "+",
        };
        let (left, right) = match (view.phase, stimulus.target) {
            (Phase::Playing | Phase::Feedback, Side::Left) => ("■", " "),
            (Phase::Playing | Phase::Feedback, Side::Right) => (" ", "■"),
            _ => (" ", " "),
        };
        let mut lines = vec![format!("[ {left} ]     {centre}     [ {right} ]")];
        if view.phase == Phase::Feedback && !stimulus.valid() {
            lines.push(String::new());
            lines.push("the cue lied".to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SessionController;
    use crate::session::SessionOptions;

    fn record(valid: bool, correct: bool, omission: bool, rt_ms: u64) -> TrialRecord<Detail> {
        TrialRecord {
            level: 1,
            correct,
            omission,
            rt_ms,
            detail: Detail { valid },
        }
    }

    #[test]
    fn invalid_cue_pays_double() {
        let game = SpatialCue::new();
        let mut r = record(true, true, false, 300);
        r.level = 2;
        assert_eq!(game.reward(&r), 20);
        r.detail.valid = false;
        assert_eq!(game.reward(&r), 40);
    }

    #[test]
    fn input_opens_after_fixation_and_cue() {
        let mut session = SessionController::new(
            SpatialCue::new(),
            SessionOptions {
                sound_enabled: false,
                seed: Some(1),
            },
        );
        session.start(0);
        session.tick(3_000);
        assert_eq!(session.state().phase, Phase::Memorize);
        let target = session.stimulus().unwrap().target;
        assert!(!session.respond(target, 3_500));
        session.tick(4_000);
        assert_eq!(session.state().phase, Phase::Playing);
        assert!(session.respond(target, 4_350));
        assert_eq!(session.log()[0].rt_ms, 350);
    }

    #[test]
    fn reorienting_cost_needs_both_subsets() {
        let game = SpatialCue::new();
        let state = SessionState::new(game.settings(), false);
        let only_valid = vec![record(true, true, false, 300), record(true, true, false, 500)];
        let m = game.metrics(&only_valid, &state);
        assert_eq!(m.costo_reorientacion, 0.0);
        assert_eq!(m.tiempo_medio_reaccion_validos, 400.0);
        assert_eq!(m.variabilidad_tr, 100.0);

        let mut both = only_valid;
        both.push(record(false, true, false, 550));
        both.push(record(false, false, true, 2_000));
        let m = game.metrics(&both, &state);
        assert_eq!(m.costo_reorientacion, 150.0);
        assert_eq!(m.tasa_aciertos, 75.0);
        assert_eq!(m.errores_omision, 1);
        assert_eq!(m.errores_comision, 0);
    }

    #[test]
    fn cue_is_drawn_after_fixation() {
        let game = SpatialCue::new();
        let s = Stimulus {
            cue: Side::Right,
            target: Side::Left,
        };
        let early = TrialView {
            phase: Phase::Memorize,
            elapsed_ms: 100,
            outcome: None,
        };
        let late = TrialView {
            elapsed_ms: 700,
            ..early
        };
        assert!(game.render(&s, &early)[0].contains('+'));
        assert!(game.render(&s, &late)[0].contains('>'));
        assert!(!game.render(&s, &late)[0].contains('■'));
    }
}
