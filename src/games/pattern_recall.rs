//! Memory matrix: a few cells of a grid light up briefly, then the player
//! reproduces the pattern. Boards grow with the level; a miss drops a level.

use rand::{rngs::StdRng, seq::index::sample};
use serde::Serialize;

use super::{GameKind, Key, Presenter, TrialView};
use crate::controller::{Game, Judgement, TrialContext};
use crate::metrics::{mean_or_zero, percentage, round_to, stability_index};
use crate::session::{FailurePolicy, GameSettings, Phase, ResumePolicy, SessionState, TrialRecord};

const LEVELS: u32 = 12;
const MAX_GRID: usize = 6;
/// Key labels, row-major; enough for the largest grid.
const CELL_KEYS: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stimulus {
    pub size: usize,
    pub pattern: Vec<usize>,
    pub selected: Vec<usize>,
}

impl Stimulus {
    pub fn cells(&self) -> usize {
        self.size * self.size
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detail {
    pub size: usize,
    pub pattern_len: usize,
    pub selected: usize,
    /// Selected cells that were lit.
    pub hits: usize,
    /// Selected cells that were not lit.
    pub wrong_cells: usize,
}

impl Detail {
    /// Lit cells left unselected.
    pub fn missed_cells(&self) -> usize {
        self.pattern_len.saturating_sub(self.hits)
    }

    pub fn perfect(&self) -> bool {
        self.wrong_cells == 0 && self.missed_cells() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub span_visoespacial_max: usize,
    pub tasa_aciertos: f64,
    pub total_aciertos: u32,
    pub errores_comision: u32,
    pub errores_omision: u32,
    pub tiempo_respuesta_promedio_ms: f64,
    pub estrellas_obtenidas: u32,
    pub estabilidad_desempeno: f64,
    pub score: u32,
}

#[derive(Debug)]
pub struct PatternRecall {
    settings: GameSettings,
}

impl PatternRecall {
    pub fn new() -> Self {
        Self {
            settings: GameSettings {
                response_timeout_ms: 10_000,
                timeout_per_input: false,
                max_response_ms: 10_000,
                feedback_ms: 1_800,
                failure_policy: FailurePolicy::RegressLevel,
                resume_policy: ResumePolicy::Regenerate,
                ..GameSettings::default()
            },
        }
    }

    pub fn grid_size(level: u32) -> usize {
        let level = level.max(1) as usize;
        (3 + (level - 1) / 3).min(MAX_GRID)
    }

    pub fn pattern_len(level: u32) -> usize {
        let level = level.max(1) as usize;
        let cells = Self::grid_size(level as u32).pow(2);
        (3 + (level - 1) / 2).min(cells - 1)
    }

    pub fn display_ms(pattern_len: usize) -> u64 {
        1_000 + 300 * pattern_len as u64
    }
}

impl Default for PatternRecall {
    fn default() -> Self {
        Self::new()
    }
}

fn detail_of(s: &Stimulus) -> Detail {
    let hits = s.selected.iter().filter(|c| s.pattern.contains(c)).count();
    Detail {
        size: s.size,
        pattern_len: s.pattern.len(),
        selected: s.selected.len(),
        hits,
        wrong_cells: s.selected.len() - hits,
    }
}

impl Game for PatternRecall {
    type Stimulus = Stimulus;
    type Response = usize;
    type Detail = Detail;
    type Metrics = Metrics;

    fn kind(&self) -> GameKind {
        GameKind::PatternRecall
    }

    fn settings(&self) -> &GameSettings {
        &self.settings
    }

    fn level_count(&self) -> u32 {
        LEVELS
    }

    fn trials_in_level(&self, _level: u32) -> u32 {
        1
    }

    fn generate(&mut self, ctx: &TrialContext<'_, Detail>, rng: &mut StdRng) -> Stimulus {
        let size = Self::grid_size(ctx.level);
        let mut pattern = sample(rng, size * size, Self::pattern_len(ctx.level)).into_vec();
        pattern.sort_unstable();
        Stimulus {
            size,
            pattern,
            selected: Vec::new(),
        }
    }

    fn memorize_ms(&self, stimulus: &Stimulus) -> Option<u64> {
        Some(Self::display_ms(stimulus.pattern.len()))
    }

    fn judge(
        &self,
        stimulus: &mut Stimulus,
        response: Option<&usize>,
        _ctx: &TrialContext<'_, Detail>,
    ) -> Judgement<Detail> {
        let Some(&cell) = response else {
            return Judgement::Complete {
                correct: false,
                detail: detail_of(stimulus),
            };
        };
        if cell >= stimulus.cells() {
            return Judgement::Pending;
        }
        if let Some(pos) = stimulus.selected.iter().position(|c| *c == cell) {
            stimulus.selected.remove(pos);
            return Judgement::Pending;
        }
        stimulus.selected.push(cell);
        if !stimulus.pattern.contains(&cell) {
            return Judgement::Complete {
                correct: false,
                detail: detail_of(stimulus),
            };
        }
        if stimulus.selected.len() == stimulus.pattern.len() {
            Judgement::Complete {
                correct: true,
                detail: detail_of(stimulus),
            }
        } else {
            Judgement::Pending
        }
    }

    /// Cell-level totals over every board, timed-out boards included.
    fn metrics(&self, log: &[TrialRecord<Detail>], state: &SessionState) -> Metrics {
        let hits: usize = log.iter().map(|r| r.detail.hits).sum();
        let wrong: usize = log.iter().map(|r| r.detail.wrong_cells).sum();
        let missed: usize = log.iter().map(|r| r.detail.missed_cells()).sum();
        let rts: Vec<f64> = log.iter().map(|r| r.rt_ms as f64).collect();
        let hits_per_board: Vec<f64> = log.iter().map(|r| r.detail.hits as f64).collect();

        Metrics {
            span_visoespacial_max: log
                .iter()
                .filter(|r| r.detail.perfect())
                .map(|r| r.detail.hits)
                .max()
                .unwrap_or(0),
            tasa_aciertos: round_to(percentage(hits, hits + missed), 2),
            total_aciertos: hits as u32,
            errores_comision: wrong as u32,
            errores_omision: missed as u32,
            tiempo_respuesta_promedio_ms: round_to(mean_or_zero(&rts), 2),
            estrellas_obtenidas: state.levels_completed,
            estabilidad_desempeno: round_to(stability_index(&hits_per_board), 2),
            score: state.score,
        }
    }

    fn solve(&self, stimulus: &Stimulus) -> usize {
        stimulus
            .pattern
            .iter()
            .copied()
            .find(|c| !stimulus.selected.contains(c))
            .unwrap_or(0)
    }

    fn lure(&self, stimulus: &Stimulus) -> usize {
        (0..stimulus.cells())
            .find(|c| !stimulus.pattern.contains(c))
            .unwrap_or(0)
    }
}

impl Presenter for PatternRecall {
    fn controls(&self) -> &'static str {
        "press a cell's key to toggle it"
    }

    fn map_key(&self, key: Key, stimulus: &Stimulus) -> Option<usize> {
        let Key::Char(c) = key else {
            return None;
        };
        CELL_KEYS
            .chars()
            .position(|k| k == c)
            .filter(|cell| *cell < stimulus.cells())
    }

    fn render(&self, stimulus: &Stimulus, view: &TrialView) -> Vec<String> {
        let labels: Vec<char> = CELL_KEYS.chars().collect();
        let cell = |idx: usize| -> String {
            let lit = stimulus.pattern.contains(&idx);
            let picked = stimulus.selected.contains(&idx);
            let glyph = match view.phase {
                Phase::Memorize if lit => '■',
                Phase::Memorize => '·',
                Phase::Playing if picked => '■',
                Phase::Playing => labels.get(idx).copied().unwrap_or('?'),
                _ if lit && picked => '■',
                _ if lit => '□',
                _ if picked => '×',
                _ => '·',
            };
            glyph.to_string()
        };

        let mut lines: Vec<String> = (0..stimulus.size)
            .map(|row| {
                (0..stimulus.size)
                    .map(|col| cell(row * stimulus.size + col))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        if view.phase == Phase::Playing {
            lines.push(String::new());
            lines.push(format!(
                "{} / {} selected",
                stimulus.selected.len(),
                stimulus.pattern.len()
            ));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SessionController;
    use crate::session::SessionOptions;

    fn board() -> Stimulus {
        Stimulus {
            size: 3,
            pattern: vec![0, 4, 8],
            selected: Vec::new(),
        }
    }

    fn ctx() -> TrialContext<'static, Detail> {
        TrialContext {
            level: 1,
            trial_in_level: 0,
            log: &[],
        }
    }

    #[test]
    fn board_dimensions_follow_the_level() {
        assert_eq!(PatternRecall::grid_size(1), 3);
        assert_eq!(PatternRecall::grid_size(4), 4);
        assert_eq!(PatternRecall::grid_size(12), 6);
        assert_eq!(PatternRecall::pattern_len(1), 3);
        assert_eq!(PatternRecall::pattern_len(3), 4);
        assert_eq!(PatternRecall::pattern_len(12), 8);
        assert_eq!(PatternRecall::display_ms(3), 1_900);
    }

    #[test]
    fn pattern_never_fills_the_board() {
        for level in 1..=40 {
            let cells = PatternRecall::grid_size(level).pow(2);
            assert!(PatternRecall::pattern_len(level) < cells);
        }
    }

    #[test]
    fn toggling_a_selected_cell_deselects_it() {
        let game = PatternRecall::new();
        let mut s = board();
        assert_eq!(game.judge(&mut s, Some(&4), &ctx()), Judgement::Pending);
        assert_eq!(game.judge(&mut s, Some(&4), &ctx()), Judgement::Pending);
        assert!(s.selected.is_empty());
    }

    #[test]
    fn wrong_cell_ends_the_board() {
        let game = PatternRecall::new();
        let mut s = board();
        game.judge(&mut s, Some(&0), &ctx());
        assert_matches::assert_matches!(
            game.judge(&mut s, Some(&1), &ctx()),
            Judgement::Complete {
                correct: false,
                detail: Detail { selected: 2, .. }
            }
        );
    }

    #[test]
    fn full_pattern_completes_the_board() {
        let game = PatternRecall::new();
        let mut s = board();
        game.judge(&mut s, Some(&8), &ctx());
        game.judge(&mut s, Some(&0), &ctx());
        assert_matches::assert_matches!(
            game.judge(&mut s, Some(&4), &ctx()),
            Judgement::Complete { correct: true, .. }
        );
    }

    #[test]
    fn miss_drops_a_level_and_success_climbs() {
        let mut session = SessionController::new(
            PatternRecall::new(),
            SessionOptions {
                sound_enabled: false,
                seed: Some(8),
            },
        );
        session.start(0);
        let mut now = 0;
        let mut step = |session: &mut SessionController<PatternRecall>, correct: bool| {
            while !session.state().accepts_input() {
                now = session.next_deadline().unwrap();
                session.tick(now);
            }
            loop {
                let stimulus = session.stimulus().unwrap();
                let cell = if correct {
                    session.game().solve(stimulus)
                } else {
                    session.game().lure(stimulus)
                };
                now += 100;
                session.respond(cell, now);
                if session.state().phase != Phase::Playing {
                    break;
                }
            }
        };

        step(&mut session, true);
        step(&mut session, true);
        step(&mut session, false);
        // Feedback for the miss is still showing.
        assert_eq!(session.state().level, 3);
        step(&mut session, true);
        assert_eq!(session.log()[3].level, 2);
        assert_eq!(session.state().lives, 2);
        assert_eq!(session.state().max_level, 3);
    }

    #[test]
    fn board_timeout_is_not_extended_by_clicks() {
        let mut session = SessionController::new(
            PatternRecall::new(),
            SessionOptions {
                sound_enabled: false,
                seed: Some(8),
            },
        );
        session.start(0);
        let mut now = 0;
        while !session.state().accepts_input() {
            now = session.next_deadline().unwrap();
            session.tick(now);
        }
        let opened = now;
        let cell = session.game().solve(session.stimulus().unwrap());
        session.respond(cell, opened + 9_000);
        session.tick(opened + 10_000);
        let record = &session.log()[0];
        assert!(record.omission);
        assert_eq!(record.detail.selected, 1);
    }

    #[test]
    fn keys_outside_the_board_are_ignored() {
        let game = PatternRecall::new();
        let s = board();
        assert_eq!(game.map_key(Key::Char('a'), &s), Some(0));
        assert_eq!(game.map_key(Key::Char('i'), &s), Some(8));
        assert_eq!(game.map_key(Key::Char('j'), &s), None);
        assert_eq!(game.map_key(Key::Enter, &s), None);
    }

    #[test]
    fn metrics_count_cells_across_boards() {
        let game = PatternRecall::new();
        let rec = |correct: bool, omission: bool, len: usize, hits: usize, wrong: usize, rt_ms| {
            TrialRecord {
                level: 1,
                correct,
                omission,
                rt_ms,
                detail: Detail {
                    size: 3,
                    pattern_len: len,
                    selected: hits + wrong,
                    hits,
                    wrong_cells: wrong,
                },
            }
        };
        let log = vec![rec(true, false, 3, 3, 0, 2_000), rec(false, false, 3, 1, 1, 1_000)];
        let mut state = SessionState::new(game.settings(), false);
        state.levels_completed = 1;
        let m = game.metrics(&log, &state);
        assert_eq!(m.total_aciertos, 4);
        assert_eq!(m.errores_comision, 1);
        assert_eq!(m.errores_omision, 2);
        assert_eq!(m.tasa_aciertos, 66.67);
        assert_eq!(m.tiempo_respuesta_promedio_ms, 1_500.0);
        assert_eq!(m.estabilidad_desempeno, 0.5);
        assert_eq!(m.span_visoespacial_max, 3);
        assert_eq!(m.estrellas_obtenidas, 1);
    }

    #[test]
    fn span_only_counts_perfect_boards() {
        let game = PatternRecall::new();
        let detail = |len: usize, hits: usize, wrong: usize| Detail {
            size: 4,
            pattern_len: len,
            selected: hits + wrong,
            hits,
            wrong_cells: wrong,
        };
        let log = vec![
            TrialRecord {
                level: 1,
                correct: true,
                omission: false,
                rt_ms: 2_000,
                detail: detail(3, 3, 0),
            },
            // five of six lit cells before the clock ran out
            TrialRecord {
                level: 2,
                correct: false,
                omission: true,
                rt_ms: 10_000,
                detail: detail(6, 5, 0),
            },
        ];
        let state = SessionState::new(game.settings(), false);
        let m = game.metrics(&log, &state);
        assert_eq!(m.span_visoespacial_max, 3);
        assert_eq!(m.errores_omision, 1);
        assert_eq!(m.tiempo_respuesta_promedio_ms, 6_000.0);
    }

    #[test]
    fn wrong_cell_detail_splits_hits_and_errors() {
        let game = PatternRecall::new();
        let mut s = board();
        game.judge(&mut s, Some(&0), &ctx());
        let Judgement::Complete { detail, .. } = game.judge(&mut s, Some(&2), &ctx()) else {
            panic!("board should be complete");
        };
        assert_eq!(detail.hits, 1);
        assert_eq!(detail.wrong_cells, 1);
        assert_eq!(detail.missed_cells(), 2);
        assert!(!detail.perfect());
    }
}
