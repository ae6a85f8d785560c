//! Digit span: watch digits light up on a dial, then key them back in order,
//! or last to first in the reverse variant. Each stage grows the sequence; a
//! failed round replays the stage with a new sequence.

use rand::{rngs::StdRng, Rng};
use serde::Serialize;

use super::{GameKind, Key, Presenter, TrialView};
use crate::controller::{Game, Judgement, TrialContext};
use crate::metrics::{mean_or_zero, percentage, round_to};
use crate::session::{FailurePolicy, GameSettings, Phase, ResumePolicy, SessionState, TrialRecord};

const STAGES: u32 = 9;
const REVERSE_STAGES: u32 = 8;
const LIT_MS: u64 = 700;
const GAP_MS: u64 = 300;
const DIAL: std::ops::RangeInclusive<u8> = 1..=8;

/// The order digits are keyed back in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Forward,
    Reverse,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stimulus {
    pub digits: Vec<u8>,
    /// How many digits have been keyed back correctly so far.
    pub entered: usize,
    pub order: Order,
}

impl Stimulus {
    pub fn expected(&self) -> Option<u8> {
        let idx = match self.order {
            Order::Forward => self.entered,
            Order::Reverse => self.digits.len().checked_sub(self.entered + 1)?,
        };
        self.digits.get(idx).copied()
    }

    /// The digit lit `elapsed_ms` into the presentation, if any.
    pub fn lit_at(&self, elapsed_ms: u64) -> Option<u8> {
        let slot = LIT_MS + GAP_MS;
        let idx = (elapsed_ms / slot) as usize;
        if elapsed_ms % slot < LIT_MS {
            self.digits.get(idx).copied()
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detail {
    pub length: usize,
    pub entered: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metrics {
    Forward(SpanMetrics),
    Reverse(ReverseSpanMetrics),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpanMetrics {
    pub amplitud_digitos_max: usize,
    pub porcentaje_secuencias_correctas: f64,
    pub tiempo_respuesta_promedio_ms: u64,
    pub errores_orden: u32,
    pub errores_omision: u32,
    pub score: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReverseSpanMetrics {
    pub amplitud_inversa_max: usize,
    pub porcentaje_secuencias_correctas: f64,
    pub errores_orden: u32,
    pub errores_omision: u32,
    /// Sum over every round, failed ones included.
    pub tiempo_total_respuesta_ms: u64,
    pub score: u32,
}

#[derive(Debug)]
pub struct SequenceRecall {
    settings: GameSettings,
    order: Order,
}

impl SequenceRecall {
    pub fn new() -> Self {
        Self::with_order(Order::Forward)
    }

    /// Digits are keyed back last to first.
    pub fn reversed() -> Self {
        Self::with_order(Order::Reverse)
    }

    fn with_order(order: Order) -> Self {
        Self {
            order,
            settings: GameSettings {
                response_timeout_ms: 5_000,
                max_response_ms: 60_000,
                feedback_ms: 1_000,
                failure_policy: FailurePolicy::RetryLevel,
                resume_policy: ResumePolicy::Resume,
                ..GameSettings::default()
            },
        }
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn sequence_len(stage: u32) -> usize {
        stage as usize + 2
    }

    /// Reverse rounds grow every second stage: 3, 3, 4, 4, ...
    pub fn reverse_sequence_len(stage: u32) -> usize {
        (stage as usize + 1) / 2 + 2
    }
}

impl Default for SequenceRecall {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for SequenceRecall {
    type Stimulus = Stimulus;
    type Response = u8;
    type Detail = Detail;
    type Metrics = Metrics;

    fn kind(&self) -> GameKind {
        match self.order {
            Order::Forward => GameKind::SequenceRecall,
            Order::Reverse => GameKind::ReverseRecall,
        }
    }

    fn settings(&self) -> &GameSettings {
        &self.settings
    }

    fn level_count(&self) -> u32 {
        match self.order {
            Order::Forward => STAGES,
            Order::Reverse => REVERSE_STAGES,
        }
    }

    fn trials_in_level(&self, _level: u32) -> u32 {
        1
    }

    fn generate(&mut self, ctx: &TrialContext<'_, Detail>, rng: &mut StdRng) -> Stimulus {
        let len = match self.order {
            Order::Forward => Self::sequence_len(ctx.level),
            Order::Reverse => Self::reverse_sequence_len(ctx.level),
        };
        let mut digits: Vec<u8> = Vec::with_capacity(len);
        while digits.len() < len {
            let digit = rng.gen_range(DIAL);
            if digits.last() != Some(&digit) {
                digits.push(digit);
            }
        }
        Stimulus {
            digits,
            entered: 0,
            order: self.order,
        }
    }

    fn memorize_ms(&self, stimulus: &Stimulus) -> Option<u64> {
        Some((LIT_MS + GAP_MS) * stimulus.digits.len() as u64)
    }

    fn judge(
        &self,
        stimulus: &mut Stimulus,
        response: Option<&u8>,
        _ctx: &TrialContext<'_, Detail>,
    ) -> Judgement<Detail> {
        let detail = |s: &Stimulus| Detail {
            length: s.digits.len(),
            entered: s.entered,
        };
        let Some(&digit) = response else {
            return Judgement::Complete {
                correct: false,
                detail: detail(stimulus),
            };
        };
        if stimulus.expected() != Some(digit) {
            return Judgement::Complete {
                correct: false,
                detail: detail(stimulus),
            };
        }
        stimulus.entered += 1;
        if stimulus.entered == stimulus.digits.len() {
            Judgement::Complete {
                correct: true,
                detail: detail(stimulus),
            }
        } else {
            Judgement::Pending
        }
    }

    fn metrics(&self, log: &[TrialRecord<Detail>], state: &SessionState) -> Metrics {
        let correct: Vec<_> = log.iter().filter(|r| r.correct).collect();
        let longest = correct.iter().map(|r| r.detail.length).max().unwrap_or(0);
        let success = round_to(percentage(correct.len(), log.len()), 2);
        let order_errors = log.iter().filter(|r| r.commission()).count() as u32;
        let omissions = log.iter().filter(|r| r.omission).count() as u32;

        match self.order {
            Order::Forward => {
                let rts: Vec<f64> = correct.iter().map(|r| r.rt_ms as f64).collect();
                Metrics::Forward(SpanMetrics {
                    amplitud_digitos_max: longest,
                    porcentaje_secuencias_correctas: success,
                    tiempo_respuesta_promedio_ms: mean_or_zero(&rts).round() as u64,
                    errores_orden: order_errors,
                    errores_omision: omissions,
                    score: state.score,
                })
            }
            Order::Reverse => Metrics::Reverse(ReverseSpanMetrics {
                amplitud_inversa_max: longest,
                porcentaje_secuencias_correctas: success,
                errores_orden: order_errors,
                errores_omision: omissions,
                tiempo_total_respuesta_ms: log.iter().map(|r| r.rt_ms).sum(),
                score: state.score,
            }),
        }
    }

    fn solve(&self, stimulus: &Stimulus) -> u8 {
        stimulus.expected().unwrap_or(1)
    }

    fn lure(&self, stimulus: &Stimulus) -> u8 {
        stimulus.expected().map_or(1, |d| d % 8 + 1)
    }
}

fn dial(highlight: Option<u8>) -> String {
    DIAL.map(|d| {
        if Some(d) == highlight {
            format!("[{d}]")
        } else {
            format!(" {d} ")
        }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

impl Presenter for SequenceRecall {
    fn controls(&self) -> &'static str {
        match self.order {
            Order::Forward => "1-8: key the digits back in order",
            Order::Reverse => "1-8: key the digits back, last one first",
        }
    }

    fn map_key(&self, key: Key, _stimulus: &Stimulus) -> Option<u8> {
        match key {
            Key::Char(c @ '1'..='8') => c.to_digit(10).map(|d| d as u8),
            _ => None,
        }
    }

    fn render(&self, stimulus: &Stimulus, view: &TrialView) -> Vec<String> {
        match view.phase {
            Phase::Memorize => vec![
                "watch...".to_string(),
                String::new(),
                dial(stimulus.lit_at(view.elapsed_ms)),
            ],
            Phase::Playing => {
                let progress: String = (0..stimulus.digits.len())
                    .map(|i| if i < stimulus.entered { '●' } else { '○' })
                    .collect();
                let prompt = match stimulus.order {
                    Order::Forward => "your turn",
                    Order::Reverse => "your turn, backwards",
                };
                vec![
                    prompt.to_string(),
                    String::new(),
                    dial(None),
                    String::new(),
                    progress,
                ]
            }
            _ => {
                let sequence = stimulus
                    .digits
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                vec![format!("the sequence was {sequence}")]
            }
        }
    }
}
