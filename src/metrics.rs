//! Reductions shared by the per-game metrics aggregators.
//!
//! Empty inputs never produce NaN or infinity: percentages and means of an
//! empty subset are 0.

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    match (mean(data), data.len()) {
        (Some(data_mean), count) if count > 0 => {
            let variance = data
                .iter()
                .map(|value| {
                    let diff = data_mean - *value;

                    diff * diff
                })
                .sum::<f64>()
                / count as f64;

            Some(variance.sqrt())
        }
        _ => None,
    }
}

/// `part / whole` as a percentage, 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Percentage with the denominator floored at 1, as the rule-switch
/// aggregator reports it.
pub fn guarded_percentage(part: usize, whole: usize) -> f64 {
    part as f64 / whole.max(1) as f64 * 100.0
}

/// Mean with the denominator floored at 1 (0 for an empty slice).
pub fn guarded_mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len().max(1) as f64
}

/// Mean reaction time of `rts`, 0 when empty.
pub fn mean_or_zero(data: &[f64]) -> f64 {
    mean(data).unwrap_or(0.0)
}

/// Extra time spent on switch trials over stay trials, never negative.
pub fn switch_cost(switch_mean: f64, stay_mean: f64) -> f64 {
    (switch_mean - stay_mean).max(0.0)
}

/// `1 - sd/mean`: 1 is perfectly steady. Needs at least two samples and a
/// positive mean, otherwise 0.
pub fn stability_index(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    match (mean(data), std_dev(data)) {
        (Some(m), Some(sd)) if m > 0.0 => 1.0 - sd / m,
        _ => 0.0,
    }
}

/// Standard deviation with at least two samples, otherwise 0.
pub fn variability(data: &[f64]) -> f64 {
    if data.len() < 2 {
        0.0
    } else {
        std_dev(data).unwrap_or(0.0)
    }
}

/// Round to `places` decimals, the precision results are reported with.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
