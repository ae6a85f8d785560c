/// X (trial number) and Y (milliseconds) bounds for the reaction-time chart
pub fn compute_chart_params(rt_coords: &[(f64, f64)]) -> (f64, f64) {
    let slowest = rt_coords
        .iter()
        .map(|&(_, rt)| rt)
        .fold(0.0_f64, f64::max);

    let last_trial = rt_coords.last().map_or(1.0, |&(trial, _)| trial).max(1.0);

    (last_trial, slowest.round())
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chart_spans_one_trial() {
        assert_eq!(compute_chart_params(&[]), (1.0, 0.0));
    }

    #[test]
    fn bounds_follow_the_last_trial_and_slowest_answer() {
        let coords = [(1.0, 420.4), (2.0, 812.6), (4.0, 300.0)];
        assert_eq!(compute_chart_params(&coords), (4.0, 813.0));
    }

    #[test]
    fn labels() {
        assert_eq!(format_label(1.0), "1");
        assert_eq!(format_label(1.2345), "1.23");
    }
}
