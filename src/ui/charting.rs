/// X (seconds) and Y (WPM) bounds for the results chart
pub fn compute_chart_params(wpm_coords: &[(f64, f64)], allotted_secs: Option<f64>) -> (f64, f64) {
    let highest_wpm = wpm_coords
        .iter()
        .map(|&(_, wpm)| wpm)
        .fold(0.0_f64, f64::max);

    let overall_duration = match wpm_coords.last() {
        Some(&(t, _)) => t,
        None => allotted_secs.unwrap_or(1.0),
    }
    .max(1.0);

    (overall_duration, highest_wpm.round())
}

pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
