use keystride::time_series::WpmSample;

/// X (seconds) and Y (WPM) upper bounds for the results chart
pub fn chart_bounds(samples: &[WpmSample], time_limit_secs: u32) -> (f64, f64) {
    let highest_wpm = samples.iter().map(|s| s.wpm).max().unwrap_or(0);
    let duration = samples
        .last()
        .map(|s| s.secs)
        .unwrap_or(time_limit_secs)
        .max(1);

    (f64::from(duration), f64::from(highest_wpm.max(1)))
}

pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
