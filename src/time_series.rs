use serde::{Deserialize, Serialize};

/// Live WPM sampled at a point of a session, `t` in elapsed seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub t: f64,
    pub wpm: u32,
}

impl TimeSeriesPoint {
    pub fn new(t: f64, wpm: u32) -> Self {
        Self { t, wpm }
    }
}

impl From<TimeSeriesPoint> for (f64, f64) {
    fn from(p: TimeSeriesPoint) -> Self {
        (p.t, p.wpm as f64)
    }
}

/// Population standard deviation of the sampled WPM values, 0 with no samples
pub fn consistency(points: &[TimeSeriesPoint]) -> f64 {
    let samples: Vec<f64> = points.iter().map(|p| p.wpm as f64).collect();
    crate::metrics::std_dev(&samples).unwrap_or(0.0)
}
