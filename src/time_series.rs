/// Live WPM captured at a whole second of the running clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WpmSample {
    pub secs: u32,
    pub wpm: u32,
}

impl WpmSample {
    pub fn new(secs: u32, wpm: u32) -> Self {
        Self { secs, wpm }
    }
}

impl From<WpmSample> for (f64, f64) {
    fn from(s: WpmSample) -> Self {
        (s.secs as f64, s.wpm as f64)
    }
}

/// Chart-ready points
pub fn as_points(samples: &[WpmSample]) -> Vec<(f64, f64)> {
    samples.iter().copied().map(Into::into).collect()
}
