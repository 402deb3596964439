use std::time::Duration;

use crate::matcher::Counters;

/// Characters per word, the usual typing-test convention
pub const CHARS_PER_WORD: f64 = 5.0;

/// Live or final figures shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub wpm: u32,
    pub accuracy: u32,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            wpm: 0,
            accuracy: 100,
        }
    }
}

impl Metrics {
    /// `elapsed` is `None` until the clock has been armed.
    pub fn compute(counters: &Counters, elapsed: Option<Duration>) -> Self {
        Self {
            wpm: wpm(counters.correct_chars, elapsed),
            accuracy: accuracy(counters.correct_chars, counters.total_typed),
        }
    }
}

/// Only correct characters count toward speed.
pub fn wpm(correct_chars: usize, elapsed: Option<Duration>) -> u32 {
    let minutes = match elapsed {
        Some(d) => d.as_secs_f64() / 60.0,
        None => return 0,
    };
    if minutes <= 0.0 {
        return 0;
    }
    (correct_chars as f64 / CHARS_PER_WORD / minutes).round() as u32
}

pub fn accuracy(correct_chars: usize, total_typed: usize) -> u32 {
    if total_typed == 0 {
        return 100;
    }
    ((correct_chars as f64 / total_typed as f64) * 100.0)
        .round()
        .min(100.0) as u32
}
