use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::passages::Difficulty;
use crate::store::KeyValueStore;

/// How many recent high scores are kept per difficulty
pub const MAX_RECENT_SCORES: usize = 5;

/// Classification of a finished session against the stored history
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Outcome {
    /// First finished session for the difficulty
    Baseline,
    /// Beat the personal best
    NewRecord,
    Ordinary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub wpm: u32,
    pub date: NaiveDate,
    pub id: u64,
}

fn pb_key(d: Difficulty) -> String {
    format!("typing_test_pb_{}", d.key())
}

fn baseline_key(d: Difficulty) -> String {
    format!("has_tested_{}", d.key())
}

fn scores_key(d: Difficulty) -> String {
    format!("scores_{}", d.key())
}

/// Personal bests, baseline flags and recent high scores per difficulty.
///
/// Read failures and corrupt values fall back to defaults; write failures are
/// logged and dropped so a broken history never blocks a test.
pub struct ScoreLedger {
    store: Box<dyn KeyValueStore>,
    last_id: u64,
}

impl std::fmt::Debug for ScoreLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreLedger")
            .field("last_id", &self.last_id)
            .finish_non_exhaustive()
    }
}

impl ScoreLedger {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store, last_id: 0 }
    }

    pub fn personal_best(&self, d: Difficulty) -> u32 {
        self.read(&pb_key(d))
            .and_then(|raw| match raw.trim().parse::<u32>() {
                Ok(pb) => Some(pb),
                Err(_) => {
                    tracing::warn!(difficulty = %d, value = %raw, "corrupt personal best, using 0");
                    None
                }
            })
            .unwrap_or(0)
    }

    /// Any non-blank marker counts; only `record` writes one, as `"true"`.
    pub fn has_baseline(&self, d: Difficulty) -> bool {
        self.read(&baseline_key(d))
            .is_some_and(|raw| !raw.trim().is_empty())
    }

    /// Highest scores first, at most [`MAX_RECENT_SCORES`]
    pub fn recent_scores(&self, d: Difficulty) -> Vec<ScoreRecord> {
        let Some(raw) = self.read(&scores_key(d)) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<ScoreRecord>>(&raw) {
            Ok(scores) => top_scores(scores),
            Err(e) => {
                tracing::warn!(difficulty = %d, error = %e, "corrupt score list, ignoring");
                Vec::new()
            }
        }
    }

    /// Classify and persist a finished session's WPM.
    pub fn record(&mut self, d: Difficulty, wpm: u32, date: NaiveDate, now_millis: u64) -> Outcome {
        let previous_pb = self.personal_best(d);

        let outcome = if !self.has_baseline(d) {
            self.write(&baseline_key(d), "true");
            Outcome::Baseline
        } else if wpm > previous_pb {
            Outcome::NewRecord
        } else {
            Outcome::Ordinary
        };

        let mut scores = self.recent_scores(d);
        let floor = scores
            .iter()
            .map(|s| s.id)
            .max()
            .unwrap_or(0)
            .max(self.last_id);
        let id = now_millis.max(floor + 1);
        self.last_id = id;

        scores.push(ScoreRecord { wpm, date, id });
        let scores = top_scores(scores);
        match serde_json::to_string(&scores) {
            Ok(json) => self.write(&scores_key(d), &json),
            Err(e) => tracing::warn!(error = %e, "failed to serialize score list"),
        }

        if wpm > previous_pb {
            self.write(&pb_key(d), &wpm.to_string());
        }

        tracing::info!(difficulty = %d, wpm, previous_pb, %outcome, "recorded score");
        outcome
    }

    /// Forget everything stored for a difficulty
    pub fn reset(&mut self, d: Difficulty) {
        for key in [pb_key(d), baseline_key(d), scores_key(d)] {
            if let Err(e) = self.store.remove(&key) {
                tracing::warn!(%key, error = %e, "failed to clear score key");
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%key, error = %e, "score store read failed, using default");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!(%key, error = %e, "score store write failed");
        }
    }
}

/// Stable sort descending by wpm, then keep the best few
fn top_scores(scores: Vec<ScoreRecord>) -> Vec<ScoreRecord> {
    scores
        .into_iter()
        .sorted_by(|a, b| b.wpm.cmp(&a.wpm))
        .take(MAX_RECENT_SCORES)
        .collect()
}
