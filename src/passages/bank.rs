use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::from_str;
use std::path::Path;

use super::{Difficulty, PassageSource};
use crate::error::PassageError;
use crate::passage::Passage;

static PASSAGE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/passages/data");

const EMBEDDED_FILE: &str = "passages.json";

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PassageEntry {
    #[serde(default)]
    pub id: String,
    pub text: String,
}

/// Passage pools keyed by difficulty
#[derive(Deserialize, Clone, Debug, Default)]
pub struct PassageBank {
    #[serde(default)]
    pub easy: Vec<PassageEntry>,
    #[serde(default)]
    pub medium: Vec<PassageEntry>,
    #[serde(default)]
    pub hard: Vec<PassageEntry>,
}

impl PassageBank {
    /// Pools compiled into the binary
    pub fn embedded() -> Result<Self, PassageError> {
        let file = PASSAGE_DIR
            .get_file(EMBEDDED_FILE)
            .ok_or(PassageError::MissingEmbedded(EMBEDDED_FILE))?;
        let contents = file
            .contents_utf8()
            .ok_or(PassageError::MissingEmbedded(EMBEDDED_FILE))?;
        Self::from_json(EMBEDDED_FILE, contents)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PassageError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| PassageError::io(path, e))?;
        Self::from_json(path.display().to_string(), &raw)
    }

    pub fn from_json(origin: impl Into<String>, json: &str) -> Result<Self, PassageError> {
        from_str(json).map_err(|e| PassageError::parse(origin, e))
    }

    pub fn pool(&self, difficulty: Difficulty) -> &[PassageEntry] {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }
}

impl PassageSource for PassageBank {
    fn select(&self, difficulty: Difficulty) -> Result<Passage, PassageError> {
        let mut rng = rand::thread_rng();
        let entry = self
            .pool(difficulty)
            .iter()
            .filter(|e| !e.text.is_empty())
            .collect::<Vec<_>>()
            .choose(&mut rng)
            .copied()
            .ok_or(PassageError::EmptyPool(difficulty))?;

        tracing::debug!(id = %entry.id, %difficulty, "selected passage");
        Passage::new(entry.text.clone())
    }
}
