use super::Difficulty;
use crate::error::PassageError;
use crate::passage::Passage;

/// Supplies the reference text for a new session
pub trait PassageSource {
    fn select(&self, difficulty: Difficulty) -> Result<Passage, PassageError>;
}

/// Source that always hands out the same custom prompt, whatever the difficulty
#[derive(Debug, Clone)]
pub struct FixedPassage {
    text: String,
}

impl FixedPassage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl PassageSource for FixedPassage {
    fn select(&self, _difficulty: Difficulty) -> Result<Passage, PassageError> {
        Passage::new(self.text.clone())
    }
}

impl<S: PassageSource + ?Sized> PassageSource for Box<S> {
    fn select(&self, difficulty: Difficulty) -> Result<Passage, PassageError> {
        (**self).select(difficulty)
    }
}
