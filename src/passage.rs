use crate::error::PassageError;

/// Immutable reference text for one session.
///
/// Characters are stored decoded so index lookups are O(1) and always refer to
/// whole `char`s, never to byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    text: String,
    chars: Vec<char>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Result<Self, PassageError> {
        let text = text.into();
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Err(PassageError::Empty);
        }
        Ok(Self { text, chars })
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Never true; a passage holds at least one character.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Character at `idx`.
    ///
    /// Panics when `idx >= len()`: callers own the cursor bounds.
    pub fn char_at(&self, idx: usize) -> char {
        match self.chars.get(idx) {
            Some(c) => *c,
            None => panic!(
                "passage index {idx} out of bounds (len {})",
                self.chars.len()
            ),
        }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}
