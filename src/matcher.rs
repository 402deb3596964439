use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::passage::Passage;

/// Per-character correctness as seen by the presentation layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharState {
    Pending,
    Current,
    Correct,
    Incorrect,
}

/// A single key press, reduced to what the matcher cares about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Backspace,
    Ignored,
}

impl Keystroke {
    /// Classify a DOM-style key name: one character is printable, "Backspace"
    /// erases, anything else ("Shift", "ArrowLeft", ...) is ignored.
    pub fn from_key_name(name: &str) -> Self {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Keystroke::Char(c),
            _ if name == "Backspace" => Keystroke::Backspace,
            _ => Keystroke::Ignored,
        }
    }

    pub fn is_printable(&self) -> bool {
        matches!(self, Keystroke::Char(_))
    }
}

impl From<KeyEvent> for Keystroke {
    fn from(key: KeyEvent) -> Self {
        if key.kind == KeyEventKind::Release {
            return Keystroke::Ignored;
        }
        match key.code {
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                Keystroke::Char(c)
            }
            KeyCode::Backspace => Keystroke::Backspace,
            _ => Keystroke::Ignored,
        }
    }
}

/// Keystroke tallies for one session. Never decremented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub correct_chars: usize,
    pub total_typed: usize,
    pub errors: usize,
}

/// What a keystroke did to the cursor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    Unchanged,
    Moved,
    /// The cursor reached the end of the passage
    Completed,
}

/// Cursor and per-character state for one passage
#[derive(Debug, Clone)]
pub struct Matcher {
    states: Vec<CharState>,
    cursor: usize,
    counters: Counters,
}

impl Matcher {
    pub fn new(len: usize) -> Self {
        let mut states = vec![CharState::Pending; len];
        if let Some(first) = states.first_mut() {
            *first = CharState::Current;
        }
        Self {
            states,
            cursor: 0,
            counters: Counters::default(),
        }
    }

    pub fn states(&self) -> &[CharState] {
        &self.states
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn apply(&mut self, key: Keystroke, passage: &Passage) -> Advance {
        let advance = match key {
            Keystroke::Char(c) => self.type_char(c, passage),
            Keystroke::Backspace => self.backspace(),
            Keystroke::Ignored => Advance::Unchanged,
        };
        debug_assert!(self.invariant_holds());
        advance
    }

    fn type_char(&mut self, c: char, passage: &Passage) -> Advance {
        if self.cursor >= self.states.len() {
            return Advance::Unchanged;
        }

        self.counters.total_typed += 1;
        if c == passage.char_at(self.cursor) {
            self.states[self.cursor] = CharState::Correct;
            self.counters.correct_chars += 1;
        } else {
            self.states[self.cursor] = CharState::Incorrect;
            self.counters.errors += 1;
        }

        self.cursor += 1;
        if self.cursor == self.states.len() {
            Advance::Completed
        } else {
            self.states[self.cursor] = CharState::Current;
            Advance::Moved
        }
    }

    fn backspace(&mut self) -> Advance {
        if self.cursor == 0 {
            return Advance::Unchanged;
        }

        if let Some(state) = self.states.get_mut(self.cursor) {
            *state = CharState::Pending;
        }
        self.cursor -= 1;
        self.states[self.cursor] = CharState::Current;
        Advance::Moved
    }

    /// Indices below the cursor are judged, the cursor index is current and
    /// everything after it is pending.
    pub fn invariant_holds(&self) -> bool {
        self.cursor <= self.states.len()
            && self.states.iter().enumerate().all(|(i, s)| match i {
                i if i < self.cursor => matches!(s, CharState::Correct | CharState::Incorrect),
                i if i == self.cursor => *s == CharState::Current,
                _ => *s == CharState::Pending,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn passage(text: &str) -> Passage {
        Passage::new(text).unwrap()
    }

    fn type_str(m: &mut Matcher, p: &Passage, s: &str) -> Advance {
        let mut last = Advance::Unchanged;
        for c in s.chars() {
            last = m.apply(Keystroke::Char(c), p);
        }
        last
    }

    #[test]
    fn test_new_marks_first_current() {
        let m = Matcher::new(3);

        assert_eq!(
            m.states(),
            &[CharState::Current, CharState::Pending, CharState::Pending]
        );
        assert_eq!(m.cursor(), 0);
        assert_eq!(m.counters(), Counters::default());
    }

    #[test]
    fn test_correct_chars_complete() {
        let p = passage("cat");
        let mut m = Matcher::new(p.len());

        assert_eq!(m.apply(Keystroke::Char('c'), &p), Advance::Moved);
        assert_eq!(m.apply(Keystroke::Char('a'), &p), Advance::Moved);
        assert_eq!(m.apply(Keystroke::Char('t'), &p), Advance::Completed);

        assert_eq!(m.cursor(), 3);
        assert_eq!(
            m.counters(),
            Counters {
                correct_chars: 3,
                total_typed: 3,
                errors: 0
            }
        );
        assert!(m.states().iter().all(|s| *s == CharState::Correct));
    }

    #[test]
    fn test_incorrect_char_counts_error() {
        let p = passage("cat");
        let mut m = Matcher::new(p.len());

        type_str(&mut m, &p, "cx");

        assert_eq!(m.states()[1], CharState::Incorrect);
        assert_eq!(m.states()[2], CharState::Current);
        assert_eq!(m.counters().errors, 1);
        assert_eq!(m.counters().correct_chars, 1);
        assert_eq!(m.counters().total_typed, 2);
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let p = passage("cat");
        let mut m = Matcher::new(p.len());
        let before = m.clone();

        assert_eq!(m.apply(Keystroke::Backspace, &p), Advance::Unchanged);
        assert_eq!(m.states(), before.states());
        assert_eq!(m.cursor(), 0);
        assert_eq!(m.counters(), before.counters());
    }

    #[test]
    fn test_backspace_keeps_errors() {
        let p = passage("cat");
        let mut m = Matcher::new(p.len());

        type_str(&mut m, &p, "cx");
        m.apply(Keystroke::Backspace, &p);

        assert_eq!(m.cursor(), 1);
        assert_eq!(
            m.states(),
            &[CharState::Correct, CharState::Current, CharState::Pending]
        );
        assert_eq!(m.counters().errors, 1);

        m.apply(Keystroke::Char('a'), &p);
        assert_eq!(m.states()[1], CharState::Correct);
        assert_eq!(
            m.counters(),
            Counters {
                correct_chars: 2,
                total_typed: 3,
                errors: 1
            }
        );
    }

    #[test]
    fn test_ignored_key_changes_nothing() {
        let p = passage("cat");
        let mut m = Matcher::new(p.len());
        m.apply(Keystroke::Char('c'), &p);

        assert_eq!(m.apply(Keystroke::Ignored, &p), Advance::Unchanged);
        assert_eq!(m.cursor(), 1);
        assert_eq!(m.counters().total_typed, 1);
    }

    #[test]
    fn test_typing_past_end_is_ignored() {
        let p = passage("a");
        let mut m = Matcher::new(p.len());

        assert_eq!(m.apply(Keystroke::Char('a'), &p), Advance::Completed);
        assert_eq!(m.apply(Keystroke::Char('b'), &p), Advance::Unchanged);
        assert_eq!(m.counters().total_typed, 1);
    }

    #[test]
    fn test_invariant_holds_across_mixed_input() {
        let p = passage("hello world");
        let mut m = Matcher::new(p.len());
        let keys = [
            Keystroke::Char('h'),
            Keystroke::Char('x'),
            Keystroke::Backspace,
            Keystroke::Backspace,
            Keystroke::Backspace,
            Keystroke::Char('h'),
            Keystroke::Char('e'),
            Keystroke::Ignored,
            Keystroke::Char(' '),
            Keystroke::Backspace,
            Keystroke::Char('l'),
        ];

        for key in keys {
            m.apply(key, &p);
            assert!(m.invariant_holds(), "invariant broken after {key:?}");
            assert!(m.cursor() <= p.len());
        }
    }

    #[test]
    fn test_from_key_name() {
        assert_eq!(Keystroke::from_key_name("a"), Keystroke::Char('a'));
        assert_eq!(Keystroke::from_key_name(" "), Keystroke::Char(' '));
        assert_eq!(Keystroke::from_key_name("Backspace"), Keystroke::Backspace);
        assert_eq!(Keystroke::from_key_name("Shift"), Keystroke::Ignored);
        assert_eq!(Keystroke::from_key_name(""), Keystroke::Ignored);
    }

    #[test]
    fn test_from_key_event() {
        let plain = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        let shifted = KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT);
        let ctrl = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let back = KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE);
        let arrow = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);

        assert_matches!(Keystroke::from(plain), Keystroke::Char('a'));
        assert_matches!(Keystroke::from(shifted), Keystroke::Char('A'));
        assert_matches!(Keystroke::from(ctrl), Keystroke::Ignored);
        assert_matches!(Keystroke::from(back), Keystroke::Backspace);
        assert_matches!(Keystroke::from(arrow), Keystroke::Ignored);
    }
}
