pub mod bank;
pub mod difficulty;
pub mod source;

// Re-export the main types for convenience
pub use bank::{PassageBank, PassageEntry};
pub use difficulty::Difficulty;
pub use source::{FixedPassage, PassageSource};
