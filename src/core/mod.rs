//! Core recognition logic.

pub mod ai;
pub mod learner;
pub mod matcher;
pub mod recognizer;
pub mod rules;

pub use recognizer::{Recognition, RecognitionSource, Recognizer};
