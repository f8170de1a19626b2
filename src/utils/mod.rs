//! Text and filename helpers.

pub mod chinese;
pub mod fs;
