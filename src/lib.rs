//! Media Parser Library
//!
//! Turns free-form movie and TV episode filenames (including fansub releases
//! in mixed CJK/Latin scripts) into structured metadata using a rule cascade,
//! learned filename patterns and an optional AI fallback.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod preflight;
pub mod services;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
