//! Data models shared across the parser, matcher and learner.

pub mod config;
pub mod mapping;
pub mod media;
