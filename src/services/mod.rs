//! External services and collaborator interfaces.

pub mod collaborators;
pub mod completion;
pub mod ollama;
