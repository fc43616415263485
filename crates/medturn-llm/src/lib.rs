//! Text-generation wrapper for turn analysis.
//!
//! This crate turns a batch of historical turn records into a free-text
//! operational summary by delegating to an external text generator
//! (an Ollama-compatible `/api/generate` endpoint by default).

pub mod generation;
pub mod prompts;
pub mod records;
pub mod summarizer;

pub use generation::*;
pub use prompts::*;
pub use records::*;
pub use summarizer::*;
