//! `jobwatch-ai`
//!
//! **Responsibility:** the enrichment boundary.
//!
//! - Renders a prompt from a posting and the candidate profile.
//! - Calls a remote model through the [`Analyzer`] capability.
//! - Parses the model's structured [`Verdict`].
//!
//! This crate owns no queueing or retry logic; callers decide what to do with
//! an error based on [`AnalyzerError::is_transient`] and [`VerdictError`].

pub mod analyzer;
pub mod ollama;
pub mod prompt;
pub mod verdict;

pub use analyzer::{Analyzer, AnalyzerError};
pub use ollama::{OllamaAnalyzer, OllamaConfig};
pub use prompt::{PromptBuilder, PromptError};
pub use verdict::{Verdict, VerdictError};
