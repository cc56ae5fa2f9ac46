//! LLM-backed collaborators for the quotation pipeline.
//!
//! The pipeline in `renoquote-core` only knows the `Extractor` and
//! `ContentSafety` traits. This crate provides implementations of both that
//! call a language model, plus the wiring that picks between them and the
//! deterministic fallbacks based on configuration.
//!
//! # Modules
//!
//! - `llm` - `LlmClient` trait and an HTTP client for OpenAI-compatible and Ollama endpoints
//! - `extraction` - transcript to `RequestItem` list via a JSON prompt
//! - `guardrails` - SAFE/UNSAFE prompt-injection classifier
//! - `runtime` - config-driven assembly of the collaborators
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. It never sees the catalog and never
//! decides prices; matching and pricing stay deterministic in the core.

pub mod extraction;
pub mod guardrails;
pub mod llm;
pub mod runtime;

pub use extraction::{parse_extraction_response, LlmExtractor};
pub use guardrails::{LlmSafetyClassifier, LLM_REASON};
pub use llm::{HttpLlmClient, LlmClient, LlmPrompt};
pub use runtime::{AgentCollaborators, ConfiguredExtractor};
