//! taskpilot-llm - Model oracle contract
//!
//! The oracle is an opaque text-in/text-out capability with one
//! blocking and one streaming call. The engine depends only on the
//! [`Oracle`] trait; [`OpenAiOracle`] is the reference HTTP-backed
//! implementation for OpenAI-compatible endpoints.

pub mod openai;
pub mod oracle;

pub use openai::OpenAiOracle;
pub use oracle::{ChunkSink, Completion, Oracle, OracleError, Result, TokenUsage};
