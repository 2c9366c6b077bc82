//! The LLM-driven diagnosis agent.
//!
//! [`AgentLoop`] is a bounded think-act-observe executor: each step calls
//! the LLM with the conversation so far, executes any requested tools under
//! the safety policy, feeds the outputs back, and stops when the model
//! concludes, the step budget runs out, or a repetition loop is detected.

mod engine;
mod error;
mod memory;

pub use engine::{AgentLoop, DiagnosisResult, StepSink};
pub use error::AgentError;
pub use memory::ConversationMemory;
