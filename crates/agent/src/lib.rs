//! Agent Runtime - single-shot catalogue agent invocation
//!
//! This crate turns a conversation transcript into one answer from an external
//! agent runtime:
//! - Binds a fresh runtime session to one LLM backend and one tool connector
//! - Drives the model/tool loop to completion
//! - Extracts the final answer (or a fixed fallback message)
//! - Classifies failures into the closed `FailureKind` set
//!
//! # Architecture
//!
//! 1. **Orchestrator** (`orchestrator`) - builds the `RuntimeSession` and extracts the result
//! 2. **Runtime** (`runtime`) - `AgentRuntime` trait plus the `ToolLoopRuntime` implementation
//! 3. **Backends** (`llm`, `tools`) - OpenAI-compatible chat client and MCP tool connector
//! 4. **Classifier** (`classifier`) - `RuntimeError` → `FailureKind`
//!
//! # Key Types
//!
//! - `Orchestrator` - entry point used by the HTTP layer and the CLI
//! - `AgentRuntime` - swappable runtime contract: transcript in, ordered steps out
//! - `LlmClient` / `ToolConnector` - pluggable backend seams

pub mod classifier;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod runtime;
pub mod telemetry;
pub mod tools;

pub use classifier::classify;
pub use error::RuntimeError;
pub use orchestrator::{AgentSettings, Orchestrator};
pub use runtime::{AgentRuntime, RuntimeSession, RuntimeStep, ToolLoopRuntime};
pub use telemetry::Telemetry;
