//! # Forgeloop Core
//!
//! Domain types, traits, and error definitions for the Forgeloop agent.
//! This crate has **no HTTP, process or filesystem dependencies**. It defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping model backends via configuration
//! - Easy testing with scripted providers and mock tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod message;
pub mod protocol;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{ActionEncoding, AgentConfig, CompressionLevel, SummarizationPolicy};
pub use error::{ConversationError, Error, ProviderError, Result, ToolError};
pub use message::{Message, Role};
pub use protocol::{Actions, ParsedResponse, RawParam, ToolCallRequest};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use tool::{ParamSpec, ParamType, ParameterSchema, Tool, ToolRegistry};
