//! LLM Provider implementations for Forgeloop.
//!
//! All providers implement the `forgeloop_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod openai_compat;
pub mod router;
pub mod sse;

pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
