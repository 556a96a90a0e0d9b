//! Anthropic messages adapter.

pub mod client;
pub mod generator;
pub mod types;

pub use client::AnthropicClient;
pub use generator::AnthropicGenerator;
