//! Protocol translation core for an intercepting LLM chat-completion proxy.
//!
//! This crate mediates between three chat-completion wire protocols
//! (OpenAI ChatCompletions, OpenAI Responses, Anthropic Messages) plus a
//! read-only Gemini upstream source, through a provider-neutral canonical
//! representation. See `SPEC_FULL.md` for the full design.
//!
//! HTTP routing, authentication, persistence, and configuration loading
//! are intentionally out of scope — this crate only implements the
//! translation core that such a front-end would call into.

pub mod aggregator;
pub mod canonical;
pub mod config;
pub mod error;
pub mod logging;
pub mod mappers;

pub mod adapters;
pub mod transducer;

pub use canonical::*;
pub use error::{ConversionError, ConversionErrorKind};
