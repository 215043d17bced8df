//! Virtual meeting background generator
//!
//! A small proxy service that validates a text prompt, rate-limits callers
//! and forwards a framed version of the prompt to an image-generation
//! provider, relaying the resulting JPEG back as base64. A matching client
//! drives the same flow from the command line.

pub mod ai;
pub mod client;
pub mod config;
pub mod error;
pub mod generate;
pub mod models;
pub mod prompts;
pub mod rate_limit;
pub mod server;

pub use error::{ApiError, Error, Result};
