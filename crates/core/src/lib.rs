//! Core types and shared functionality for the unfurl service.
//!
//! This crate provides:
//! - The `PreviewResult` model returned by `/unfurl`
//! - Two-tier preview cache (redis primary, in-process fallback)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod preview;

pub use cache::{FallbackCache, MemoryCache, PreviewCache, RedisCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use preview::{PreviewResult, PreviewSource};
