//! Core type definitions shared across the cache engine.
//!
//! This module provides:
//! - [`CacheContext`]: the optional request attributes that scope a cache key
//! - [`ResponseBody`]: the schema-validated but otherwise opaque cached value

mod context;
mod response;

pub use context::CacheContext;
pub use response::ResponseBody;
