//! 相似度匹配模块：在精确键未命中后进行多算法模糊查询匹配。
//!
//! # Similarity Matching Module
//!
//! This module decides whether a cached answer written for one query can serve
//! a slightly different one. It only runs after an exact-key miss, scanning
//! live entries with a configurable blend of text and context similarity.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SimilarityMatcher`] | Scores candidates and returns threshold matches, best first |
//! | [`SimilarityConfig`] | Algorithm choice, threshold, query/context weights, normalization |
//! | [`SimilarityAlgorithm`] | Levenshtein, Jaccard, cosine, or the weighted hybrid |
//! | [`text`] | The underlying pure similarity and normalization functions |
//!
//! ## Example
//!
//! ```rust
//! use ai_cache_rust::similarity::{SimilarityConfig, SimilarityMatcher};
//! use ai_cache_rust::types::CacheContext;
//!
//! let matcher = SimilarityMatcher::new(SimilarityConfig::new().with_threshold(0.75));
//! let a = matcher.normalize("How do I center a div?");
//! let b = matcher.normalize("how do i center a div");
//! assert_eq!(a, b);
//! ```

pub mod text;

mod matcher;

pub use matcher::{
    SimilarityAlgorithm, SimilarityCandidate, SimilarityConfig, SimilarityMatch,
    SimilarityMatcher,
};
