//! Fuzzy matching of queries against cached candidates.

use crate::error::CacheError;
use crate::similarity::text::{self, NormalizeOptions};
use crate::types::CacheContext;
use serde::{Deserialize, Serialize};

/// Text similarity algorithm applied to normalized queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityAlgorithm {
    Levenshtein,
    Jaccard,
    Cosine,
    /// 0.5 Levenshtein + 0.3 Jaccard + 0.2 cosine.
    Hybrid,
}

impl Default for SimilarityAlgorithm {
    fn default() -> Self {
        SimilarityAlgorithm::Hybrid
    }
}

/// Tunables for the similarity pass that runs after an exact-key miss.
///
/// `query_weight` and `context_weight` blend text and context similarity into
/// the overall score that is compared against `threshold`. The config is
/// hot-swappable on a running cache via
/// [`ResponseCache::update_similarity_config`](crate::cache::ResponseCache::update_similarity_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub algorithm: SimilarityAlgorithm,
    /// Minimum overall similarity for a fuzzy hit, 0 to 1.
    pub threshold: f64,
    pub query_weight: f64,
    pub context_weight: f64,
    /// Master switch for query normalization (lowercase, trim, collapse).
    pub normalize_queries: bool,
    pub strip_punctuation: bool,
    pub enable_stemming: bool,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            algorithm: SimilarityAlgorithm::default(),
            threshold: 0.8,
            query_weight: 0.7,
            context_weight: 0.3,
            normalize_queries: true,
            strip_punctuation: true,
            enable_stemming: false,
        }
    }
}

impl SimilarityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(mut self, algorithm: SimilarityAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_query_weight(mut self, weight: f64) -> Self {
        self.query_weight = weight;
        self
    }

    pub fn with_context_weight(mut self, weight: f64) -> Self {
        self.context_weight = weight;
        self
    }

    pub fn with_normalize_queries(mut self, enabled: bool) -> Self {
        self.normalize_queries = enabled;
        self
    }

    pub fn with_strip_punctuation(mut self, enabled: bool) -> Self {
        self.strip_punctuation = enabled;
        self
    }

    pub fn with_stemming(mut self, enabled: bool) -> Self {
        self.enable_stemming = enabled;
        self
    }

    /// Validate ranges; called from cache construction so invalid tuning
    /// surfaces as a configuration error rather than odd match behavior.
    pub fn validate(&self) -> Result<(), CacheError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CacheError::configuration_field(
                "must be between 0 and 1",
                "similarity.threshold",
            ));
        }
        if !(0.0..=1.0).contains(&self.query_weight) {
            return Err(CacheError::configuration_field(
                "must be between 0 and 1",
                "similarity.query_weight",
            ));
        }
        if !(0.0..=1.0).contains(&self.context_weight) {
            return Err(CacheError::configuration_field(
                "must be between 0 and 1",
                "similarity.context_weight",
            ));
        }
        let sum = self.query_weight + self.context_weight;
        if sum <= 0.0 || sum > 1.0 + 1e-9 {
            return Err(CacheError::configuration_field(
                "query_weight + context_weight must be in (0, 1]",
                "similarity",
            ));
        }
        Ok(())
    }
}

/// A stored entry offered to the matcher: its key plus the original query and
/// context from the payload.
#[derive(Debug, Clone)]
pub struct SimilarityCandidate {
    pub cache_key: String,
    pub query: String,
    pub context: CacheContext,
}

/// One fuzzy match at or above the configured threshold.
#[derive(Debug, Clone)]
pub struct SimilarityMatch {
    pub cache_key: String,
    /// Overall similarity (text and context blended), 0 to 1.
    pub similarity: f64,
    /// Agreement between the text, context, and semantic scores; low when the
    /// signals disagree.
    pub confidence: f64,
    /// The stored query this one matched against.
    pub matched_query: String,
}

/// Relative weights of the context attributes that participate in context
/// similarity. Attributes absent on either side drop out of both numerator
/// and denominator.
const CONTEXT_WEIGHTS: [(ContextAttr, f64); 5] = [
    (ContextAttr::ProjectType, 0.30),
    (ContextAttr::Language, 0.25),
    (ContextAttr::Framework, 0.20),
    (ContextAttr::TaskType, 0.15),
    (ContextAttr::FileType, 0.10),
];

/// Partial credit for near-identical attribute values starts above this
/// Levenshtein similarity.
const PARTIAL_MATCH_FLOOR: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
enum ContextAttr {
    ProjectType,
    Language,
    Framework,
    TaskType,
    FileType,
}

impl ContextAttr {
    fn get(self, ctx: &CacheContext) -> Option<String> {
        match self {
            ContextAttr::ProjectType => ctx.project_type.clone(),
            ContextAttr::Language => ctx.language.clone(),
            ContextAttr::Framework => ctx.framework.clone(),
            ContextAttr::TaskType => ctx.task_type.clone(),
            ContextAttr::FileType => crate::cache::key::effective_file_type(ctx),
        }
    }
}

/// Multi-algorithm fuzzy matcher. Cheap to construct from a config snapshot;
/// the cache builds one per search from its hot-swappable config.
#[derive(Debug, Clone)]
pub struct SimilarityMatcher {
    config: SimilarityConfig,
}

impl SimilarityMatcher {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Apply the configured normalization. With `normalize_queries` off the
    /// query is compared verbatim.
    pub fn normalize(&self, query: &str) -> String {
        if !self.config.normalize_queries {
            return query.to_string();
        }
        let opts = NormalizeOptions {
            strip_punctuation: self.config.strip_punctuation,
            stemming: self.config.enable_stemming,
        };
        text::normalize(query, &opts)
    }

    /// Text similarity of two already-normalized queries under the configured
    /// algorithm.
    pub fn text_similarity(&self, a: &str, b: &str) -> f64 {
        match self.config.algorithm {
            SimilarityAlgorithm::Levenshtein => text::levenshtein_similarity(a, b),
            SimilarityAlgorithm::Jaccard => text::jaccard_similarity(a, b),
            SimilarityAlgorithm::Cosine => text::cosine_similarity(a, b),
            SimilarityAlgorithm::Hybrid => text::hybrid_similarity(a, b),
        }
    }

    /// Weighted context agreement. Exact attribute matches earn full weight,
    /// close string values (Levenshtein above 0.7) earn proportional weight,
    /// and attributes missing on either side are excluded entirely. With
    /// nothing comparable the score is a neutral 0.5.
    pub fn context_similarity(&self, a: &CacheContext, b: &CacheContext) -> f64 {
        let mut earned = 0.0;
        let mut comparable_weight = 0.0;
        for (attr, weight) in CONTEXT_WEIGHTS {
            let (Some(value_a), Some(value_b)) = (attr.get(a), attr.get(b)) else {
                continue;
            };
            let value_a = value_a.trim().to_lowercase();
            let value_b = value_b.trim().to_lowercase();
            comparable_weight += weight;
            if value_a == value_b {
                earned += weight;
            } else {
                let partial = text::levenshtein_similarity(&value_a, &value_b);
                if partial > PARTIAL_MATCH_FLOOR {
                    earned += weight * partial;
                }
            }
        }
        if comparable_weight == 0.0 {
            0.5
        } else {
            earned / comparable_weight
        }
    }

    /// Blend text and context scores with the configured weights.
    pub fn overall_similarity(&self, text_score: f64, context_score: f64) -> f64 {
        text_score * self.config.query_weight + context_score * self.config.context_weight
    }

    /// `max(0, 1 - 2 * stddev)` over the text, context, and semantic scores.
    pub fn confidence(text_score: f64, context_score: f64, semantic_score: f64) -> f64 {
        let scores = [text_score, context_score, semantic_score];
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        (1.0 - 2.0 * variance.sqrt()).max(0.0)
    }

    /// Score every candidate against the query and return those at or above
    /// the threshold, best first. The caller takes the head of the list.
    pub fn find_matches(
        &self,
        query: &str,
        context: &CacheContext,
        candidates: &[SimilarityCandidate],
    ) -> Vec<SimilarityMatch> {
        let normalized_query = self.normalize(query);
        let mut matches: Vec<SimilarityMatch> = candidates
            .iter()
            .filter_map(|candidate| {
                let normalized_candidate = self.normalize(&candidate.query);
                let text_score = self.text_similarity(&normalized_query, &normalized_candidate);
                let context_score = self.context_similarity(context, &candidate.context);
                let overall = self.overall_similarity(text_score, context_score);
                if overall < self.config.threshold {
                    return None;
                }
                let semantic = text::semantic_similarity(query, &candidate.query);
                Some(SimilarityMatch {
                    cache_key: candidate.cache_key.clone(),
                    similarity: overall,
                    confidence: Self::confidence(text_score, context_score, semantic),
                    matched_query: candidate.query.clone(),
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn matcher(threshold: f64) -> SimilarityMatcher {
        SimilarityMatcher::new(SimilarityConfig::new().with_threshold(threshold))
    }

    fn candidate(key: &str, query: &str, context: CacheContext) -> SimilarityCandidate {
        SimilarityCandidate {
            cache_key: key.to_string(),
            query: query.to_string(),
            context,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SimilarityConfig::default();
        assert_eq!(config.algorithm, SimilarityAlgorithm::Hybrid);
        assert!((config.threshold - 0.8).abs() < EPSILON);
        assert!((config.query_weight - 0.7).abs() < EPSILON);
        assert!((config.context_weight - 0.3).abs() < EPSILON);
        assert!(config.normalize_queries);
        assert!(!config.enable_stemming);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_bad_threshold() {
        assert!(SimilarityConfig::new().with_threshold(1.5).validate().is_err());
        assert!(SimilarityConfig::new().with_threshold(-0.1).validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_bad_weights() {
        let err = SimilarityConfig::new()
            .with_query_weight(0.9)
            .with_context_weight(0.9)
            .validate()
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(SimilarityConfig::new()
            .with_query_weight(0.0)
            .with_context_weight(0.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_context_similarity_exact_match() {
        let m = matcher(0.8);
        let a = CacheContext::new().with_language("css").with_framework("react");
        let b = CacheContext::new().with_language("css").with_framework("react");
        assert!((m.context_similarity(&a, &b) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_context_similarity_neutral_when_nothing_comparable() {
        let m = matcher(0.8);
        let a = CacheContext::new().with_language("css");
        let b = CacheContext::new().with_framework("react");
        // Language absent on b, framework absent on a: nothing comparable.
        assert!((m.context_similarity(&a, &b) - 0.5).abs() < EPSILON);
        assert!((m.context_similarity(&CacheContext::new(), &CacheContext::new()) - 0.5).abs()
            < EPSILON);
    }

    #[test]
    fn test_context_similarity_excludes_absent_attributes() {
        let m = matcher(0.8);
        let a = CacheContext::new().with_language("css").with_framework("react");
        let b = CacheContext::new().with_language("css");
        // Only language is comparable, and it matches fully.
        assert!((m.context_similarity(&a, &b) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_context_similarity_partial_credit() {
        let m = matcher(0.8);
        let a = CacheContext::new().with_language("typescript");
        let b = CacheContext::new().with_language("typescripts");
        let partial = text::levenshtein_similarity("typescript", "typescripts");
        assert!(partial > PARTIAL_MATCH_FLOOR);
        assert!((m.context_similarity(&a, &b) - partial).abs() < EPSILON);
    }

    #[test]
    fn test_context_similarity_mismatch_scores_zero() {
        let m = matcher(0.8);
        let a = CacheContext::new().with_framework("react");
        let b = CacheContext::new().with_framework("vue");
        // Distant values earn nothing; weights still count in the denominator.
        assert!(m.context_similarity(&a, &b) < EPSILON);
    }

    #[test]
    fn test_context_similarity_uses_derived_file_type() {
        let m = matcher(0.8);
        let a = CacheContext::new().with_file_context("src/App.tsx");
        let b = CacheContext::new().with_file_type("react");
        assert!((m.context_similarity(&a, &b) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_confidence_perfect_agreement() {
        assert!((SimilarityMatcher::confidence(0.9, 0.9, 0.9) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_confidence_drops_with_disagreement() {
        let aligned = SimilarityMatcher::confidence(0.8, 0.8, 0.7);
        let split = SimilarityMatcher::confidence(1.0, 0.2, 0.5);
        assert!(split < aligned);
        assert!(split >= 0.0);
    }

    #[test]
    fn test_confidence_floors_at_zero() {
        assert!((SimilarityMatcher::confidence(1.0, 0.0, 0.0) - 0.0).abs() < 0.2);
        assert!(SimilarityMatcher::confidence(1.0, 0.0, 1.0) >= 0.0);
    }

    #[test]
    fn test_find_matches_threshold_and_order() {
        let m = matcher(0.5);
        let ctx = CacheContext::new().with_language("css");
        let candidates = vec![
            candidate("far", "rust ownership rules", CacheContext::new().with_language("rust")),
            candidate("exactish", "how do i center a div", ctx.clone()),
            candidate("close", "how to center a div", ctx.clone()),
        ];
        let matches = m.find_matches("how do i center a div?", &ctx, &candidates);
        assert!(!matches.is_empty());
        // Exact textual match (modulo normalization) must rank first.
        assert_eq!(matches[0].cache_key, "exactish");
        assert!((matches[0].similarity - 1.0).abs() < EPSILON);
        for pair in matches.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        for found in &matches {
            assert!(found.similarity >= 0.5);
            assert!(found.cache_key != "far" || found.similarity >= 0.5);
        }
    }

    #[test]
    fn test_find_matches_empty_below_threshold() {
        let m = matcher(0.95);
        let ctx = CacheContext::new();
        let candidates = vec![candidate("a", "completely different topic", ctx.clone())];
        assert!(m.find_matches("how do i center a div", &ctx, &candidates).is_empty());
    }

    #[test]
    fn test_normalization_gate() {
        let m = SimilarityMatcher::new(
            SimilarityConfig::new().with_normalize_queries(false),
        );
        assert_eq!(m.normalize("HOW?"), "HOW?");
        let m = SimilarityMatcher::new(SimilarityConfig::new());
        assert_eq!(m.normalize("HOW?"), "how");
    }

    #[test]
    fn test_algorithm_dispatch() {
        let lev = SimilarityMatcher::new(
            SimilarityConfig::new().with_algorithm(SimilarityAlgorithm::Levenshtein),
        );
        let jac = SimilarityMatcher::new(
            SimilarityConfig::new().with_algorithm(SimilarityAlgorithm::Jaccard),
        );
        // Same tokens reordered: Jaccard sees identity, Levenshtein does not.
        let a = "center the div";
        let b = "div the center";
        assert!((jac.text_similarity(a, b) - 1.0).abs() < EPSILON);
        assert!(lev.text_similarity(a, b) < 1.0);
    }
}
