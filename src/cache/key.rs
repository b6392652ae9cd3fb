//! Cache key derivation.
//!
//! Keys are SHA-256 digests over the normalized query plus a canonical,
//! sorted-key rendition of the scoping context attributes. Absent attributes
//! collapse to fixed defaults, so an empty context and a context that spells
//! those defaults out derive the same key.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::types::CacheContext;

/// Fallback file type when nothing in the context maps to a known bucket.
pub const DEFAULT_FILE_TYPE: &str = "default";

/// Ordered suffix table for bucketing file names into coarse file types.
/// Earlier rows win.
const FILE_TYPE_RULES: &[(&str, &str)] = &[
    ("package.json", "config"),
    (".tsx", "react"),
    (".jsx", "react"),
    (".ts", "typescript"),
    (".js", "javascript"),
    (".py", "python"),
    (".rs", "rust"),
    (".go", "go"),
    (".css", "stylesheet"),
    (".scss", "stylesheet"),
    (".html", "markup"),
    (".md", "docs"),
    (".json", "config"),
    (".yaml", "config"),
    (".yml", "config"),
    (".toml", "config"),
];

/// Buckets a file name, path, or bare extension into a coarse file type.
pub fn file_type_category(file: &str) -> &'static str {
    let lower = file.trim().to_lowercase();
    if lower.is_empty() {
        return DEFAULT_FILE_TYPE;
    }
    // Bare extensions ("tsx") are matched as if they were ".tsx".
    let candidate = if lower.contains('.') { lower } else { format!(".{}", lower) };
    for (suffix, category) in FILE_TYPE_RULES {
        if candidate.ends_with(suffix) {
            return category;
        }
    }
    DEFAULT_FILE_TYPE
}

/// File type a context resolves to: an explicit `file_type` wins, then the
/// bucketed `file_context` path, then the bucketed `file_extension`.
pub(crate) fn effective_file_type(context: &CacheContext) -> Option<String> {
    if let Some(file_type) = context.file_type.as_deref() {
        let file_type = file_type.trim();
        if !file_type.is_empty() {
            return Some(file_type.to_lowercase());
        }
    }
    if let Some(file_context) = context.file_context.as_deref() {
        if !file_context.trim().is_empty() {
            return Some(file_type_category(file_context).to_string());
        }
    }
    if let Some(ext) = context.file_extension.as_deref() {
        if !ext.trim().is_empty() {
            return Some(file_type_category(ext).to_string());
        }
    }
    None
}

/// Lowercase-and-trim normalization applied to queries before hashing.
///
/// Deliberately lighter than the similarity-side normalization: punctuation
/// survives into the key, so queries differing only in punctuation fall
/// through to the fuzzy match path instead of colliding.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Derives deterministic cache keys from a query and its context.
///
/// Only attributes that scope a response are folded into the key:
/// `project_type`, `language`, `framework`, `task_type`, `skill_level` and
/// the resolved file type. Telemetry fields such as `ai_model`, `session_id`
/// and `response_time_ms` never affect the key.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self { salt: None }
    }

    /// Extra value folded into every key, for namespacing caches that share
    /// a directory.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Derives the hex key for `query` under `context`.
    pub fn generate(&self, query: &str, context: &CacheContext) -> String {
        let normalized = normalize_query(query);
        let canonical = serde_json::to_string(&self.canonical_parts(context)).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(b"::");
        hasher.update(canonical.as_bytes());
        hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
    }

    // BTreeMap iterates in key order, which keeps the serialized form
    // canonical without a separate sort step.
    fn canonical_parts(&self, context: &CacheContext) -> BTreeMap<&'static str, String> {
        let mut parts = BTreeMap::new();
        parts.insert("project_type", lower_or(context.project_type.as_deref(), "unknown"));
        parts.insert("language", lower_or(context.language.as_deref(), "unknown"));
        parts.insert("framework", lower_or(context.framework.as_deref(), "unknown"));
        parts.insert("task_type", lower_or(context.task_type.as_deref(), "general"));
        parts.insert("skill_level", lower_or(context.skill_level.as_deref(), "intermediate"));
        parts.insert(
            "file_type",
            effective_file_type(context).unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string()),
        );
        if let Some(salt) = &self.salt {
            parts.insert("salt", salt.clone());
        }
        parts
    }
}

fn lower_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_lowercase(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_inputs_same_key() {
        let keygen = CacheKeyGenerator::new();
        let ctx = CacheContext::new().with_language("rust").with_framework("axum");
        let a = keygen.generate("how do I read a file", &ctx);
        let b = keygen.generate("how do I read a file", &ctx);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_lowercase_hex() {
        let key = CacheKeyGenerator::new().generate("query", &CacheContext::new());
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_query_case_and_whitespace_folded() {
        let keygen = CacheKeyGenerator::new();
        let ctx = CacheContext::new();
        assert_eq!(
            keygen.generate("  What Is Rust?  ", &ctx),
            keygen.generate("what is rust?", &ctx)
        );
    }

    #[test]
    fn test_punctuation_still_distinguishes_keys() {
        let keygen = CacheKeyGenerator::new();
        let ctx = CacheContext::new();
        assert_ne!(
            keygen.generate("what is rust?", &ctx),
            keygen.generate("what is rust", &ctx)
        );
    }

    #[test]
    fn test_each_scoped_attribute_changes_key() {
        let keygen = CacheKeyGenerator::new();
        let base = keygen.generate("q", &CacheContext::new());
        let variants = vec![
            CacheContext::new().with_project_type("web"),
            CacheContext::new().with_language("python"),
            CacheContext::new().with_framework("react"),
            CacheContext::new().with_task_type("debugging"),
            CacheContext::new().with_skill_level("expert"),
            CacheContext::new().with_file_type("rust"),
        ];
        for ctx in variants {
            assert_ne!(keygen.generate("q", &ctx), base, "context {:?} did not change key", ctx);
        }
    }

    #[test]
    fn test_differing_frameworks_never_collide() {
        let keygen = CacheKeyGenerator::new();
        let react = CacheContext::new().with_language("javascript").with_framework("react");
        let vue = CacheContext::new().with_language("javascript").with_framework("vue");
        assert_ne!(keygen.generate("component state", &react), keygen.generate("component state", &vue));
    }

    #[test]
    fn test_defaults_equal_explicit_defaults() {
        let keygen = CacheKeyGenerator::new();
        let explicit = CacheContext::new()
            .with_project_type("unknown")
            .with_language("unknown")
            .with_framework("unknown")
            .with_task_type("general")
            .with_skill_level("intermediate")
            .with_file_type("default");
        assert_eq!(
            keygen.generate("q", &CacheContext::new()),
            keygen.generate("q", &explicit)
        );
    }

    #[test]
    fn test_telemetry_fields_do_not_affect_key() {
        let keygen = CacheKeyGenerator::new();
        let noisy = CacheContext::new()
            .with_ai_model("gpt-4")
            .with_session_id("abc-123")
            .with_response_time_ms(950);
        assert_eq!(keygen.generate("q", &CacheContext::new()), keygen.generate("q", &noisy));
    }

    #[test]
    fn test_file_type_table() {
        assert_eq!(file_type_category("package.json"), "config");
        assert_eq!(file_type_category("frontend/package.json"), "config");
        assert_eq!(file_type_category("src/App.tsx"), "react");
        assert_eq!(file_type_category("component.jsx"), "react");
        assert_eq!(file_type_category("lib/util.ts"), "typescript");
        assert_eq!(file_type_category("index.js"), "javascript");
        assert_eq!(file_type_category("main.py"), "python");
        assert_eq!(file_type_category("main.rs"), "rust");
        assert_eq!(file_type_category("server.go"), "go");
        assert_eq!(file_type_category("theme.scss"), "stylesheet");
        assert_eq!(file_type_category("index.html"), "markup");
        assert_eq!(file_type_category("README.md"), "docs");
        assert_eq!(file_type_category("settings.yaml"), "config");
        assert_eq!(file_type_category("Cargo.toml"), "config");
        assert_eq!(file_type_category("mystery.xyz"), "default");
        assert_eq!(file_type_category(""), "default");
    }

    #[test]
    fn test_bare_extension_matches_like_suffix() {
        assert_eq!(file_type_category("tsx"), "react");
        assert_eq!(file_type_category("py"), "python");
        assert_eq!(file_type_category("yml"), "config");
    }

    #[test]
    fn test_effective_file_type_precedence() {
        let explicit = CacheContext::new().with_file_type("Python").with_file_context("a.ts");
        assert_eq!(effective_file_type(&explicit).as_deref(), Some("python"));

        let from_context = CacheContext::new().with_file_context("main.py").with_file_extension("ts");
        assert_eq!(effective_file_type(&from_context).as_deref(), Some("python"));

        let from_ext = CacheContext::new().with_file_extension("go");
        assert_eq!(effective_file_type(&from_ext).as_deref(), Some("go"));

        assert_eq!(effective_file_type(&CacheContext::new()), None);
    }

    #[test]
    fn test_salt_changes_key() {
        let plain = CacheKeyGenerator::new();
        let salted = CacheKeyGenerator::new().with_salt("tenant-a");
        let ctx = CacheContext::new();
        assert_ne!(plain.generate("q", &ctx), salted.generate("q", &ctx));
    }
}
