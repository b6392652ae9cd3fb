//! Request context attributes.

use serde::{Deserialize, Serialize};

/// Optional attributes describing where a query came from.
///
/// Every field is optional; the key generator fills absent tracked fields with
/// fixed defaults so that "no context" still produces a stable key. Two
/// contexts that differ in any tracked attribute produce different cache keys,
/// which keeps answers scoped to the project/language/framework they were
/// generated for.
///
/// # Example
///
/// ```rust
/// use ai_cache_rust::types::CacheContext;
///
/// let ctx = CacheContext::new()
///     .with_language("typescript")
///     .with_framework("react")
///     .with_task_type("debugging");
/// assert_eq!(ctx.language.as_deref(), Some("typescript"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
    /// A file path or name the query is about, e.g. `src/App.tsx`. Mapped to a
    /// coarse [`file_type`](Self::file_type) category during key derivation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    /// Coarse file category. When set explicitly it wins over the category
    /// derived from [`file_context`](Self::file_context).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl CacheContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_type(mut self, value: impl Into<String>) -> Self {
        self.project_type = Some(value.into());
        self
    }

    pub fn with_language(mut self, value: impl Into<String>) -> Self {
        self.language = Some(value.into());
        self
    }

    pub fn with_framework(mut self, value: impl Into<String>) -> Self {
        self.framework = Some(value.into());
        self
    }

    pub fn with_task_type(mut self, value: impl Into<String>) -> Self {
        self.task_type = Some(value.into());
        self
    }

    pub fn with_skill_level(mut self, value: impl Into<String>) -> Self {
        self.skill_level = Some(value.into());
        self
    }

    pub fn with_file_context(mut self, value: impl Into<String>) -> Self {
        self.file_context = Some(value.into());
        self
    }

    pub fn with_file_extension(mut self, value: impl Into<String>) -> Self {
        self.file_extension = Some(value.into());
        self
    }

    pub fn with_file_type(mut self, value: impl Into<String>) -> Self {
        self.file_type = Some(value.into());
        self
    }

    pub fn with_ai_model(mut self, value: impl Into<String>) -> Self {
        self.ai_model = Some(value.into());
        self
    }

    pub fn with_session_id(mut self, value: impl Into<String>) -> Self {
        self.session_id = Some(value.into());
        self
    }

    pub fn with_response_time_ms(mut self, value: u64) -> Self {
        self.response_time_ms = Some(value);
        self
    }

    /// True when no attribute is set at all.
    pub fn is_empty(&self) -> bool {
        self.project_type.is_none()
            && self.language.is_none()
            && self.framework.is_none()
            && self.task_type.is_none()
            && self.skill_level.is_none()
            && self.file_context.is_none()
            && self.file_extension.is_none()
            && self.file_type.is_none()
            && self.ai_model.is_none()
            && self.session_id.is_none()
            && self.response_time_ms.is_none()
    }
}
