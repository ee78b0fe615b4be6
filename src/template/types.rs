//! Template types and error definitions

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a render.
///
/// Malformed templates and missing data never produce one of these; only
/// unusable options or input data do.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid render data: {0}")]
    InvalidData(String),
}

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid template ID: {0}")]
    InvalidId(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// A notification template body. Each field is rendered independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Notification title (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Notification body
    pub content: String,

    /// Click-through link (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Template {
    /// Create a template with only a content body
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: content.into(),
            link: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Per-call render options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Use the render cache for this call
    #[serde(default = "default_enable_cache")]
    pub enable_cache: bool,

    /// Explicit cache key, replacing the computed template/data hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,

    /// Locale used by currency and date output
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Timezone used for every date/time computation
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_enable_cache() -> bool {
    true
}

pub(crate) fn default_locale() -> String {
    "zh-CN".to_string()
}

pub(crate) fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            enable_cache: default_enable_cache(),
            cache_key: None,
            locale: default_locale(),
            timezone: default_timezone(),
        }
    }
}

impl RenderOptions {
    /// Options with caching turned off
    pub fn uncached() -> Self {
        Self {
            enable_cache: false,
            ..Self::default()
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }
}

/// A rendered template ready to hand to a delivery channel
#[derive(Debug, Clone, Serialize)]
pub struct RenderedTemplate {
    /// Rendered title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Rendered body
    pub content: String,

    /// Rendered link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// When the pipeline produced this result
    pub rendered_at: DateTime<Utc>,

    /// Snapshot of the data the template was rendered against
    pub context: serde_json::Value,
}

/// Renderer-wide configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Master switch for the render cache
    pub cache_enabled: bool,
    /// How long a cached render stays valid
    pub cache_ttl: Duration,
    /// Upper bound on cached renders
    pub cache_max_entries: usize,
    /// Collapse whitespace in rendered output
    pub normalize_whitespace: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: Duration::from_secs(300),
            cache_max_entries: 10_000,
            normalize_whitespace: true,
        }
    }
}

/// A template as kept by the [`TemplateStore`](super::TemplateStore)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTemplate {
    /// Unique template identifier (alphanumeric, dash, underscore)
    pub id: String,

    /// Human-readable template name
    pub name: String,

    /// Template description (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Title/content/link body
    #[serde(flatten)]
    pub template: Template,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl StoredTemplate {
    /// Validate the template
    pub fn validate(&self) -> TemplateResult<()> {
        // Validate ID
        if self.id.is_empty() || self.id.len() > 64 {
            return Err(TemplateError::InvalidId(
                "ID must be 1-64 characters".to_string(),
            ));
        }

        if !self
            .id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TemplateError::InvalidId(
                "ID must contain only alphanumeric, dash, or underscore".to_string(),
            ));
        }

        // Validate name
        if self.name.is_empty() || self.name.len() > 256 {
            return Err(TemplateError::InvalidTemplate(
                "Name must be 1-256 characters".to_string(),
            ));
        }

        if self.template.content.is_empty() {
            return Err(TemplateError::InvalidTemplate(
                "Content must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Request to create a new template
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    /// Unique template identifier
    pub id: String,

    /// Human-readable template name
    pub name: String,

    /// Template description (optional)
    pub description: Option<String>,

    /// Title template (optional)
    pub title: Option<String>,

    /// Content template
    pub content: String,

    /// Link template (optional)
    pub link: Option<String>,
}

impl From<CreateTemplateRequest> for StoredTemplate {
    fn from(req: CreateTemplateRequest) -> Self {
        let now = Utc::now();
        StoredTemplate {
            id: req.id,
            name: req.name,
            description: req.description,
            template: Template {
                title: req.title,
                content: req.content,
                link: req.link,
            },
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to update an existing template.
///
/// For the optional fields an absent key leaves the value unchanged and an
/// explicit `null` clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub title: Option<Option<String>>,

    pub content: Option<String>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub link: Option<Option<String>>,
}

/// Maps a present key to `Some`, so `null` becomes `Some(None)`
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
