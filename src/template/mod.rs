//! Notification template rendering.
//!
//! Templates mix literal text with a small directive language:
//! - Interpolation: `{{user.name}}` and the legacy `{user.name}`
//! - Blocks: `{{#if cond}}..{{else}}..{{/if}}`, `{{#unless cond}}..{{/unless}}`,
//!   `{{#each list}}..{{/each}}` (with `this`, `index`, `first`, `last`)
//! - Function calls: `{{timeAgo(order.created_at)}}`
//! - Formatter pipelines: `{{ price | number:2 | default:"0.00" }}`
//!
//! Rendering never fails on malformed templates or missing data; only
//! unusable options or input data return a [`RenderError`].
//!
//! # Example
//!
//! ```ignore
//! let renderer = Renderer::new();
//!
//! let template = Template::new("Order {{order_id}} ships {{relativeDate(eta)}}")
//!     .with_title("{{#if vip}}[VIP] {{/if}}Order update");
//!
//! let data = json!({
//!     "order_id": "ORD-123",
//!     "eta": "2024-06-16",
//!     "vip": true
//! });
//!
//! let rendered = renderer.render(&template, &data, &RenderOptions::default())?;
//! ```

mod cache;
mod context;
mod expression;
mod formatters;
mod functions;
mod lexer;
mod locale;
mod parser;
mod renderer;
mod store;
mod types;

pub use cache::{cache_key, CacheEntry, RenderCache};
pub use context::{ContextBuilder, RenderContext};
pub use expression::{evaluate_condition, is_truthy};
pub use formatters::{FormatterFn, FormatterRegistry};
pub use functions::{FunctionRegistry, TemplateFn};
pub use locale::{Locale, Timezone};
pub use renderer::{normalize_whitespace, Renderer, RendererBuilder};
pub use store::TemplateStore;
pub use types::{
    CreateTemplateRequest, RenderError, RenderOptions, RenderedTemplate, RendererConfig,
    StoredTemplate, Template, TemplateError, TemplateResult, UpdateTemplateRequest,
};
