// Supporting modules
pub mod config;
pub mod metrics;
pub mod telemetry;

// Template rendering
pub mod template;

pub use template::{
    RenderError, RenderOptions, RenderedTemplate, Renderer, RendererBuilder, RendererConfig,
    Template,
};
