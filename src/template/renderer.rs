//! Render orchestration: context, evaluation, normalization and caching.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;

use super::cache::{cache_key, RenderCache};
use super::context::{ContextBuilder, RenderContext};
use super::expression::{display, evaluate_condition, resolve_operand, split_unquoted};
use super::formatters::{FormatterCall, FormatterRegistry};
use super::functions::{FunctionCall, FunctionRegistry};
use super::lexer::{BlockKind, Braces};
use super::parser::{parse, Node};
use super::types::{RenderError, RenderOptions, RenderedTemplate, RendererConfig, Template};
use crate::metrics::RenderMetrics;

/// Builder for [`Renderer`]. Custom formatters and functions must be added
/// here; the built renderer is read-only.
pub struct RendererBuilder {
    config: RendererConfig,
    formatters: FormatterRegistry,
    functions: FunctionRegistry,
}

impl RendererBuilder {
    pub fn config(mut self, config: RendererConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a formatter, replacing a built-in of the same name
    pub fn formatter<F>(mut self, name: impl Into<String>, formatter: F) -> Self
    where
        F: Fn(&Value, &[Value], &RenderContext) -> Value + Send + Sync + 'static,
    {
        self.formatters.register(name, formatter);
        self
    }

    /// Register a function, replacing a built-in of the same name
    pub fn function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value], &RenderContext) -> Value + Send + Sync + 'static,
    {
        self.functions.register(name, function);
        self
    }

    pub fn build(self) -> Renderer {
        let cache = RenderCache::new(self.config.cache_ttl, self.config.cache_max_entries);
        Renderer {
            config: self.config,
            formatters: self.formatters,
            functions: self.functions,
            cache,
        }
    }
}

/// Notification template renderer.
///
/// Owns its formatter/function registries and its render cache. Share it
/// behind an `Arc`; rendering only needs `&self`.
pub struct Renderer {
    config: RendererConfig,
    formatters: FormatterRegistry,
    functions: FunctionRegistry,
    cache: RenderCache,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Renderer {
    /// Renderer with built-in formatters and functions and default config
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RendererBuilder {
        RendererBuilder {
            config: RendererConfig::default(),
            formatters: FormatterRegistry::with_builtins(),
            functions: FunctionRegistry::with_builtins(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Drop every cached render
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Render a template against caller data.
    ///
    /// Title, content and link are rendered independently with one shared
    /// context. Only unusable options or non-object data fail the call.
    #[tracing::instrument(name = "template.render", skip_all, fields(cached = tracing::field::Empty))]
    pub fn render(
        &self,
        template: &Template,
        data: &Value,
        options: &RenderOptions,
    ) -> Result<Arc<RenderedTemplate>, RenderError> {
        let use_cache = self.config.cache_enabled && options.enable_cache;
        let key = if use_cache {
            match cache_key(template, data, options) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to compute render cache key, rendering uncached");
                    None
                }
            }
        } else {
            None
        };

        if let Some(key) = &key {
            if let Some(hit) = self.cache.get(key) {
                RenderMetrics::record_cache_hit();
                tracing::Span::current().record("cached", true);
                tracing::debug!(cache_key = %key, "Render cache hit");
                return Ok(hit);
            }
            RenderMetrics::record_cache_miss();
            tracing::debug!(cache_key = %key, "Render cache miss");
        }

        let started = Instant::now();
        let ctx = ContextBuilder::new(options)
            .data(data)
            .and_then(|builder| builder.build())
            .map_err(|e| {
                RenderMetrics::record_failed();
                tracing::warn!(error = %e, "Template render failed");
                e
            })?;

        let rendered = Arc::new(RenderedTemplate {
            title: template.title.as_deref().map(|t| self.render_str(t, &ctx)),
            content: self.render_str(&template.content, &ctx),
            link: template.link.as_deref().map(|l| self.render_str(l, &ctx)),
            rendered_at: Utc::now(),
            context: Value::Object(ctx.into_data()),
        });
        RenderMetrics::record_rendered(started.elapsed().as_secs_f64());

        if let Some(key) = key {
            tracing::Span::current().record("cached", false);
            if !self.cache.insert(key, rendered.clone()) {
                tracing::debug!("Render result not cached");
            }
        }

        Ok(rendered)
    }

    /// Render one template string against a prepared context
    pub fn render_str(&self, source: &str, ctx: &RenderContext) -> String {
        let nodes = parse(source);
        let mut out = String::with_capacity(source.len());
        self.render_nodes(&nodes, ctx, &mut out);

        if self.config.normalize_whitespace {
            normalize_whitespace(&out)
        } else {
            out
        }
    }

    fn render_nodes(&self, nodes: &[Node], ctx: &RenderContext, out: &mut String) {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Expr {
                    source,
                    braces,
                    raw,
                } => self.render_expr(source, *braces, raw, ctx, out),
                Node::Block {
                    kind,
                    arg,
                    body,
                    otherwise,
                } => self.render_block(*kind, arg, body, otherwise.as_deref(), ctx, out),
            }
        }
    }

    fn render_block(
        &self,
        kind: BlockKind,
        arg: &str,
        body: &[Node],
        otherwise: Option<&[Node]>,
        ctx: &RenderContext,
        out: &mut String,
    ) {
        match kind {
            BlockKind::If | BlockKind::Unless => {
                let truthy = evaluate_condition(arg, ctx);
                let take_body = if kind == BlockKind::If { truthy } else { !truthy };
                if take_body {
                    self.render_nodes(body, ctx, out);
                } else if let Some(otherwise) = otherwise {
                    self.render_nodes(otherwise, ctx, out);
                }
            }
            BlockKind::Each => match ctx.resolve(arg) {
                Some(Value::Array(items)) if !items.is_empty() => {
                    for (index, item) in items.iter().enumerate() {
                        let scoped = ctx.scoped(item, index, items.len());
                        self.render_nodes(body, &scoped, out);
                    }
                }
                _ => {
                    if let Some(otherwise) = otherwise {
                        self.render_nodes(otherwise, ctx, out);
                    }
                }
            },
        }
    }

    fn render_expr(
        &self,
        source: &str,
        braces: Braces,
        raw: &str,
        ctx: &RenderContext,
        out: &mut String,
    ) {
        if braces == Braces::Single {
            // Legacy placeholders stay verbatim when unresolved
            match ctx.resolve(source) {
                Some(value) => out.push_str(&display(Some(value))),
                None => out.push_str(raw),
            }
            return;
        }

        let segments = split_unquoted(source, '|');
        if segments.len() > 1 {
            let value = self.evaluate_pipeline(&segments, ctx);
            out.push_str(&display(Some(&value)));
            return;
        }

        match self.evaluate_base(source, ctx) {
            Ok(value) => out.push_str(&display(value.as_ref())),
            Err(()) => out.push_str(raw),
        }
    }

    /// Resolve a call, literal or path. `Err` means an unknown function.
    fn evaluate_base(&self, expr: &str, ctx: &RenderContext) -> Result<Option<Value>, ()> {
        match FunctionCall::parse(expr) {
            Some(call) => match self.functions.get(call.name) {
                Some(function) => Ok(Some(function(&call.resolve_args(ctx), ctx))),
                None => {
                    RenderMetrics::record_warning("unknown_function");
                    tracing::warn!(function = %call.name, "Unknown template function, leaving placeholder");
                    Err(())
                }
            },
            None => Ok(resolve_operand(expr, ctx)),
        }
    }

    fn evaluate_pipeline(&self, segments: &[&str], ctx: &RenderContext) -> Value {
        let mut value = self
            .evaluate_base(segments[0], ctx)
            .ok()
            .flatten()
            .unwrap_or(Value::Null);

        for segment in &segments[1..] {
            let Some(call) = FormatterCall::parse(segment) else {
                continue;
            };
            match self.formatters.get(&call.name) {
                Some(formatter) => value = formatter(&value, &call.args, ctx),
                None => {
                    RenderMetrics::record_warning("unknown_formatter");
                    tracing::warn!(formatter = %call.name, "Unknown template formatter, skipping");
                }
            }
        }
        value
    }
}

/// Collapse whitespace runs within lines, trim lines, squeeze blank lines
/// down to one and trim the result.
pub fn normalize_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_blank = false;

    for line in input.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(&collapsed);
    }
    out
}
