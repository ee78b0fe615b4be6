//! Formatter registry and the built-in formatters.
//!
//! A formatter receives the current pipeline value, its colon-separated
//! arguments and the render context, and returns the next value. Formatters
//! that cannot handle their input return it unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::context::RenderContext;
use super::expression::{as_number, display, parse_literal, split_unquoted, Literal};
use super::locale::{format_currency, format_pattern};

/// A named value transform: `(value, args, ctx) -> value`
pub type FormatterFn = Arc<dyn Fn(&Value, &[Value], &RenderContext) -> Value + Send + Sync>;

const DEFAULT_TRUNCATE_LENGTH: usize = 50;

/// Formatter lookup table. Read-only once the renderer is built.
#[derive(Clone, Default)]
pub struct FormatterRegistry {
    formatters: HashMap<String, FormatterFn>,
}

impl FormatterRegistry {
    /// Registry holding the built-in formatters
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register("date", |v, args, ctx| format_datetime(v, args, ctx, "YYYY-MM-DD"));
        registry.register("time", |v, args, ctx| format_datetime(v, args, ctx, "HH:mm:ss"));
        registry.register("currency", currency);
        registry.register("number", number);
        registry.register("upper", |v, _, _| map_text(v, |s| s.to_uppercase()));
        registry.register("lower", |v, _, _| map_text(v, |s| s.to_lowercase()));
        registry.register("trim", |v, _, _| map_text(v, |s| s.trim().to_string()));
        registry.register("truncate", truncate);
        registry.register("default", default_value);
        registry.register("join", join);
        registry
    }

    /// Add or replace a formatter
    pub fn register<F>(&mut self, name: impl Into<String>, formatter: F)
    where
        F: Fn(&Value, &[Value], &RenderContext) -> Value + Send + Sync + 'static,
    {
        self.formatters.insert(name.into(), Arc::new(formatter));
    }

    pub fn get(&self, name: &str) -> Option<&FormatterFn> {
        self.formatters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formatters.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }
}

impl std::fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.formatters.keys().collect();
        names.sort();
        f.debug_struct("FormatterRegistry")
            .field("formatters", &names)
            .finish()
    }
}

/// One `name:arg:arg` step of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterCall {
    pub name: String,
    pub args: Vec<Value>,
}

impl FormatterCall {
    /// Parse a pipeline segment. Arguments use the literal grammar; bare
    /// words are taken as plain strings.
    pub fn parse(segment: &str) -> Option<Self> {
        let mut parts = split_unquoted(segment, ':').into_iter();
        let name = parts.next().filter(|n| !n.is_empty())?.to_string();
        let args = parts
            .map(|raw| match parse_literal(raw) {
                Some(Literal::Value(value)) => value,
                Some(Literal::Undefined) => Value::Null,
                None => Value::String(raw.to_string()),
            })
            .collect();
        Some(Self { name, args })
    }
}

fn arg_str(args: &[Value], idx: usize) -> Option<String> {
    args.get(idx)
        .filter(|v| !v.is_null())
        .map(|v| display(Some(v)))
}

fn arg_usize(args: &[Value], idx: usize) -> Option<usize> {
    as_number(args.get(idx))
        .filter(|n| *n >= 0.0)
        .map(|n| n as usize)
}

fn format_datetime(value: &Value, args: &[Value], ctx: &RenderContext, fallback: &str) -> Value {
    match ctx.timezone().parse_datetime(value) {
        Some(dt) => {
            let pattern = arg_str(args, 0).unwrap_or_else(|| fallback.to_string());
            Value::String(format_pattern(&dt, &pattern))
        }
        None => value.clone(),
    }
}

fn currency(value: &Value, args: &[Value], ctx: &RenderContext) -> Value {
    match as_number(Some(value)).filter(|_| !value.is_boolean()) {
        Some(amount) => {
            let code = arg_str(args, 0);
            Value::String(format_currency(amount, code.as_deref(), ctx.locale()))
        }
        None => value.clone(),
    }
}

fn number(value: &Value, args: &[Value], _ctx: &RenderContext) -> Value {
    match as_number(Some(value)).filter(|_| !value.is_boolean()) {
        Some(n) => {
            let decimals = arg_usize(args, 0).unwrap_or(0).min(20);
            Value::String(format!("{:.*}", decimals, n))
        }
        None => value.clone(),
    }
}

fn map_text(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(f(s)),
        other => Value::String(f(&display(Some(other)))),
    }
}

fn truncate(value: &Value, args: &[Value], _ctx: &RenderContext) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    let length = arg_usize(args, 0).unwrap_or(DEFAULT_TRUNCATE_LENGTH);
    let suffix = arg_str(args, 1).unwrap_or_else(|| "...".to_string());

    if s.chars().count() <= length {
        return value.clone();
    }
    let mut cut: String = s.chars().take(length).collect();
    cut.push_str(&suffix);
    Value::String(cut)
}

fn default_value(value: &Value, args: &[Value], _ctx: &RenderContext) -> Value {
    let missing = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if missing {
        args.first().cloned().unwrap_or_else(|| Value::String(String::new()))
    } else {
        value.clone()
    }
}

fn join(value: &Value, args: &[Value], _ctx: &RenderContext) -> Value {
    match value {
        Value::Array(items) => {
            let separator = arg_str(args, 0).unwrap_or_else(|| ", ".to_string());
            let parts: Vec<String> = items.iter().map(|item| display(Some(item))).collect();
            Value::String(parts.join(&separator))
        }
        other => other.clone(),
    }
}
