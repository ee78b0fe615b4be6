//! Function registry, call parsing and the built-in functions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset};
use serde_json::Value;

use super::context::RenderContext;
use super::expression::{parse_literal, unquote, Literal};
use super::locale::Locale;

/// A named function: `(args, ctx) -> value`
pub type TemplateFn = Arc<dyn Fn(&[Value], &RenderContext) -> Value + Send + Sync>;

/// Function lookup table. Read-only once the renderer is built.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, TemplateFn>,
}

impl FunctionRegistry {
    /// Registry holding the built-in functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register("timeAgo", time_ago);
        registry.register("relativeDate", relative_date);
        registry.register("age", age);
        registry
    }

    /// Add or replace a function
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value], &RenderContext) -> Value + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

/// A parsed `name(arg, ...)` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

impl<'a> FunctionCall<'a> {
    /// Recognize `name(args)`; anything else is not a call
    pub fn parse(expr: &'a str) -> Option<Self> {
        let expr = expr.trim();
        let open = expr.find('(')?;
        if !expr.ends_with(')') {
            return None;
        }
        let name = expr[..open].trim();
        let mut chars = name.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        Some(Self {
            name,
            args: scan_args(&expr[open + 1..expr.len() - 1])?,
        })
    }

    /// Evaluate arguments: quoted strings and literals as-is, anything else
    /// as a data path (undefined becomes null)
    pub fn resolve_args(&self, ctx: &RenderContext) -> Vec<Value> {
        self.args
            .iter()
            .map(|raw| {
                if let Some(inner) = unquote(raw) {
                    return Value::String(inner.to_string());
                }
                match parse_literal(raw) {
                    Some(Literal::Value(value)) => value,
                    Some(Literal::Undefined) => Value::Null,
                    None => ctx.resolve(raw).cloned().unwrap_or(Value::Null),
                }
            })
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    Quoted(char),
}

/// Split an argument list on commas outside quotes.
///
/// Returns `None` for an unterminated quote; `""` yields no arguments.
fn scan_args(input: &str) -> Option<Vec<&str>> {
    if input.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut args = Vec::new();
    let mut state = ScanState::Normal;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        state = match (state, ch) {
            (ScanState::Normal, '"' | '\'') => ScanState::Quoted(ch),
            (ScanState::Normal, ',') => {
                args.push(input[start..i].trim());
                start = i + 1;
                ScanState::Normal
            }
            (ScanState::Quoted(q), c) if c == q => ScanState::Normal,
            (state, _) => state,
        };
    }
    if state != ScanState::Normal {
        return None;
    }
    args.push(input[start..].trim());
    Some(args)
}

fn date_arg(args: &[Value], ctx: &RenderContext) -> Option<DateTime<FixedOffset>> {
    ctx.timezone().parse_datetime(args.first()?)
}

/// `timeAgo(date)`: minutes/hours/days ago, else the locale date
fn time_ago(args: &[Value], ctx: &RenderContext) -> Value {
    let Some(date) = date_arg(args, ctx) else {
        return Value::Null;
    };
    let locale = ctx.locale();
    let elapsed = ctx.local_now().signed_duration_since(date);

    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    let text = if elapsed.num_seconds() < 0 || days >= 30 {
        locale.format_date(date.date_naive())
    } else if minutes < 1 {
        match locale {
            Locale::ZhCn | Locale::ZhTw => "刚刚".to_string(),
            Locale::JaJp => "たった今".to_string(),
            _ => "just now".to_string(),
        }
    } else if hours < 1 {
        ago(locale, minutes, ("分钟前", "分前", "minute"))
    } else if days < 1 {
        ago(locale, hours, ("小时前", "時間前", "hour"))
    } else {
        ago(locale, days, ("天前", "日前", "day"))
    };
    Value::String(text)
}

fn ago(locale: Locale, n: i64, units: (&str, &str, &str)) -> String {
    let (zh, ja, en) = units;
    match locale {
        Locale::ZhCn | Locale::ZhTw => format!("{}{}", n, zh),
        Locale::JaJp => format!("{}{}", n, ja),
        _ if n == 1 => format!("1 {} ago", en),
        _ => format!("{} {}s ago", n, en),
    }
}

/// `relativeDate(date)`: today/tomorrow/yesterday, N days within a week,
/// else the locale date
fn relative_date(args: &[Value], ctx: &RenderContext) -> Value {
    let Some(date) = date_arg(args, ctx) else {
        return Value::Null;
    };
    let locale = ctx.locale();
    let target = date.date_naive();
    let diff = target
        .signed_duration_since(ctx.local_now().date_naive())
        .num_days();

    let text = match (diff, locale.is_chinese(), locale) {
        (0, true, _) => "今天".to_string(),
        (1, true, _) => "明天".to_string(),
        (-1, true, _) => "昨天".to_string(),
        (2..=7, true, _) => format!("{}天后", diff),
        (-7..=-2, true, _) => format!("{}天前", -diff),
        (0, _, Locale::JaJp) => "今日".to_string(),
        (1, _, Locale::JaJp) => "明日".to_string(),
        (-1, _, Locale::JaJp) => "昨日".to_string(),
        (2..=7, _, Locale::JaJp) => format!("{}日後", diff),
        (-7..=-2, _, Locale::JaJp) => format!("{}日前", -diff),
        (0, _, _) => "today".to_string(),
        (1, _, _) => "tomorrow".to_string(),
        (-1, _, _) => "yesterday".to_string(),
        (2..=7, _, _) => format!("in {} days", diff),
        (-7..=-2, _, _) => format!("{} days ago", -diff),
        _ => locale.format_date(target),
    };
    Value::String(text)
}

/// `age(birthDate)`: whole years, one less before this year's birthday
fn age(args: &[Value], ctx: &RenderContext) -> Value {
    let Some(birth) = date_arg(args, ctx) else {
        return Value::Null;
    };
    let today = ctx.local_now().date_naive();
    let birth = birth.date_naive();

    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    Value::from(years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::context::ContextBuilder;
    use crate::template::types::RenderOptions;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    // 2024-06-15 12:00:00 in Shanghai
    fn ctx(locale: &str) -> RenderContext {
        ContextBuilder::new(&RenderOptions::default().with_locale(locale))
            .data(&json!({"user": {"birthday": "1990-06-16"}}))
            .unwrap()
            .now(Utc.with_ymd_and_hms(2024, 6, 15, 4, 0, 0).unwrap())
            .build()
            .unwrap()
    }

    fn call(name: &str, args: Vec<Value>, locale: &str) -> Value {
        let registry = FunctionRegistry::with_builtins();
        let function = registry.get(name).unwrap();
        function(&args, &ctx(locale))
    }

    #[test]
    fn test_parse_call_respects_quotes() {
        let call = FunctionCall::parse("greet(\"hi, there\", name)").unwrap();
        assert_eq!(call.name, "greet");
        assert_eq!(call.args, vec!["\"hi, there\"", "name"]);
    }

    #[test]
    fn test_parse_call_shapes() {
        assert_eq!(FunctionCall::parse("now()").unwrap().args, Vec::<&str>::new());
        assert_eq!(FunctionCall::parse(" age( user.birthday ) ").unwrap().args, vec!["user.birthday"]);
        assert!(FunctionCall::parse("user.name").is_none());
        assert!(FunctionCall::parse("1abc(x)").is_none());
        assert!(FunctionCall::parse("f(\"open)").is_none());
        assert!(FunctionCall::parse("a.b(x)").is_none());
    }

    #[test]
    fn test_resolve_args() {
        let ctx = ctx("zh-CN");
        let call = FunctionCall::parse("f('a,b', 3, user.birthday, missing, true)").unwrap();
        assert_eq!(
            call.resolve_args(&ctx),
            vec![json!("a,b"), json!(3), json!("1990-06-16"), Value::Null, json!(true)]
        );
    }

    #[test]
    fn test_time_ago_buckets() {
        assert_eq!(call("timeAgo", vec![json!("2024-06-15 11:59:40")], "zh-CN"), json!("刚刚"));
        assert_eq!(call("timeAgo", vec![json!("2024-06-15 11:55:00")], "zh-CN"), json!("5分钟前"));
        assert_eq!(call("timeAgo", vec![json!("2024-06-15 09:00:00")], "zh-CN"), json!("3小时前"));
        assert_eq!(call("timeAgo", vec![json!("2024-06-13 12:00:00")], "zh-CN"), json!("2天前"));
        assert_eq!(call("timeAgo", vec![json!("2024-06-15 11:00:00")], "en-US"), json!("1 hour ago"));
        assert_eq!(call("timeAgo", vec![json!("2024-06-15 10:00:00")], "en-US"), json!("2 hours ago"));
        assert_eq!(call("timeAgo", vec![json!("2024-01-01")], "zh-CN"), json!("2024/1/1"));
        assert_eq!(call("timeAgo", vec![json!("garbage")], "zh-CN"), Value::Null);
    }

    #[test]
    fn test_relative_date() {
        assert_eq!(call("relativeDate", vec![json!("2024-06-15 23:00")], "zh-CN"), json!("今天"));
        assert_eq!(call("relativeDate", vec![json!("2024-06-16")], "zh-CN"), json!("明天"));
        assert_eq!(call("relativeDate", vec![json!("2024-06-14")], "zh-CN"), json!("昨天"));
        assert_eq!(call("relativeDate", vec![json!("2024-06-18")], "zh-CN"), json!("3天后"));
        assert_eq!(call("relativeDate", vec![json!("2024-06-10")], "en-US"), json!("5 days ago"));
        assert_eq!(call("relativeDate", vec![json!("2024-06-16")], "en-US"), json!("tomorrow"));
        assert_eq!(call("relativeDate", vec![json!("2024-07-30")], "en-US"), json!("7/30/2024"));
    }

    #[test]
    fn test_age_accounts_for_birthday() {
        assert_eq!(call("age", vec![json!("1990-06-16")], "zh-CN"), json!(33));
        assert_eq!(call("age", vec![json!("1990-06-15")], "zh-CN"), json!(34));
        assert_eq!(call("age", vec![Value::Null], "zh-CN"), Value::Null);
        assert_eq!(call("age", vec![], "zh-CN"), Value::Null);
    }
}
