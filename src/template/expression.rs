//! Condition evaluation, the literal grammar and value coercions.

use std::cmp::Ordering;

use serde_json::Value;

use super::context::RenderContext;
use crate::metrics::RenderMetrics;

/// Comparison operators, longest first so `===` is never split as `==`
const OPERATORS: &[&str] = &["===", "!==", "==", "!=", ">=", "<=", ">", "<"];

/// Result of reading an operand as a literal
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Value(Value),
    Undefined,
}

/// Parse the literal grammar: quoted strings, numbers, `true`, `false`,
/// `null` and `undefined`. Anything else is not a literal.
pub fn parse_literal(raw: &str) -> Option<Literal> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(inner) = unquote(s) {
        return Some(Literal::Value(Value::String(inner.to_string())));
    }

    match s {
        "true" => return Some(Literal::Value(Value::Bool(true))),
        "false" => return Some(Literal::Value(Value::Bool(false))),
        "null" => return Some(Literal::Value(Value::Null)),
        "undefined" => return Some(Literal::Undefined),
        _ => {}
    }

    parse_number(s).map(Literal::Value)
}

/// Strip matching single or double quotes
pub fn unquote(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

fn parse_number(s: &str) -> Option<Value> {
    let starts_numeric = s
        .trim_start_matches(['-', '+'])
        .starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if !starts_numeric {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Resolve an operand: a literal if it reads as one, otherwise a data path
pub fn resolve_operand(raw: &str, ctx: &RenderContext) -> Option<Value> {
    match parse_literal(raw) {
        Some(Literal::Value(value)) => Some(value),
        Some(Literal::Undefined) => None,
        None => ctx.resolve(raw).cloned(),
    }
}

/// Truthiness: null/undefined false, booleans as-is, numbers non-zero,
/// strings, arrays and objects non-empty.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Output form of a value. Undefined and null print as empty.
pub fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => display_number(n),
        Some(other) => other.to_string(),
    }
}

fn display_number(n: &serde_json::Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                return format!("{}", f as i64);
            }
        }
    }
    n.to_string()
}

/// Numeric view of a value, coercing numeric strings and booleans
pub fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn strict_equals(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn loose_equals(left: Option<&Value>, right: Option<&Value>) -> bool {
    let is_nullish = |v: Option<&Value>| matches!(v, None | Some(Value::Null));
    if is_nullish(left) || is_nullish(right) {
        return is_nullish(left) && is_nullish(right);
    }

    match (left, right) {
        (Some(Value::String(a)), Some(Value::String(b))) => a == b,
        (Some(Value::Number(_) | Value::Bool(_)), _) | (_, Some(Value::Number(_) | Value::Bool(_))) => {
            match (as_number(left), as_number(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => strict_equals(left, right),
    }
}

fn relational(left: Option<&Value>, right: Option<&Value>) -> Option<Ordering> {
    if let (Some(Value::String(a)), Some(Value::String(b))) = (left, right) {
        if let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
            return x.partial_cmp(&y);
        }
        return Some(a.cmp(b));
    }
    match (left?, right?) {
        (Value::Null, _) | (_, Value::Null) => None,
        _ => as_number(left)?.partial_cmp(&as_number(right)?),
    }
}

/// Evaluate a condition string to a boolean.
///
/// Never fails: an unparseable condition is `false` and recorded as a
/// warning.
pub fn evaluate_condition(condition: &str, ctx: &RenderContext) -> bool {
    let condition = condition.trim();
    if condition.is_empty() {
        malformed(condition, "empty condition");
        return false;
    }

    // `!` applies to the whole remaining condition: `!a == b` is `!(a == b)`
    if let Some(rest) = condition.strip_prefix('!').filter(|rest| !rest.starts_with('=')) {
        if rest.trim().is_empty() {
            malformed(condition, "negation without operand");
            return false;
        }
        return !evaluate_condition(rest, ctx);
    }

    for op in OPERATORS {
        if let Some(pos) = find_unquoted(condition, op) {
            let left = condition[..pos].trim();
            let right = condition[pos + op.len()..].trim();
            if left.is_empty() || right.is_empty() {
                malformed(condition, "missing operand");
                return false;
            }

            let lhs = resolve_operand(left, ctx);
            let rhs = resolve_operand(right, ctx);
            let (lhs, rhs) = (lhs.as_ref(), rhs.as_ref());
            return match *op {
                "===" => strict_equals(lhs, rhs),
                "!==" => !strict_equals(lhs, rhs),
                "==" => loose_equals(lhs, rhs),
                "!=" => !loose_equals(lhs, rhs),
                ">=" => matches!(relational(lhs, rhs), Some(Ordering::Greater | Ordering::Equal)),
                "<=" => matches!(relational(lhs, rhs), Some(Ordering::Less | Ordering::Equal)),
                ">" => matches!(relational(lhs, rhs), Some(Ordering::Greater)),
                _ => matches!(relational(lhs, rhs), Some(Ordering::Less)),
            };
        }
    }

    is_truthy(resolve_operand(condition, ctx).as_ref())
}

fn malformed(condition: &str, reason: &str) {
    RenderMetrics::record_warning("malformed_condition");
    tracing::warn!(condition = %condition, reason = %reason, "Malformed condition evaluates to false");
}

/// Byte offset of the first `needle` outside single or double quotes
pub fn find_unquoted(haystack: &str, needle: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in haystack.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if haystack[i..].starts_with(needle) => return Some(i),
            None => {}
        }
    }
    None
}

/// Split on `separator` outside quotes; pieces are trimmed
pub fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == separator => {
                parts.push(input[start..i].trim());
                start = i + ch.len_utf8();
            }
            None => {}
        }
    }
    parts.push(input[start..].trim());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::context::ContextBuilder;
    use crate::template::types::RenderOptions;
    use serde_json::json;

    fn ctx(data: Value) -> RenderContext {
        ContextBuilder::new(&RenderOptions::default())
            .data(&data)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_literal_grammar() {
        assert_eq!(parse_literal("\"hi, there\""), Some(Literal::Value(json!("hi, there"))));
        assert_eq!(parse_literal("'x'"), Some(Literal::Value(json!("x"))));
        assert_eq!(parse_literal("42"), Some(Literal::Value(json!(42))));
        assert_eq!(parse_literal("-1.5"), Some(Literal::Value(json!(-1.5))));
        assert_eq!(parse_literal("true"), Some(Literal::Value(json!(true))));
        assert_eq!(parse_literal("null"), Some(Literal::Value(Value::Null)));
        assert_eq!(parse_literal("undefined"), Some(Literal::Undefined));
        assert_eq!(parse_literal("user.name"), None);
        assert_eq!(parse_literal("\"unterminated"), None);
    }

    #[test]
    fn test_truthiness_table() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&Value::Null)));
        assert!(is_truthy(Some(&json!(true))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(0.0))));
        assert!(is_truthy(Some(&json!(-3))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(is_truthy(Some(&json!("0"))));
        assert!(!is_truthy(Some(&json!([]))));
        assert!(is_truthy(Some(&json!([0]))));
        assert!(!is_truthy(Some(&json!({}))));
        assert!(is_truthy(Some(&json!({"a": 1}))));
    }

    #[test]
    fn test_display_values() {
        assert_eq!(display(None), "");
        assert_eq!(display(Some(&Value::Null)), "");
        assert_eq!(display(Some(&json!(3.0))), "3");
        assert_eq!(display(Some(&json!(3.25))), "3.25");
        assert_eq!(display(Some(&json!(false))), "false");
        assert_eq!(display(Some(&json!([1, 2]))), "[1,2]");
    }

    #[test]
    fn test_condition_truthiness_and_negation() {
        let c = ctx(json!({"vip": true, "count": 0, "name": "Ann"}));
        assert!(evaluate_condition("vip", &c));
        assert!(!evaluate_condition("count", &c));
        assert!(evaluate_condition("!count", &c));
        assert!(!evaluate_condition("!name", &c));
        assert!(!evaluate_condition("missing", &c));
        assert!(evaluate_condition("!missing", &c));
        assert!(!evaluate_condition("0", &c));
        assert!(evaluate_condition("\"x\"", &c));
    }

    #[test]
    fn test_condition_comparisons() {
        let c = ctx(json!({"status": "paid", "amount": 120, "level": "3", "flag": null}));
        assert!(evaluate_condition("status === \"paid\"", &c));
        assert!(evaluate_condition("status !== 'refunded'", &c));
        assert!(evaluate_condition("amount >= 120", &c));
        assert!(evaluate_condition("amount > 100", &c));
        assert!(!evaluate_condition("amount < 100", &c));
        assert!(evaluate_condition("amount <= 120.0", &c));
        assert!(evaluate_condition("level == 3", &c));
        assert!(!evaluate_condition("level === 3", &c));
        assert!(evaluate_condition("flag == undefined", &c));
        assert!(!evaluate_condition("flag === undefined", &c));
        assert!(evaluate_condition("missing != status", &c));
    }

    #[test]
    fn test_negated_comparison() {
        let c = ctx(json!({"vip": false, "amount": 120}));
        assert!(evaluate_condition("!vip == true", &c));
        assert!(!evaluate_condition("!vip == false", &c));
        assert!(!evaluate_condition("!amount > 100", &c));
        assert!(evaluate_condition("!amount < 100", &c));
        assert!(evaluate_condition("!vip", &c));
    }

    #[test]
    fn test_operator_inside_quotes_is_ignored() {
        let c = ctx(json!({"note": "a>b"}));
        assert!(evaluate_condition("note == \"a>b\"", &c));
    }

    #[test]
    fn test_malformed_condition_is_false() {
        let c = ctx(json!({"a": 1}));
        assert!(!evaluate_condition("a ==", &c));
        assert!(!evaluate_condition("", &c));
        assert!(!evaluate_condition("!", &c));
    }

    #[test]
    fn test_split_unquoted_respects_quotes() {
        assert_eq!(split_unquoted("\"hi, there\", name", ','), vec!["\"hi, there\"", "name"]);
        assert_eq!(split_unquoted("time:\"HH:mm\"", ':'), vec!["time", "\"HH:mm\""]);
        assert_eq!(split_unquoted("", ','), vec![""]);
    }
}
