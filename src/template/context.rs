//! Render context: caller data merged with system time fields.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde_json::{Map, Value};

use super::locale::{format_pattern, Locale, Timezone};
use super::types::{RenderError, RenderOptions};

/// Immutable data view a template is evaluated against.
///
/// Loop bodies get a derived context from [`RenderContext::scoped`]; the
/// parent is never modified.
#[derive(Debug, Clone)]
pub struct RenderContext {
    data: Map<String, Value>,
    locale: Locale,
    timezone: Timezone,
    now: DateTime<Utc>,
}

impl RenderContext {
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn timezone(&self) -> &Timezone {
        &self.timezone
    }

    /// The render instant, fixed for the whole render
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The render instant in the render timezone
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        self.timezone.localize(self.now)
    }

    /// Resolve a dotted path such as `user.profile.age`.
    ///
    /// Returns `None` (undefined) as soon as any segment is missing. Numeric
    /// segments index into arrays.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }

        let mut segments = path.split('.');
        let mut current = self.data.get(segments.next()?.trim())?;
        for segment in segments {
            let segment = segment.trim();
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Child context for one loop iteration.
    ///
    /// Adds `this`, `index`, `first` and `last` on top of a copy of the
    /// current data.
    pub fn scoped(&self, item: &Value, index: usize, len: usize) -> RenderContext {
        let mut data = self.data.clone();
        data.insert("this".to_string(), item.clone());
        data.insert("index".to_string(), Value::from(index));
        data.insert("first".to_string(), Value::Bool(index == 0));
        data.insert("last".to_string(), Value::Bool(index + 1 == len));

        RenderContext {
            data,
            locale: self.locale,
            timezone: self.timezone.clone(),
            now: self.now,
        }
    }

    pub(crate) fn into_data(self) -> Map<String, Value> {
        self.data
    }
}

/// Builds a [`RenderContext`] from caller data and render options
pub struct ContextBuilder {
    data: Map<String, Value>,
    locale: String,
    timezone: String,
    now: Option<DateTime<Utc>>,
}

impl ContextBuilder {
    pub fn new(options: &RenderOptions) -> Self {
        Self {
            data: Map::new(),
            locale: options.locale.clone(),
            timezone: options.timezone.clone(),
            now: None,
        }
    }

    /// Caller data. `null` is treated as an empty object.
    pub fn data(mut self, data: &Value) -> Result<Self, RenderError> {
        self.data = match data {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(RenderError::InvalidData(format!(
                    "data must be an object, got {}",
                    type_name(other)
                )))
            }
        };
        Ok(self)
    }

    /// Pin the render instant instead of reading the clock
    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn build(self) -> Result<RenderContext, RenderError> {
        let locale: Locale = self.locale.parse()?;
        let timezone: Timezone = self.timezone.parse()?;
        let now = self.now.unwrap_or_else(Utc::now);

        let local = timezone.localize(now);
        let mut data = Map::new();
        data.insert(
            "currentDate".to_string(),
            Value::String(format_pattern(&local, "YYYY-MM-DD")),
        );
        data.insert(
            "currentTime".to_string(),
            Value::String(format_pattern(&local, "HH:mm:ss")),
        );
        data.insert("currentYear".to_string(), Value::from(local.year()));
        data.insert("currentMonth".to_string(), Value::from(local.month()));
        data.insert("currentDay".to_string(), Value::from(local.day()));
        data.insert("timestamp".to_string(), Value::from(now.timestamp_millis()));

        // Caller data wins over system fields
        data.extend(self.data);

        Ok(RenderContext {
            data,
            locale,
            timezone,
            now,
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn context(data: Value) -> RenderContext {
        ContextBuilder::new(&RenderOptions::default())
            .data(&data)
            .unwrap()
            .now(Utc.with_ymd_and_hms(2024, 3, 5, 16, 30, 0).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_nested_path() {
        let ctx = context(json!({"user": {"profile": {"age": 30}}}));
        assert_eq!(ctx.resolve("user.profile.age"), Some(&json!(30)));
        assert_eq!(ctx.resolve(" user.profile "), Some(&json!({"age": 30})));
    }

    #[test]
    fn test_resolve_missing_segments_are_undefined() {
        let ctx = context(json!({"user": {"name": "Ann"}}));
        assert!(ctx.resolve("user.profile.age").is_none());
        assert!(ctx.resolve("user.name.first").is_none());
        assert!(ctx.resolve("nobody").is_none());
        assert!(ctx.resolve("").is_none());
    }

    #[test]
    fn test_resolve_array_index() {
        let ctx = context(json!({"items": [{"name": "A"}, {"name": "B"}]}));
        assert_eq!(ctx.resolve("items.1.name"), Some(&json!("B")));
        assert!(ctx.resolve("items.5.name").is_none());
    }

    #[test]
    fn test_system_fields_use_timezone() {
        // 16:30 UTC is 00:30 the next day in Shanghai
        let ctx = context(json!({}));
        assert_eq!(ctx.resolve("currentDate"), Some(&json!("2024-03-06")));
        assert_eq!(ctx.resolve("currentTime"), Some(&json!("00:30:00")));
        assert_eq!(ctx.resolve("currentYear"), Some(&json!(2024)));
    }

    #[test]
    fn test_caller_data_overrides_system_fields() {
        let ctx = context(json!({"currentDate": "custom"}));
        assert_eq!(ctx.resolve("currentDate"), Some(&json!("custom")));
    }

    #[test]
    fn test_scoped_context_does_not_touch_parent() {
        let ctx = context(json!({"this": "outer", "name": "Ann"}));
        let child = ctx.scoped(&json!({"name": "A"}), 0, 2);

        assert_eq!(child.resolve("this.name"), Some(&json!("A")));
        assert_eq!(child.resolve("index"), Some(&json!(0)));
        assert_eq!(child.resolve("first"), Some(&json!(true)));
        assert_eq!(child.resolve("last"), Some(&json!(false)));
        assert_eq!(child.resolve("name"), Some(&json!("Ann")));

        assert_eq!(ctx.resolve("this"), Some(&json!("outer")));
        assert!(ctx.resolve("index").is_none());
    }

    #[test]
    fn test_builder_rejects_bad_options() {
        let options = RenderOptions::default().with_locale("xx-XX");
        assert!(matches!(
            ContextBuilder::new(&options).build(),
            Err(RenderError::UnsupportedLocale(_))
        ));

        let options = RenderOptions::default().with_timezone("Nowhere/City");
        assert!(matches!(
            ContextBuilder::new(&options).build(),
            Err(RenderError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn test_builder_rejects_non_object_data() {
        let result = ContextBuilder::new(&RenderOptions::default()).data(&json!([1, 2]));
        assert!(matches!(result, Err(RenderError::InvalidData(_))));

        let ctx = ContextBuilder::new(&RenderOptions::default())
            .data(&Value::Null)
            .unwrap()
            .build()
            .unwrap();
        assert!(ctx.resolve("timestamp").is_some());
    }
}
