//! Locale and timezone data used by date and currency output.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use serde_json::Value;

use super::types::RenderError;

/// Locales with built-in formatting data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locale {
    ZhCn,
    ZhTw,
    EnUs,
    EnGb,
    JaJp,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::ZhCn => "zh-CN",
            Locale::ZhTw => "zh-TW",
            Locale::EnUs => "en-US",
            Locale::EnGb => "en-GB",
            Locale::JaJp => "ja-JP",
        }
    }

    /// ISO 4217 code used when `currency` gets no argument
    pub fn default_currency(&self) -> &'static str {
        match self {
            Locale::ZhCn => "CNY",
            Locale::ZhTw => "TWD",
            Locale::EnUs => "USD",
            Locale::EnGb => "GBP",
            Locale::JaJp => "JPY",
        }
    }

    /// Short numeric date, as browsers print it for this locale
    pub fn format_date(&self, date: NaiveDate) -> String {
        let (y, m, d) = (date.year(), date.month(), date.day());
        match self {
            Locale::ZhCn | Locale::ZhTw | Locale::JaJp => format!("{}/{}/{}", y, m, d),
            Locale::EnUs => format!("{}/{}/{}", m, d, y),
            Locale::EnGb => format!("{:02}/{:02}/{}", d, m, y),
        }
    }

    pub(crate) fn is_chinese(&self) -> bool {
        matches!(self, Locale::ZhCn | Locale::ZhTw)
    }
}

impl FromStr for Locale {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().replace('_', "-").to_ascii_lowercase().as_str() {
            "zh-cn" | "zh" | "zh-hans" => Ok(Locale::ZhCn),
            "zh-tw" | "zh-hant" | "zh-hk" => Ok(Locale::ZhTw),
            "en-us" | "en" => Ok(Locale::EnUs),
            "en-gb" => Ok(Locale::EnGb),
            "ja-jp" | "ja" => Ok(Locale::JaJp),
            _ => Err(RenderError::UnsupportedLocale(s.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named zones without daylight saving, as seconds east of UTC
const NAMED_ZONES: &[(&str, i32)] = &[
    ("Asia/Shanghai", 8 * 3600),
    ("Asia/Chongqing", 8 * 3600),
    ("Asia/Hong_Kong", 8 * 3600),
    ("Asia/Taipei", 8 * 3600),
    ("Asia/Singapore", 8 * 3600),
    ("Asia/Tokyo", 9 * 3600),
    ("Asia/Seoul", 9 * 3600),
    ("Asia/Kolkata", 5 * 3600 + 1800),
    ("UTC", 0),
    ("Etc/UTC", 0),
    ("GMT", 0),
];

/// A resolved render timezone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timezone {
    name: String,
    offset: FixedOffset,
}

impl Timezone {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Convert an instant into wall-clock time in this zone
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Parse a date-like value, interpreting naive inputs in this zone.
    ///
    /// Numbers and numeric strings are epoch milliseconds.
    pub fn parse_datetime(&self, value: &Value) -> Option<DateTime<FixedOffset>> {
        match value {
            Value::Number(n) => n.as_f64().and_then(|ms| self.from_millis(ms as i64)),
            Value::String(s) => self.parse_str(s.trim()),
            _ => None,
        }
    }

    fn from_millis(&self, millis: i64) -> Option<DateTime<FixedOffset>> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(|dt| self.localize(dt))
    }

    fn parse_str(&self, s: &str) -> Option<DateTime<FixedOffset>> {
        if s.is_empty() {
            return None;
        }
        if let Ok(millis) = s.parse::<i64>() {
            return self.from_millis(millis);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&self.offset));
        }
        const DATETIME_FORMATS: &[&str] = &[
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M",
            "%Y/%m/%d %H:%M:%S",
            "%Y/%m/%d %H:%M",
        ];
        for format in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return self.offset.from_local_datetime(&naive).single();
            }
        }
        for format in ["%Y-%m-%d", "%Y/%m/%d"] {
            if let Ok(date) = NaiveDate::parse_from_str(s, format) {
                let naive = date.and_hms_opt(0, 0, 0)?;
                return self.offset.from_local_datetime(&naive).single();
            }
        }
        None
    }
}

impl FromStr for Timezone {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let seconds = NAMED_ZONES
            .iter()
            .find(|(zone, _)| zone.eq_ignore_ascii_case(name))
            .map(|(_, secs)| *secs)
            .or_else(|| parse_offset(name));

        seconds
            .and_then(FixedOffset::east_opt)
            .map(|offset| Timezone {
                name: name.to_string(),
                offset,
            })
            .ok_or_else(|| RenderError::UnknownTimezone(s.to_string()))
    }
}

/// Parse `+08:00`, `-0500` or `+8` into seconds east of UTC
fn parse_offset(s: &str) -> Option<i32> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = if digits.len() <= 2 {
        (digits.parse::<i32>().ok()?, 0)
    } else {
        let split = digits.len() - 2;
        (digits[..split].parse::<i32>().ok()?, digits[split..].parse::<i32>().ok()?)
    };
    if hours > 14 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

/// Replace date/time tokens in `pattern`.
///
/// Tokens: `YYYY MM DD HH mm ss` (zero padded) and `M D H m s` (unpadded).
/// Longer tokens win at each position.
pub fn format_pattern(dt: &DateTime<FixedOffset>, pattern: &str) -> String {
    const TOKENS: &[&str] = &["YYYY", "MM", "DD", "HH", "mm", "ss", "M", "D", "H", "m", "s"];

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for token in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                match *token {
                    "YYYY" => out.push_str(&format!("{:04}", dt.year())),
                    "MM" => out.push_str(&format!("{:02}", dt.month())),
                    "DD" => out.push_str(&format!("{:02}", dt.day())),
                    "HH" => out.push_str(&format!("{:02}", dt.hour())),
                    "mm" => out.push_str(&format!("{:02}", dt.minute())),
                    "ss" => out.push_str(&format!("{:02}", dt.second())),
                    "M" => out.push_str(&dt.month().to_string()),
                    "D" => out.push_str(&dt.day().to_string()),
                    "H" => out.push_str(&dt.hour().to_string()),
                    "m" => out.push_str(&dt.minute().to_string()),
                    _ => out.push_str(&dt.second().to_string()),
                }
                rest = tail;
                continue 'outer;
            }
        }
        let ch = rest.chars().next().unwrap_or_default();
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Currency symbol and minor-unit digits
fn currency_info(code: &str) -> Option<(&'static str, usize)> {
    match code {
        "CNY" | "RMB" => Some(("¥", 2)),
        "JPY" => Some(("¥", 0)),
        "USD" => Some(("$", 2)),
        "HKD" => Some(("HK$", 2)),
        "TWD" => Some(("NT$", 2)),
        "EUR" => Some(("€", 2)),
        "GBP" => Some(("£", 2)),
        "KRW" => Some(("₩", 0)),
        _ => None,
    }
}

/// Format an amount in `code` (falls back to the locale's currency)
pub fn format_currency(amount: f64, code: Option<&str>, locale: Locale) -> String {
    let code = code
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| locale.default_currency().to_string());

    let sign = if amount < 0.0 { "-" } else { "" };
    match currency_info(&code) {
        Some((symbol, digits)) => {
            format!("{}{}{}", sign, symbol, group_thousands(amount.abs(), digits))
        }
        None => format!("{}{} {}", sign, code, group_thousands(amount.abs(), 2)),
    }
}

/// Fixed-point formatting with `,` thousands separators
pub fn group_thousands(amount: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, amount);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}.{}", grouped, frac),
        None => grouped,
    }
}
