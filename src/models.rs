//! Domain records shared by the aggregator, the editor and the store.
//!
//! Records arrive from an external API, so numeric and date fields are read
//! leniently: a cost may be `12.5` or `"12.5"`, an expiry may be a full RFC 3339
//! timestamp or a bare date. Anything unreadable degrades to zero or "no date"
//! instead of failing the whole record.

use crate::core::ids::IdGenerator;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category name used when a record has none.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Environment name used when a record has none.
pub const UNKNOWN_ENVIRONMENT: &str = "Unknown";

/// Suggested owner roles; the first entry is the default for new owners.
pub const OWNER_ROLES: &[&str] = &[
    "App Owner",
    "Technical Owner",
    "Business Owner",
    "Finance Contact",
    "Vendor Contact",
];

/// Default display color for categories.
pub const DEFAULT_CATEGORY_COLOR: &str = "#06b6d4";

/// A number that may have been sent as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    /// Integral JSON number
    Int(i64),
    /// Fractional JSON number
    Float(f64),
    /// Text that may or may not hold a number
    Text(String),
}

impl Numeric {
    /// Reads the value as a float; unreadable or non-finite values become 0.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => *v as f64,
            Self::Float(v) if v.is_finite() => *v,
            Self::Float(_) => 0.0,
            Self::Text(s) => parse_float_lenient(s),
        }
    }

    /// Reads the value as an integer, truncating fractions; unreadable values become 0.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Int(v) => *v,
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(v) if v.is_finite() => v.trunc() as i64,
            Self::Float(_) => 0,
            Self::Text(s) => parse_int_lenient(s),
        }
    }
}

/// Parses the longest leading decimal number of `input` (`"10abc"` → 10.0,
/// `"2.5E2"` → 250.0).
///
/// Returns 0.0 when there is no leading number or the result is not finite.
#[must_use]
pub fn parse_float_lenient(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut seen_digit = false;
    let mut seen_dot = false;

    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return 0.0;
    }

    // Exponent only counts when at least one digit follows it.
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits = bytes[exp_end..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            end = exp_end + digits;
        }
    }

    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parses the leading signed digits of `input` (`"3.7"` → 3, `"x"` → 0).
#[must_use]
pub fn parse_int_lenient(input: &str) -> i64 {
    let s = input.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let end = s[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + sign_len);

    s[..end].parse::<i64>().unwrap_or(0)
}

/// Reads a timestamp in any of the shapes the API has been seen to emit.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC) and a
/// bare `YYYY-MM-DD` (midnight UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Returns the trimmed text when it has any content.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// A configured lead time before expiry at which a reminder is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderThreshold {
    /// Stable identity within the parent record
    #[serde(default)]
    pub id: String,
    /// Days before expiry (1-365 in the UI; lenient parsing may yield 0)
    pub days_before: i64,
    /// Free-text label
    #[serde(default)]
    pub label: String,
}

impl ReminderThreshold {
    /// Creates a threshold with a fresh identity.
    pub fn new(ids: &dyn IdGenerator, days_before: i64, label: impl Into<String>) -> Self {
        Self {
            id: ids.new_id(),
            days_before,
            label: label.into(),
        }
    }
}

/// Thresholds every new record starts with: 30, 7 and 1 days.
pub fn default_thresholds(ids: &dyn IdGenerator) -> Vec<ReminderThreshold> {
    vec![
        ReminderThreshold::new(ids, 30, "First reminder"),
        ReminderThreshold::new(ids, 7, "Second reminder"),
        ReminderThreshold::new(ids, 1, "Final reminder"),
    ]
}

/// A stakeholder contact for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Stable identity within the parent record
    #[serde(default)]
    pub id: String,
    /// Contact name
    #[serde(default)]
    pub name: String,
    /// Contact email
    #[serde(default)]
    pub email: String,
    /// Free-text role, usually one of [`OWNER_ROLES`]
    #[serde(default = "default_owner_role")]
    pub role: String,
}

impl Owner {
    /// Whether the owner carries both a name and an email and may be persisted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

fn default_owner_role() -> String {
    OWNER_ROLES[0].to_string()
}

/// A service category; categories may nest one level via `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category identity
    pub id: String,
    /// Display name
    pub name: String,
    /// Parent category for two-level hierarchies
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Display color
    #[serde(default = "default_category_color")]
    pub color: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Icon name
    #[serde(default = "default_category_icon")]
    pub icon: String,
}

fn default_category_color() -> String {
    DEFAULT_CATEGORY_COLOR.to_string()
}

fn default_category_icon() -> String {
    "folder".to_string()
}

/// A tracked software license or subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRecord {
    /// Record identity, absent for records not yet stored
    pub id: Option<String>,
    /// Service name
    pub name: String,
    /// Vendor / provider
    pub provider: String,
    /// Category identity
    pub category_id: Option<String>,
    /// Denormalized category name
    pub category_name: Option<String>,
    /// Cost, possibly sent as text
    pub cost: Option<Numeric>,
    /// Purchased license count
    pub quantity: Option<Numeric>,
    /// Licenses in use
    pub utilized_quantity: Option<Numeric>,
    /// License model (per seat, site, ...)
    pub license_type: Option<String>,
    /// Unit the quantity is counted in
    pub unit: Option<String>,
    /// Deployment environment (free text)
    pub environment: Option<String>,
    /// Expiry timestamp as sent by the API
    pub expiry_date: Option<String>,
    /// Rolling duration that produced the expiry date, if any
    pub expiry_duration_months: Option<u32>,
    /// Reminder thresholds
    pub reminder_thresholds: Vec<ReminderThreshold>,
    /// Stakeholder contacts
    pub owners: Vec<Owner>,
    /// Free-text notes
    pub notes: Option<String>,
}

impl ServiceRecord {
    /// Parsed expiry, `None` when missing or unreadable.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry_date.as_deref().and_then(parse_timestamp)
    }

    /// Cost as a float, 0 when missing or non-numeric.
    #[must_use]
    pub fn cost_value(&self) -> f64 {
        self.cost.as_ref().map_or(0.0, Numeric::as_f64)
    }

    /// Category name, falling back to [`UNCATEGORIZED`].
    #[must_use]
    pub fn category_label(&self) -> &str {
        non_blank(self.category_name.as_deref()).unwrap_or(UNCATEGORIZED)
    }

    /// Environment, falling back to [`UNKNOWN_ENVIRONMENT`].
    #[must_use]
    pub fn environment_label(&self) -> &str {
        non_blank(self.environment.as_deref()).unwrap_or(UNKNOWN_ENVIRONMENT)
    }
}
