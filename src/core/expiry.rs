//! Expiry policy of a service: a fixed date or a rolling duration from "today".

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Which expiry input the editor currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryMode {
    /// The user picks an explicit date
    #[default]
    FixedDate,
    /// The user picks a duration preset counted from today
    Duration,
}

/// The fixed set of duration choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationPreset {
    /// 1 month
    OneMonth,
    /// 3 months
    ThreeMonths,
    /// 6 months
    SixMonths,
    /// 12 months
    OneYear,
    /// 24 months
    TwoYears,
    /// 36 months
    ThreeYears,
}

impl DurationPreset {
    /// Every preset, shortest first.
    pub const ALL: [Self; 6] = [
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
        Self::ThreeYears,
    ];

    /// Length of the preset in months.
    #[must_use]
    pub const fn months(self) -> u32 {
        match self {
            Self::OneMonth => 1,
            Self::ThreeMonths => 3,
            Self::SixMonths => 6,
            Self::OneYear => 12,
            Self::TwoYears => 24,
            Self::ThreeYears => 36,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OneMonth => "1 Month",
            Self::ThreeMonths => "3 Months",
            Self::SixMonths => "6 Months",
            Self::OneYear => "1 Year",
            Self::TwoYears => "2 Years",
            Self::ThreeYears => "3 Years",
        }
    }

    /// The preset lasting exactly `months`, if there is one.
    #[must_use]
    pub fn from_months(months: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.months() == months)
    }
}

/// Adds calendar months, clamping the day to the end of shorter months.
///
/// Returns `None` only when the result is outside chrono's representable range.
#[must_use]
pub fn add_months(from: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    from.checked_add_months(Months::new(months))
}

/// The resolved expiry of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpiryPolicy {
    /// An explicit date picked by the user
    FixedDate(DateTime<Utc>),
    /// A duration counted from the moment it was selected
    Duration {
        /// Length in months; the source of truth for `expiry`
        months: u32,
        /// When the duration was (last) applied
        selected_at: DateTime<Utc>,
        /// `selected_at + months`
        expiry: DateTime<Utc>,
    },
}

impl ExpiryPolicy {
    /// Builds a duration policy counted from `at`.
    #[must_use]
    pub fn duration_from(months: u32, at: DateTime<Utc>) -> Option<Self> {
        add_months(at, months).map(|expiry| Self::Duration {
            months,
            selected_at: at,
            expiry,
        })
    }

    /// The expiry date this policy resolves to.
    #[must_use]
    pub const fn expiry(&self) -> DateTime<Utc> {
        match self {
            Self::FixedDate(date) => *date,
            Self::Duration { expiry, .. } => *expiry,
        }
    }

    /// Duration length, `None` for a fixed date.
    #[must_use]
    pub const fn duration_months(&self) -> Option<u32> {
        match self {
            Self::FixedDate(_) => None,
            Self::Duration { months, .. } => Some(*months),
        }
    }

    /// Re-derives a duration policy's date from `now`; fixed dates are unchanged.
    #[must_use]
    pub fn refreshed(self, now: DateTime<Utc>) -> Option<Self> {
        match self {
            Self::FixedDate(_) => Some(self),
            Self::Duration { months, .. } => Self::duration_from(months, now),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_preset_months() {
        let months: Vec<u32> = DurationPreset::ALL.iter().map(|p| p.months()).collect();
        assert_eq!(months, vec![1, 3, 6, 12, 24, 36]);
        assert_eq!(DurationPreset::from_months(12), Some(DurationPreset::OneYear));
        assert_eq!(DurationPreset::from_months(5), None);
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        let jan31 = Utc.with_ymd_and_hms(2027, 1, 31, 8, 0, 0).unwrap();
        assert_eq!(
            add_months(jan31, 1),
            Some(Utc.with_ymd_and_hms(2027, 2, 28, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_duration_policy_resolves_and_refreshes() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let policy = ExpiryPolicy::duration_from(12, at).unwrap();
        assert_eq!(
            policy.expiry(),
            Utc.with_ymd_and_hms(2027, 10, 16, 12, 0, 0).unwrap()
        );
        assert_eq!(policy.duration_months(), Some(12));

        let later = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        let refreshed = policy.refreshed(later).unwrap();
        assert_eq!(
            refreshed.expiry(),
            Utc.with_ymd_and_hms(2027, 11, 1, 0, 0, 0).unwrap()
        );

        let fixed = ExpiryPolicy::FixedDate(at);
        assert_eq!(fixed.refreshed(later), Some(fixed));
        assert_eq!(fixed.duration_months(), None);
    }
}
