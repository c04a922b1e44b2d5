//! Expiry status, dashboard statistics and due reminders.
//!
//! Everything here is computed from service records and an explicit "now";
//! sending the reminders is left to whoever consumes [`due_reminders`].

use crate::models::{Owner, ServiceRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Days used by the dashboard to call a service "expiring soon".
pub const DEFAULT_EXPIRING_SOON_DAYS: i64 = 30;

/// Days left until `expiry`, rounded up (an expiry later today counts as 1).
#[must_use]
pub fn days_left(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (expiry - now).num_milliseconds();
    let days = millis / MILLIS_PER_DAY;
    if millis % MILLIS_PER_DAY > 0 { days + 1 } else { days }
}

/// Whole days until `expiry`, rounded down (an expiry 36 hours away counts as 1).
#[must_use]
pub fn whole_days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiry - now).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

/// Urgency bucket of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpiryStatus {
    /// Already expired
    Expired,
    /// A week or less left
    Critical,
    /// A month or less left
    Warning,
    /// More than a month left
    Safe,
    /// No readable expiry
    Unknown,
}

impl ExpiryStatus {
    /// Classifies a [`days_left`] value.
    #[must_use]
    pub const fn classify(days_left: i64) -> Self {
        match days_left {
            i64::MIN..=-1 => Self::Expired,
            0..=7 => Self::Critical,
            8..=30 => Self::Warning,
            _ => Self::Safe,
        }
    }

    /// Status of `service` as of `now`.
    #[must_use]
    pub fn of(service: &ServiceRecord, now: DateTime<Utc>) -> Self {
        service
            .expiry()
            .map_or(Self::Unknown, |expiry| Self::classify(days_left(expiry, now)))
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Expired => "Expired",
            Self::Critical => "Critical",
            Self::Warning => "Warning",
            Self::Safe => "Safe",
            Self::Unknown => "Unknown",
        }
    }
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    /// All services
    pub total: usize,
    /// Expiring within the configured window
    pub expiring_soon: usize,
    /// Already expired
    pub expired: usize,
    /// Beyond the window, or without an expiry at all
    pub safe: usize,
    /// Summed cost
    pub total_cost: f64,
}

impl DashboardStats {
    /// Tallies `services` as of `now`.
    ///
    /// Services without an expiry count as safe; services whose expiry cannot
    /// be read only count towards `total` and `total_cost`.
    ///
    /// # Arguments
    /// * `services` - Records to tally
    /// * `now` - Reference time
    /// * `expiring_soon_days` - Upper bound, in whole days, of "expiring soon"
    #[must_use]
    pub fn compute(services: &[ServiceRecord], now: DateTime<Utc>, expiring_soon_days: i64) -> Self {
        let mut stats = Self {
            total: services.len(),
            expiring_soon: 0,
            expired: 0,
            safe: 0,
            total_cost: 0.0,
        };

        for service in services {
            stats.total_cost += service.cost_value();

            if service.expiry_date.as_deref().is_none_or(|raw| raw.trim().is_empty()) {
                stats.safe += 1;
                continue;
            }
            let Some(expiry) = service.expiry() else {
                debug!("Unreadable expiry for service '{}'", service.name);
                continue;
            };

            match whole_days_until(expiry, now) {
                days if days < 0 => stats.expired += 1,
                days if days <= expiring_soon_days => stats.expiring_soon += 1,
                _ => stats.safe += 1,
            }
        }

        stats
    }
}

/// A reminder whose lead time is reached today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueReminder {
    /// Service identity
    pub service_id: Option<String>,
    /// Service name
    pub service_name: String,
    /// Label of the threshold that fired
    pub threshold_label: String,
    /// Days left until expiry
    pub days_until_expiry: i64,
    /// Service expiry
    pub expiry_date: DateTime<Utc>,
    /// Owners with an email address
    pub recipients: Vec<Owner>,
}

/// Reminders that fire at `now`.
///
/// A threshold fires when the whole days until expiry equal its
/// `days_before`. Services without thresholds use `default_days`. Services
/// without any owner email produce nothing.
#[must_use]
pub fn due_reminders(
    services: &[ServiceRecord],
    now: DateTime<Utc>,
    default_days: &[i64],
) -> Vec<DueReminder> {
    let mut due = Vec::new();

    for service in services {
        let Some(expiry) = service.expiry() else {
            continue;
        };
        let days = whole_days_until(expiry, now);

        let fired: Vec<String> = if service.reminder_thresholds.is_empty() {
            default_days
                .iter()
                .filter(|&&d| d == days)
                .map(|d| format!("{d} days before expiry"))
                .collect()
        } else {
            service
                .reminder_thresholds
                .iter()
                .filter(|t| t.days_before == days)
                .map(|t| t.label.clone())
                .collect()
        };
        if fired.is_empty() {
            continue;
        }

        let recipients: Vec<Owner> = service
            .owners
            .iter()
            .filter(|owner| !owner.email.trim().is_empty())
            .cloned()
            .collect();
        if recipients.is_empty() {
            debug!("Service '{}' has a due reminder but no owner email", service.name);
            continue;
        }

        due.extend(fired.into_iter().map(|threshold_label| DueReminder {
            service_id: service.id.clone(),
            service_name: service.name.clone(),
            threshold_label,
            days_until_expiry: days,
            expiry_date: expiry,
            recipients: recipients.clone(),
        }));
    }

    due
}
