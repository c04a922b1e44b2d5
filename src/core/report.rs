//! Report aggregation business logic.
//!
//! This module derives the chart-ready datasets of the reports view from a flat
//! list of service records. All functions are pure and framework-agnostic; the
//! caller passes "now" explicitly so results are reproducible.

use crate::models::{Numeric, ServiceRecord};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Maximum number of month groups in the upcoming-expiry view.
pub const MAX_EXPIRY_MONTHS: usize = 6;

/// Maximum number of entries in the utilization view.
pub const MAX_UTILIZATION_ENTRIES: usize = 10;

/// Services and spend for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBucket {
    /// Category name
    pub name: String,
    /// Number of services
    pub value: usize,
    /// Summed cost
    pub cost: f64,
}

/// Number of services deployed to one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentBucket {
    /// Environment name
    pub name: String,
    /// Number of services
    pub value: usize,
}

/// Services expiring within one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryBucket {
    /// Display label, abbreviated month and two-digit year (`Mar 27`)
    pub label: String,
    /// First day of the month
    pub month: NaiveDate,
    /// Soonest expiry that falls into this month
    pub earliest: DateTime<Utc>,
    /// Number of services
    pub value: usize,
}

/// Purchased versus utilized licenses for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtilizationEntry {
    /// Service name
    pub name: String,
    /// Purchased quantity
    pub purchased: i64,
    /// Utilized quantity
    pub utilized: i64,
}

/// Groups services by category name in first-seen order, counting them and summing cost.
///
/// Records without a category land in "Uncategorized"; missing or non-numeric
/// costs count as zero.
#[must_use]
pub fn by_category(services: &[ServiceRecord]) -> Vec<CategoryBucket> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<CategoryBucket> = Vec::new();

    for service in services {
        let name = service.category_label();
        let cost = service.cost_value();
        if let Some(&i) = index.get(name) {
            buckets[i].value += 1;
            buckets[i].cost += cost;
        } else {
            index.insert(name, buckets.len());
            buckets.push(CategoryBucket {
                name: name.to_string(),
                value: 1,
                cost,
            });
        }
    }

    buckets
}

/// Counts services per environment in first-seen order ("Unknown" when absent).
#[must_use]
pub fn by_environment(services: &[ServiceRecord]) -> Vec<EnvironmentBucket> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<EnvironmentBucket> = Vec::new();

    for service in services {
        let name = service.environment_label();
        if let Some(&i) = index.get(name) {
            buckets[i].value += 1;
        } else {
            index.insert(name, buckets.len());
            buckets.push(EnvironmentBucket {
                name: name.to_string(),
                value: 1,
            });
        }
    }

    buckets
}

/// Counts future expiries per calendar month, soonest first, at most six months.
///
/// Only months that contain at least one expiry produce a group, so the result
/// covers the soonest six *non-empty* months rather than a fixed window.
/// Records with a missing, unreadable or past expiry are skipped.
#[must_use]
pub fn upcoming_expiry(services: &[ServiceRecord], now: DateTime<Utc>) -> Vec<ExpiryBucket> {
    let mut months: BTreeMap<NaiveDate, (DateTime<Utc>, usize)> = BTreeMap::new();

    for expiry in services
        .iter()
        .filter_map(ServiceRecord::expiry)
        .filter(|expiry| *expiry > now)
    {
        let Some(month) = NaiveDate::from_ymd_opt(expiry.year(), expiry.month(), 1) else {
            continue;
        };
        let entry = months.entry(month).or_insert((expiry, 0));
        entry.0 = entry.0.min(expiry);
        entry.1 += 1;
    }

    months
        .into_iter()
        .take(MAX_EXPIRY_MONTHS)
        .map(|(month, (earliest, value))| ExpiryBucket {
            label: month.format("%b %y").to_string(),
            month,
            earliest,
            value,
        })
        .collect()
}

/// Top ten services by purchased quantity, largest first.
///
/// The sort is stable, so services with equal purchased quantity keep their
/// input order.
#[must_use]
pub fn utilization(services: &[ServiceRecord]) -> Vec<UtilizationEntry> {
    let mut entries: Vec<UtilizationEntry> = services
        .iter()
        .map(|service| UtilizationEntry {
            name: service.name.clone(),
            purchased: service.quantity.as_ref().map_or(0, Numeric::as_i64),
            utilized: service.utilized_quantity.as_ref().map_or(0, Numeric::as_i64),
        })
        .collect();

    entries.sort_by(|a, b| b.purchased.cmp(&a.purchased));
    entries.truncate(MAX_UTILIZATION_ENTRIES);
    entries
}

/// All four report views for one service collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Count and spend per category
    pub by_category: Vec<CategoryBucket>,
    /// Count per environment
    pub by_environment: Vec<EnvironmentBucket>,
    /// Upcoming expiries per month
    pub upcoming_expiry: Vec<ExpiryBucket>,
    /// License utilization, top ten
    pub utilization: Vec<UtilizationEntry>,
}

impl ReportSummary {
    /// Computes every view for `services` as of `now`.
    ///
    /// # Arguments
    /// * `services` - Records to aggregate
    /// * `now` - Reference time for the upcoming-expiry view
    ///
    /// # Returns
    /// Category, environment, expiry and utilization datasets
    #[must_use]
    pub fn build(services: &[ServiceRecord], now: DateTime<Utc>) -> Self {
        Self {
            by_category: by_category(services),
            by_environment: by_environment(services),
            upcoming_expiry: upcoming_expiry(services, now),
            utilization: utilization(services),
        }
    }

    /// Total spend across all categories.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.by_category.iter().map(|bucket| bucket.cost).sum()
    }
}

/// Memoizes a [`ReportSummary`] for the last collection it saw.
///
/// The cache key is the identity of the `Arc`, not its contents: passing the
/// same allocation again returns the cached summary, passing a new one
/// recomputes even if the records are equal.
#[derive(Debug, Default)]
pub struct ReportCache {
    entry: Option<(Arc<Vec<ServiceRecord>>, ReportSummary)>,
    computations: usize,
}

impl ReportCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the summary for `services`, recomputing only when the collection changed.
    pub fn summary(
        &mut self,
        services: &Arc<Vec<ServiceRecord>>,
        now: DateTime<Utc>,
    ) -> &ReportSummary {
        let fresh = matches!(&self.entry, Some((source, _)) if Arc::ptr_eq(source, services));
        if !fresh {
            debug!("Recomputing report summary for {} services", services.len());
            self.entry = None;
            self.computations += 1;
        }

        let (_, summary) = self
            .entry
            .get_or_insert_with(|| (Arc::clone(services), ReportSummary::build(services, now)));
        summary
    }

    /// How many times a summary has been computed.
    #[must_use]
    pub const fn computations(&self) -> usize {
        self.computations
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::{record, record_expiring, record_with_quantity};
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_by_category_example() {
        let mut cloud_a = record("a");
        cloud_a.category_name = Some("Cloud".to_string());
        cloud_a.cost = Some(Numeric::Text("10".to_string()));
        let mut cloud_b = record("b");
        cloud_b.category_name = Some("Cloud".to_string());
        cloud_b.cost = Some(Numeric::Text("5".to_string()));
        let mut other = record("c");
        other.category_name = None;
        other.cost = Some(Numeric::Text("2".to_string()));

        let buckets = by_category(&[cloud_a, cloud_b, other]);

        assert_eq!(
            buckets,
            vec![
                CategoryBucket {
                    name: "Cloud".to_string(),
                    value: 2,
                    cost: 15.0,
                },
                CategoryBucket {
                    name: "Uncategorized".to_string(),
                    value: 1,
                    cost: 2.0,
                },
            ]
        );
    }

    #[test]
    fn test_by_category_counts_sum_to_input_length() {
        let names = ["Cloud", "", "Security", "Cloud", "  ", "Dev", "Security"];
        let services: Vec<ServiceRecord> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut service = record(&format!("svc-{i}"));
                service.category_name = Some((*name).to_string());
                service
            })
            .collect();

        let buckets = by_category(&services);
        let total: usize = buckets.iter().map(|b| b.value).sum();
        assert_eq!(total, services.len());
        // first-seen order, blanks folded into the default bucket
        let order: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(order, vec!["Cloud", "Uncategorized", "Security", "Dev"]);
    }

    #[test]
    fn test_by_category_treats_bad_cost_as_zero() {
        let mut service = record("x");
        service.cost = Some(Numeric::Text("call vendor".to_string()));
        let buckets = by_category(&[service, record("y")]);
        assert_eq!(buckets[0].cost, 0.0);
        assert_eq!(buckets[0].value, 2);
    }

    #[test]
    fn test_by_environment_defaults_to_unknown() {
        let mut prod = record("a");
        prod.environment = Some("Production".to_string());
        let mut blank = record("b");
        blank.environment = Some(String::new());
        let missing = record("c");

        let buckets = by_environment(&[prod, blank, missing]);
        assert_eq!(
            buckets,
            vec![
                EnvironmentBucket {
                    name: "Production".to_string(),
                    value: 1,
                },
                EnvironmentBucket {
                    name: "Unknown".to_string(),
                    value: 2,
                },
            ]
        );
    }

    #[test]
    fn test_upcoming_expiry_skips_past_missing_and_unreadable() {
        let now = fixed_now();
        let mut unreadable = record("bad");
        unreadable.expiry_date = Some("next year".to_string());
        let services = vec![
            record_expiring("past", now - Duration::days(3)),
            record_expiring("exactly-now", now),
            record("missing"),
            unreadable,
            record_expiring("soon", now + Duration::days(5)),
        ];

        let buckets = upcoming_expiry(&services, now);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].label, "Oct 26");
        assert_eq!(buckets[0].value, 1);
        assert!(buckets[0].earliest > now);
    }

    #[test]
    fn test_upcoming_expiry_keeps_soonest_six_non_empty_months() {
        let now = fixed_now();
        // Nov 26, Jan 27 (Dec empty), Feb, Apr, May, Jul, Aug
        let dates = [
            (2027, 8, 1),
            (2026, 11, 20),
            (2027, 1, 10),
            (2027, 2, 14),
            (2027, 1, 31),
            (2027, 4, 2),
            (2027, 5, 5),
            (2027, 7, 9),
        ];
        let services: Vec<ServiceRecord> = dates
            .iter()
            .map(|&(y, m, d)| {
                record_expiring(
                    &format!("{y}-{m}-{d}"),
                    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap(),
                )
            })
            .collect();

        let buckets = upcoming_expiry(&services, now);
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Nov 26", "Jan 27", "Feb 27", "Apr 27", "May 27", "Jul 27"]
        );
        assert_eq!(buckets[1].value, 2);
        assert_eq!(
            buckets[1].earliest,
            Utc.with_ymd_and_hms(2027, 1, 10, 9, 0, 0).unwrap()
        );
        assert!(buckets.windows(2).all(|w| w[0].month < w[1].month));
        assert!(buckets.iter().all(|b| b.earliest > now));
    }

    #[test]
    fn test_utilization_top_ten_descending_and_stable() {
        let mut services: Vec<ServiceRecord> = (0..12)
            .map(|i| record_with_quantity(&format!("svc-{i}"), &i.to_string(), "1"))
            .collect();
        services.push(record_with_quantity("tie-a", "11", "4"));
        services.push(record_with_quantity("garbage", "lots", "some"));

        let entries = utilization(&services);
        assert_eq!(entries.len(), MAX_UTILIZATION_ENTRIES);
        assert!(entries.windows(2).all(|w| w[0].purchased >= w[1].purchased));
        // svc-11 precedes tie-a because it came first in the input
        assert_eq!(entries[0].name, "svc-11");
        assert_eq!(entries[1].name, "tie-a");
        assert_eq!(entries[1].utilized, 4);
        assert!(entries.iter().all(|e| e.name != "garbage"));
    }

    #[test]
    fn test_utilization_parses_non_numeric_as_zero() {
        let entries = utilization(&[record_with_quantity("x", "n/a", "2.9")]);
        assert_eq!(entries[0].purchased, 0);
        assert_eq!(entries[0].utilized, 2);
    }

    #[test]
    fn test_report_cache_recomputes_on_new_collection_only() {
        let now = fixed_now();
        let mut cache = ReportCache::new();
        let services = Arc::new(vec![record("a"), record("b")]);

        assert_eq!(cache.summary(&services, now).by_category[0].value, 2);
        let _ = cache.summary(&services, now);
        assert_eq!(cache.computations(), 1);

        let replaced = Arc::new(vec![record("a"), record("b")]);
        let _ = cache.summary(&replaced, now);
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn test_summary_total_cost() {
        let mut a = record("a");
        a.cost = Some(Numeric::Float(9.5));
        let mut b = record("b");
        b.cost = Some(Numeric::Int(3));
        b.category_name = Some("Other".to_string());
        let summary = ReportSummary::build(&[a, b], fixed_now());
        assert_eq!(summary.total_cost(), 12.5);
    }
}
