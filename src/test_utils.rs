//! Shared test utilities for the renewal hub.
//!
//! Builders for records and payloads with sensible defaults, an in-memory
//! database, and fake collaborators that record how they were called.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        editor::{ServicePayload, ServiceSaver},
        export::Notifier,
    },
    errors::{Error, Result},
    models::{Category, Numeric, ServiceRecord},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A record with only a name.
pub fn record(name: &str) -> ServiceRecord {
    ServiceRecord {
        name: name.to_string(),
        provider: "Test Provider".to_string(),
        ..ServiceRecord::default()
    }
}

/// A record expiring at `expiry`.
pub fn record_expiring(name: &str, expiry: DateTime<Utc>) -> ServiceRecord {
    ServiceRecord {
        expiry_date: Some(expiry.to_rfc3339()),
        ..record(name)
    }
}

/// A record with textual quantities, as a form would send them.
pub fn record_with_quantity(name: &str, quantity: &str, utilized: &str) -> ServiceRecord {
    ServiceRecord {
        quantity: Some(Numeric::Text(quantity.to_string())),
        utilized_quantity: Some(Numeric::Text(utilized.to_string())),
        ..record(name)
    }
}

/// Two top-level categories and one child.
pub fn sample_categories() -> Vec<Category> {
    let category = |id: &str, name: &str, parent_id: Option<&str>| Category {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: parent_id.map(str::to_string),
        color: "#06b6d4".to_string(),
        description: String::new(),
        icon: "folder".to_string(),
    };

    vec![
        category("cat-cloud", "Cloud", None),
        category("cat-security", "Security", None),
        category("cat-iam", "Identity", Some("cat-security")),
    ]
}

/// A valid payload expiring on 2027-06-30.
pub fn sample_payload(name: &str) -> ServicePayload {
    ServicePayload {
        id: None,
        name: name.to_string(),
        provider: "Test Provider".to_string(),
        category_id: None,
        category_name: "Uncategorized".to_string(),
        cost: 10.0,
        quantity: 5,
        utilized_quantity: 3,
        license_type: "subscription".to_string(),
        unit: "seats".to_string(),
        environment: "Production".to_string(),
        expiry_date: Utc.with_ymd_and_hms(2027, 6, 30, 0, 0, 0).unwrap(),
        expiry_duration_months: None,
        reminder_thresholds: Vec::new(),
        owners: Vec::new(),
        notes: String::new(),
    }
}

/// A path under the system temp dir that does not exist yet.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("renewal-hub-test-{}", uuid::Uuid::new_v4()))
}

/// Records saved payloads; can be told to fail the next call.
#[derive(Default)]
pub struct RecordingSaver {
    calls: AtomicUsize,
    fail_next: AtomicBool,
    saved: Mutex<Vec<ServicePayload>>,
}

impl RecordingSaver {
    /// A saver whose first call fails.
    pub fn failing_once() -> Self {
        let saver = Self::default();
        saver.fail_next.store(true, Ordering::SeqCst);
        saver
    }

    /// Number of save calls, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Payloads saved successfully.
    pub fn saved(&self) -> Vec<ServicePayload> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceSaver for RecordingSaver {
    async fn save(&self, payload: &ServicePayload) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Database(sea_orm::DbErr::Custom(
                "connection reset".to_string(),
            )));
        }
        self.saved.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Holds every save until [`GatedSaver::release`] is called.
#[derive(Default)]
pub struct GatedSaver {
    calls: AtomicUsize,
    gate: Notify,
}

impl GatedSaver {
    /// Lets the pending save finish.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Number of save calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceSaver for GatedSaver {
    async fn save(&self, _payload: &ServicePayload) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(())
    }
}

/// Counts notifications.
#[derive(Default)]
pub struct RecordingNotifier {
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl RecordingNotifier {
    /// Success notifications shown.
    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    /// Failure notifications shown.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, _message: &str) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn failure(&self, _message: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}
