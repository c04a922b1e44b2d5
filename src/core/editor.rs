//! Service editor business logic - draft state, transitions and submission.
//!
//! The editor keeps an in-memory [`ServiceDraft`] for one service record. Every
//! user action is an [`EditorAction`] applied by the pure [`reduce`] function,
//! which never mutates its input and returns the next draft. The
//! [`ServiceEditor`] wrapper owns the current draft, the injected collaborators
//! (category list, identity generator) and the submit busy flag.

use crate::{
    core::{
        busy::BusyFlag,
        expiry::{DurationPreset, ExpiryMode, ExpiryPolicy},
        ids::IdGenerator,
    },
    errors::{Error, Result},
    models::{
        Category, Numeric, OWNER_ROLES, Owner, ReminderThreshold, ServiceRecord, UNCATEGORIZED,
        default_thresholds, non_blank, parse_float_lenient, parse_int_lenient,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Days assigned to a newly added threshold.
pub const NEW_THRESHOLD_DAYS: i64 = 14;

/// Category id the category picker sends for "no category".
pub const UNCATEGORIZED_SENTINEL: &str = "uncategorized";

/// Editor sections. Navigation between them is free and never validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    /// Name, provider, category, cost and licensing
    #[default]
    BasicInfo,
    /// Expiry policy and reminder thresholds
    ExpiryAndReminders,
    /// Owner contacts
    Owners,
}

/// Free-text fields set through [`EditorAction::SetField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    /// Service name
    Name,
    /// Provider
    Provider,
    /// Cost, kept as typed until submit
    Cost,
    /// Purchased quantity, kept as typed until submit
    Quantity,
    /// Utilized quantity, kept as typed until submit
    UtilizedQuantity,
    /// License type
    LicenseType,
    /// Quantity unit
    Unit,
    /// Deployment environment
    Environment,
    /// Notes
    Notes,
}

/// Owner fields set through [`EditorAction::SetOwnerField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerField {
    /// Contact name
    Name,
    /// Contact email
    Email,
    /// Role
    Role,
}

/// Value chosen in the category picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySelection {
    /// No category
    Uncategorized,
    /// A category by id
    Id(String),
}

impl From<&str> for CategorySelection {
    fn from(value: &str) -> Self {
        if value.is_empty() || value == UNCATEGORIZED_SENTINEL {
            Self::Uncategorized
        } else {
            Self::Id(value.to_string())
        }
    }
}

/// A named transition of the draft.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    /// Switch the visible section
    GoToSection(Section),
    /// Replace a free-text field
    SetField {
        /// Which field
        field: DraftField,
        /// New raw value
        value: String,
    },
    /// Pick a category (or none)
    SelectCategory(CategorySelection),
    /// Switch between fixed-date and duration input; keeps the current policy
    SetExpiryMode(ExpiryMode),
    /// Pick an explicit expiry date; drops any duration
    PickFixedDate(DateTime<Utc>),
    /// Pick a duration preset counted from `at`
    ChooseDuration {
        /// Selected preset
        preset: DurationPreset,
        /// Moment of selection
        at: DateTime<Utc>,
    },
    /// Re-derive a duration policy's date from a new "today"
    RefreshDuration {
        /// Current time
        now: DateTime<Utc>,
    },
    /// Append a threshold with default lead time
    AddThreshold,
    /// Remove a threshold unless it is the last one
    RemoveThreshold {
        /// Threshold identity
        id: String,
    },
    /// Set a threshold's lead time from raw input
    SetThresholdDays {
        /// Threshold identity
        id: String,
        /// Raw input; unreadable values become 0
        input: String,
    },
    /// Set a threshold's label
    SetThresholdLabel {
        /// Threshold identity
        id: String,
        /// New label
        label: String,
    },
    /// Append a blank owner
    AddOwner,
    /// Remove an owner
    RemoveOwner {
        /// Owner identity
        id: String,
    },
    /// Set one field of an owner
    SetOwnerField {
        /// Owner identity
        id: String,
        /// Which field
        field: OwnerField,
        /// New value
        value: String,
    },
}

/// In-memory state of one service being created or edited.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDraft {
    /// Identity of the record being edited, `None` when creating
    pub id: Option<String>,
    /// Visible section
    pub section: Section,
    /// Service name
    pub name: String,
    /// Provider
    pub provider: String,
    /// Selected category id
    pub category_id: Option<String>,
    /// Denormalized category name
    pub category_name: String,
    /// Cost as typed
    pub cost: String,
    /// Purchased quantity as typed
    pub quantity: String,
    /// Utilized quantity as typed
    pub utilized_quantity: String,
    /// License type
    pub license_type: String,
    /// Quantity unit
    pub unit: String,
    /// Deployment environment
    pub environment: String,
    /// Notes
    pub notes: String,
    /// Which expiry input is active
    pub expiry_mode: ExpiryMode,
    /// Resolved expiry, `None` until the user picks one
    pub expiry_policy: Option<ExpiryPolicy>,
    /// Reminder thresholds; never empty
    pub reminder_thresholds: Vec<ReminderThreshold>,
    /// Owner contacts, possibly incomplete
    pub owners: Vec<Owner>,
}

impl ServiceDraft {
    /// An empty draft for a new service, seeded with the default thresholds.
    pub fn new(ids: &dyn IdGenerator) -> Self {
        Self {
            id: None,
            section: Section::default(),
            name: String::new(),
            provider: String::new(),
            category_id: None,
            category_name: UNCATEGORIZED.to_string(),
            cost: String::new(),
            quantity: String::new(),
            utilized_quantity: String::new(),
            license_type: String::new(),
            unit: String::new(),
            environment: String::new(),
            notes: String::new(),
            expiry_mode: ExpiryMode::default(),
            expiry_policy: None,
            reminder_thresholds: default_thresholds(ids),
            owners: Vec::new(),
        }
    }

    /// A draft hydrated from an existing record.
    ///
    /// Thresholds and owners without an identity receive one, and a record
    /// without thresholds gets the defaults so the draft always has at least one.
    pub fn from_record(record: &ServiceRecord, ids: &dyn IdGenerator) -> Self {
        let expiry = record.expiry();
        let (expiry_mode, expiry_policy) = match (record.expiry_duration_months, expiry) {
            (Some(months), Some(expiry)) => {
                let selected_at = expiry.checked_sub_months(Months::new(months)).unwrap_or(expiry);
                (
                    ExpiryMode::Duration,
                    Some(ExpiryPolicy::Duration {
                        months,
                        selected_at,
                        expiry,
                    }),
                )
            }
            (Some(_), None) => (ExpiryMode::Duration, None),
            (None, expiry) => (ExpiryMode::FixedDate, expiry.map(ExpiryPolicy::FixedDate)),
        };

        let mut reminder_thresholds = record.reminder_thresholds.clone();
        for threshold in &mut reminder_thresholds {
            if threshold.id.is_empty() {
                threshold.id = ids.new_id();
            }
        }
        if reminder_thresholds.is_empty() {
            reminder_thresholds = default_thresholds(ids);
        }

        let mut owners = record.owners.clone();
        for owner in &mut owners {
            if owner.id.is_empty() {
                owner.id = ids.new_id();
            }
        }

        Self {
            id: record.id.clone(),
            section: Section::default(),
            name: record.name.clone(),
            provider: record.provider.clone(),
            category_id: non_blank(record.category_id.as_deref()).map(str::to_string),
            category_name: record.category_label().to_string(),
            cost: record.cost.as_ref().map(numeric_text).unwrap_or_default(),
            quantity: record.quantity.as_ref().map(numeric_text).unwrap_or_default(),
            utilized_quantity: record
                .utilized_quantity
                .as_ref()
                .map(numeric_text)
                .unwrap_or_default(),
            license_type: record.license_type.clone().unwrap_or_default(),
            unit: record.unit.clone().unwrap_or_default(),
            environment: record.environment.clone().unwrap_or_default(),
            notes: record.notes.clone().unwrap_or_default(),
            expiry_mode,
            expiry_policy,
            reminder_thresholds,
            owners,
        }
    }

    /// The resolved expiry date, if any.
    #[must_use]
    pub fn expiry_date(&self) -> Option<DateTime<Utc>> {
        self.expiry_policy.as_ref().map(ExpiryPolicy::expiry)
    }

    /// Names of required fields that are still empty.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.provider.trim().is_empty() {
            missing.push("provider");
        }
        if self.expiry_date().is_none() {
            missing.push("expiry_date");
        }
        missing
    }

    /// Whether the draft may be submitted.
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Validates the draft and normalizes it into a submission payload.
    ///
    /// Numbers are parsed leniently (unreadable → 0), incomplete owners are
    /// dropped and the duration is only carried while duration mode is active.
    pub fn to_payload(&self) -> Result<ServicePayload> {
        let missing = self.missing_fields();
        let Some(expiry_date) = self.expiry_date().filter(|_| missing.is_empty()) else {
            return Err(Error::Validation { missing });
        };

        let expiry_duration_months = match (self.expiry_mode, &self.expiry_policy) {
            (ExpiryMode::Duration, Some(policy)) => policy.duration_months(),
            _ => None,
        };

        Ok(ServicePayload {
            id: self.id.clone(),
            name: self.name.clone(),
            provider: self.provider.clone(),
            category_id: self.category_id.clone(),
            category_name: self.category_name.clone(),
            cost: parse_float_lenient(&self.cost),
            quantity: parse_int_lenient(&self.quantity),
            utilized_quantity: parse_int_lenient(&self.utilized_quantity),
            license_type: self.license_type.clone(),
            unit: self.unit.clone(),
            environment: self.environment.clone(),
            expiry_date,
            expiry_duration_months,
            reminder_thresholds: self.reminder_thresholds.clone(),
            owners: self
                .owners
                .iter()
                .filter(|owner| owner.is_complete())
                .cloned()
                .collect(),
            notes: self.notes.clone(),
        })
    }
}

fn numeric_text(value: &Numeric) -> String {
    match value {
        Numeric::Int(v) => v.to_string(),
        Numeric::Float(v) => v.to_string(),
        Numeric::Text(s) => s.clone(),
    }
}

/// Collaborators a transition may need.
pub struct EditorEnv<'a> {
    /// Categories available for selection
    pub categories: &'a [Category],
    /// Identity source for new thresholds and owners
    pub ids: &'a dyn IdGenerator,
}

/// Applies one action to a draft and returns the next draft.
#[must_use]
pub fn reduce(draft: &ServiceDraft, action: EditorAction, env: &EditorEnv<'_>) -> ServiceDraft {
    let mut next = draft.clone();

    match action {
        EditorAction::GoToSection(section) => next.section = section,
        EditorAction::SetField { field, value } => {
            let target = match field {
                DraftField::Name => &mut next.name,
                DraftField::Provider => &mut next.provider,
                DraftField::Cost => &mut next.cost,
                DraftField::Quantity => &mut next.quantity,
                DraftField::UtilizedQuantity => &mut next.utilized_quantity,
                DraftField::LicenseType => &mut next.license_type,
                DraftField::Unit => &mut next.unit,
                DraftField::Environment => &mut next.environment,
                DraftField::Notes => &mut next.notes,
            };
            *target = value;
        }
        EditorAction::SelectCategory(CategorySelection::Uncategorized) => {
            next.category_id = None;
            next.category_name = UNCATEGORIZED.to_string();
        }
        EditorAction::SelectCategory(CategorySelection::Id(id)) => {
            next.category_name = env
                .categories
                .iter()
                .find(|category| category.id == id)
                .map_or_else(
                    || {
                        warn!("Selected unknown category {id}, name falls back to Uncategorized");
                        UNCATEGORIZED.to_string()
                    },
                    |category| category.name.clone(),
                );
            next.category_id = Some(id);
        }
        EditorAction::SetExpiryMode(mode) => next.expiry_mode = mode,
        EditorAction::PickFixedDate(date) => {
            next.expiry_policy = Some(ExpiryPolicy::FixedDate(date));
        }
        EditorAction::ChooseDuration { preset, at } => {
            match ExpiryPolicy::duration_from(preset.months(), at) {
                Some(policy) => next.expiry_policy = Some(policy),
                None => warn!("Duration {} from {at} is out of range", preset.label()),
            }
        }
        EditorAction::RefreshDuration { now } => {
            if let Some(policy) = next.expiry_policy {
                next.expiry_policy = policy.refreshed(now).or(Some(policy));
            }
        }
        EditorAction::AddThreshold => {
            let label = format!("Reminder {}", next.reminder_thresholds.len() + 1);
            next.reminder_thresholds.push(ReminderThreshold::new(
                env.ids,
                NEW_THRESHOLD_DAYS,
                label,
            ));
        }
        EditorAction::RemoveThreshold { id } => {
            if next.reminder_thresholds.len() > 1 {
                next.reminder_thresholds.retain(|threshold| threshold.id != id);
            } else {
                debug!("Refusing to remove the last reminder threshold");
            }
        }
        EditorAction::SetThresholdDays { id, input } => {
            if let Some(threshold) = next.reminder_thresholds.iter_mut().find(|t| t.id == id) {
                threshold.days_before = parse_int_lenient(&input);
            }
        }
        EditorAction::SetThresholdLabel { id, label } => {
            if let Some(threshold) = next.reminder_thresholds.iter_mut().find(|t| t.id == id) {
                threshold.label = label;
            }
        }
        EditorAction::AddOwner => next.owners.push(Owner {
            id: env.ids.new_id(),
            name: String::new(),
            email: String::new(),
            role: OWNER_ROLES[0].to_string(),
        }),
        EditorAction::RemoveOwner { id } => next.owners.retain(|owner| owner.id != id),
        EditorAction::SetOwnerField { id, field, value } => {
            if let Some(owner) = next.owners.iter_mut().find(|owner| owner.id == id) {
                match field {
                    OwnerField::Name => owner.name = value,
                    OwnerField::Email => owner.email = value,
                    OwnerField::Role => owner.role = value,
                }
            }
        }
    }

    next
}

/// Normalized service data handed to the save collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePayload {
    /// Identity of an existing record, `None` to create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Service name
    pub name: String,
    /// Provider
    pub provider: String,
    /// Category identity
    pub category_id: Option<String>,
    /// Category display name
    pub category_name: String,
    /// Cost
    pub cost: f64,
    /// Purchased quantity
    pub quantity: i64,
    /// Utilized quantity
    pub utilized_quantity: i64,
    /// License type
    pub license_type: String,
    /// Quantity unit
    pub unit: String,
    /// Deployment environment
    pub environment: String,
    /// Resolved expiry
    pub expiry_date: DateTime<Utc>,
    /// Duration in months, only when duration mode was active
    pub expiry_duration_months: Option<u32>,
    /// Reminder thresholds
    pub reminder_thresholds: Vec<ReminderThreshold>,
    /// Complete owners only
    pub owners: Vec<Owner>,
    /// Notes
    pub notes: String,
}

/// Persists a submitted service. Supplied by the embedding application.
#[async_trait]
pub trait ServiceSaver: Send + Sync {
    /// Saves the payload; any error is reported back to the user as is.
    async fn save(&self, payload: &ServicePayload) -> Result<()>;
}

/// Editing session for one service.
pub struct ServiceEditor<'a> {
    draft: ServiceDraft,
    categories: &'a [Category],
    ids: &'a dyn IdGenerator,
    submitting: BusyFlag,
}

impl<'a> ServiceEditor<'a> {
    /// Opens an editor for a new service.
    pub fn create(categories: &'a [Category], ids: &'a dyn IdGenerator) -> Self {
        Self {
            draft: ServiceDraft::new(ids),
            categories,
            ids,
            submitting: BusyFlag::new(),
        }
    }

    /// Opens an editor on an existing service.
    pub fn edit(
        record: &ServiceRecord,
        categories: &'a [Category],
        ids: &'a dyn IdGenerator,
    ) -> Self {
        Self {
            draft: ServiceDraft::from_record(record, ids),
            categories,
            ids,
            submitting: BusyFlag::new(),
        }
    }

    /// Current draft.
    #[must_use]
    pub const fn draft(&self) -> &ServiceDraft {
        &self.draft
    }

    /// Whether a submission is in flight; the submit control is disabled meanwhile.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.is_busy()
    }

    /// Applies a user action.
    pub fn dispatch(&mut self, action: EditorAction) {
        debug!(?action, "Editor transition");
        let env = EditorEnv {
            categories: self.categories,
            ids: self.ids,
        };
        self.draft = reduce(&self.draft, action, &env);
    }

    /// Validates and hands the payload to `saver`.
    ///
    /// The busy flag is released whether the save succeeds or fails, so the
    /// user can retry.
    ///
    /// # Arguments
    /// * `saver` - Persists the normalized payload
    ///
    /// # Returns
    /// `Ok(())` once saved; [`Error::Validation`] without calling the saver
    /// when required fields are empty; [`Error::Busy`] when a submission is
    /// already in flight; otherwise the saver's own error
    pub async fn submit(&self, saver: &dyn ServiceSaver) -> Result<()> {
        let payload = self.draft.to_payload()?;

        let Some(_guard) = self.submitting.try_acquire() else {
            warn!("Ignoring submit for '{}': already saving", payload.name);
            return Err(Error::Busy { action: "Save" });
        };

        saver
            .save(&payload)
            .await
            .inspect(|()| info!("Saved service '{}'", payload.name))
            .inspect_err(|e| error!("Failed to save service '{}': {}", payload.name, e))
    }
}
