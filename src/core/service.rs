//! Service persistence - Stores submitted services and reads them back as records.
//!
//! Submissions arrive as [`ServicePayload`]s from the editor. Before a row is
//! written the store fills in what the client may have left out: default
//! reminder thresholds, identities for thresholds and owners, and the
//! category name for a category id.

use crate::{
    core::{
        editor::{ServicePayload, ServiceSaver},
        ids::IdGenerator,
    },
    entities::{Category, Service, service},
    errors::{Error, Result},
    models::{
        Numeric, Owner, ReminderThreshold, ServiceRecord, UNCATEGORIZED, default_thresholds,
        non_blank,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use std::sync::Arc;
use tracing::{info, warn};

/// Category id the API uses to ask for services without a category.
pub const UNCATEGORIZED_FILTER: &str = "uncategorized";

/// Which services to list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServiceFilter {
    /// Every service
    #[default]
    All,
    /// Services in one category
    Category(String),
    /// Services without a category
    Uncategorized,
}

impl ServiceFilter {
    /// Interprets an optional `category_id` query value.
    #[must_use]
    pub fn from_query(category_id: Option<&str>) -> Self {
        match non_blank(category_id) {
            None => Self::All,
            Some(UNCATEGORIZED_FILTER) => Self::Uncategorized,
            Some(id) => Self::Category(id.to_string()),
        }
    }
}

/// Resolves the stored category name: the category table wins over the client's copy.
async fn resolve_category_name<C>(db: &C, payload: &ServicePayload) -> Result<String>
where
    C: ConnectionTrait,
{
    if let Some(id) = non_blank(payload.category_id.as_deref()) {
        if let Some(category) = Category::find_by_id(id).one(db).await? {
            return Ok(category.name);
        }
        warn!("Service '{}' references unknown category {id}", payload.name);
    }

    Ok(non_blank(Some(payload.category_name.as_str()))
        .unwrap_or(UNCATEGORIZED)
        .to_string())
}

fn prepare_thresholds(
    thresholds: &[ReminderThreshold],
    ids: &dyn IdGenerator,
) -> Vec<ReminderThreshold> {
    if thresholds.is_empty() {
        return default_thresholds(ids);
    }

    thresholds
        .iter()
        .cloned()
        .map(|mut threshold| {
            if threshold.id.is_empty() {
                threshold.id = ids.new_id();
            }
            threshold
        })
        .collect()
}

fn prepare_owners(owners: &[Owner], ids: &dyn IdGenerator) -> Vec<Owner> {
    owners
        .iter()
        .cloned()
        .map(|mut owner| {
            if owner.id.is_empty() {
                owner.id = ids.new_id();
            }
            owner
        })
        .collect()
}

fn duration_column(months: Option<u32>) -> Option<i32> {
    months.and_then(|m| i32::try_from(m).ok())
}

/// Stores a new service.
///
/// Empty reminder thresholds become the defaults, thresholds and owners
/// without an identity get one, and a known category id overrides the
/// category name sent by the client.
///
/// # Arguments
/// * `db` - Database connection
/// * `payload` - Normalized submission from the editor
/// * `ids` - Identity source for the row, thresholds and owners
///
/// # Returns
/// The inserted service row
pub async fn create_service(
    db: &DatabaseConnection,
    payload: &ServicePayload,
    ids: &dyn IdGenerator,
) -> Result<service::Model> {
    let now = Utc::now();
    let category_name = resolve_category_name(db, payload).await?;
    let thresholds = prepare_thresholds(&payload.reminder_thresholds, ids);
    let owners = prepare_owners(&payload.owners, ids);

    let model = service::ActiveModel {
        id: Set(ids.new_id()),
        name: Set(payload.name.clone()),
        provider: Set(payload.provider.clone()),
        category_id: Set(non_blank(payload.category_id.as_deref()).map(str::to_string)),
        category_name: Set(category_name),
        cost: Set(payload.cost),
        quantity: Set(payload.quantity),
        utilized_quantity: Set(payload.utilized_quantity),
        license_type: Set(payload.license_type.clone()),
        unit: Set(payload.unit.clone()),
        environment: Set(payload.environment.clone()),
        expiry_date: Set(payload.expiry_date),
        expiry_duration_months: Set(duration_column(payload.expiry_duration_months)),
        reminder_thresholds: Set(serde_json::to_value(&thresholds)?),
        owners: Set(serde_json::to_value(&owners)?),
        notes: Set(payload.notes.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let result = model.insert(db).await?;
    info!("Created service '{}' ({})", result.name, result.id);
    Ok(result)
}

/// Replaces the stored fields of an existing service.
///
/// Applies the same normalization as [`create_service`] and keeps `created_at`.
///
/// # Arguments
/// * `db` - Database connection
/// * `service_id` - Service to replace
/// * `payload` - Normalized submission from the editor
/// * `ids` - Identity source for new thresholds and owners
///
/// # Returns
/// The updated row, or `ServiceNotFound` when no such service exists
pub async fn update_service(
    db: &DatabaseConnection,
    service_id: &str,
    payload: &ServicePayload,
    ids: &dyn IdGenerator,
) -> Result<service::Model> {
    let existing = Service::find_by_id(service_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::ServiceNotFound {
            id: service_id.to_string(),
        })?;

    let category_name = resolve_category_name(db, payload).await?;
    let thresholds = prepare_thresholds(&payload.reminder_thresholds, ids);
    let owners = prepare_owners(&payload.owners, ids);

    let mut active_model: service::ActiveModel = existing.into();
    active_model.name = Set(payload.name.clone());
    active_model.provider = Set(payload.provider.clone());
    active_model.category_id = Set(non_blank(payload.category_id.as_deref()).map(str::to_string));
    active_model.category_name = Set(category_name);
    active_model.cost = Set(payload.cost);
    active_model.quantity = Set(payload.quantity);
    active_model.utilized_quantity = Set(payload.utilized_quantity);
    active_model.license_type = Set(payload.license_type.clone());
    active_model.unit = Set(payload.unit.clone());
    active_model.environment = Set(payload.environment.clone());
    active_model.expiry_date = Set(payload.expiry_date);
    active_model.expiry_duration_months = Set(duration_column(payload.expiry_duration_months));
    active_model.reminder_thresholds = Set(serde_json::to_value(&thresholds)?);
    active_model.owners = Set(serde_json::to_value(&owners)?);
    active_model.notes = Set(payload.notes.clone());
    active_model.updated_at = Set(Utc::now());

    let result = active_model.update(db).await?;
    info!("Updated service '{}' ({})", result.name, result.id);
    Ok(result)
}

/// Finds a service by id.
pub async fn get_service(db: &DatabaseConnection, service_id: &str) -> Result<Option<service::Model>> {
    Service::find_by_id(service_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists services matching `filter`, ordered by name.
pub async fn get_all_services(
    db: &DatabaseConnection,
    filter: &ServiceFilter,
) -> Result<Vec<service::Model>> {
    let query = match filter {
        ServiceFilter::All => Service::find(),
        ServiceFilter::Category(id) => {
            Service::find().filter(service::Column::CategoryId.eq(id.as_str()))
        }
        ServiceFilter::Uncategorized => Service::find().filter(
            Condition::any()
                .add(service::Column::CategoryId.is_null())
                .add(service::Column::CategoryId.eq("")),
        ),
    };

    query
        .order_by_asc(service::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes a service.
pub async fn delete_service(db: &DatabaseConnection, service_id: &str) -> Result<()> {
    let result = Service::delete_by_id(service_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::ServiceNotFound {
            id: service_id.to_string(),
        });
    }
    info!("Deleted service {service_id}");
    Ok(())
}

/// Converts a stored row into the record shape the aggregator and editor read.
///
/// Malformed threshold or owner JSON is logged and read as an empty list.
#[must_use]
pub fn to_record(model: service::Model) -> ServiceRecord {
    let reminder_thresholds: Vec<ReminderThreshold> = serde_json::from_value(model.reminder_thresholds)
        .inspect_err(|e| warn!("Bad thresholds JSON on service {}: {e}", model.id))
        .unwrap_or_default();
    let owners: Vec<Owner> = serde_json::from_value(model.owners)
        .inspect_err(|e| warn!("Bad owners JSON on service {}: {e}", model.id))
        .unwrap_or_default();

    ServiceRecord {
        id: Some(model.id),
        name: model.name,
        provider: model.provider,
        category_id: model.category_id,
        category_name: Some(model.category_name),
        cost: Some(Numeric::Float(model.cost)),
        quantity: Some(Numeric::Int(model.quantity)),
        utilized_quantity: Some(Numeric::Int(model.utilized_quantity)),
        license_type: Some(model.license_type),
        unit: Some(model.unit),
        environment: Some(model.environment),
        expiry_date: Some(model.expiry_date.to_rfc3339()),
        expiry_duration_months: model
            .expiry_duration_months
            .and_then(|m| u32::try_from(m).ok()),
        reminder_thresholds,
        owners,
        notes: Some(model.notes),
    }
}

/// Loads every matching service as a record.
pub async fn load_records(db: &DatabaseConnection, filter: &ServiceFilter) -> Result<Vec<ServiceRecord>> {
    Ok(get_all_services(db, filter)
        .await?
        .into_iter()
        .map(to_record)
        .collect())
}

/// [`ServiceSaver`] backed by the SQLite store.
#[derive(Clone)]
pub struct SeaOrmServiceStore {
    db: DatabaseConnection,
    ids: Arc<dyn IdGenerator>,
}

impl SeaOrmServiceStore {
    /// Creates a store over `db`, minting ids with `ids`.
    #[must_use]
    pub fn new(db: DatabaseConnection, ids: Arc<dyn IdGenerator>) -> Self {
        Self { db, ids }
    }
}

#[async_trait]
impl ServiceSaver for SeaOrmServiceStore {
    async fn save(&self, payload: &ServicePayload) -> Result<()> {
        match payload.id.as_deref() {
            Some(id) => update_service(&self.db, id, payload, self.ids.as_ref()).await?,
            None => create_service(&self.db, payload, self.ids.as_ref()).await?,
        };
        Ok(())
    }
}
