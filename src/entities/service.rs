//! Service entity - A tracked license or subscription.
//!
//! Reminder thresholds and owners live inside the row as JSON arrays; they have
//! no lifecycle outside their service.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Service database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "services")]
pub struct Model {
    /// UUID of the service
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Service name (e.g., "Jira Cloud")
    pub name: String,
    /// Vendor (e.g., "Atlassian")
    pub provider: String,
    /// Category id, None when uncategorized
    pub category_id: Option<String>,
    /// Denormalized category name
    pub category_name: String,
    /// Cost in the organization's currency
    pub cost: f64,
    /// Purchased license count
    pub quantity: i64,
    /// Licenses in use
    pub utilized_quantity: i64,
    /// License model
    pub license_type: String,
    /// Unit the quantity is counted in
    pub unit: String,
    /// Deployment environment
    pub environment: String,
    /// When the service expires
    pub expiry_date: DateTimeUtc,
    /// Rolling duration that produced `expiry_date`, if any
    pub expiry_duration_months: Option<i32>,
    /// `[{id, days_before, label}]`
    pub reminder_thresholds: Json,
    /// `[{id, name, email, role}]`
    pub owners: Json,
    /// Free-text notes
    pub notes: String,
    /// When the row was created
    pub created_at: DateTimeUtc,
    /// When the row was last modified
    pub updated_at: DateTimeUtc,
}

/// Services reference categories by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
