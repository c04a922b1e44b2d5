//! Category entity - Groups services for reporting.
//! Categories may nest one level through `parent_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// UUID of the category
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Parent category id for sub-categories
    pub parent_id: Option<String>,
    /// Free-text description
    pub description: String,
    /// Display color (hex)
    pub color: String,
    /// Icon name
    pub icon: String,
    /// When the category was created
    pub created_at: DateTimeUtc,
    /// When the category was last modified
    pub updated_at: DateTimeUtc,
}

/// `Category` has no modeled relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Category {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            parent_id: model.parent_id,
            color: model.color,
            description: model.description,
            icon: model.icon,
        }
    }
}
