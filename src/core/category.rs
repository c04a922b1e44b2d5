//! Category business logic - creating, editing, deleting and listing service categories.
//!
//! Category names are unique regardless of case. Services keep a denormalized
//! copy of their category's name, so renames and deletes rewrite the affected
//! service rows in the same database transaction.

use crate::{
    core::{ids::IdGenerator, service::UNCATEGORIZED_FILTER},
    entities::{Category, Service, category, service},
    errors::{Error, Result},
    models::{self, DEFAULT_CATEGORY_COLOR, UNCATEGORIZED},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    QueryOrder, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Func},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Color of the synthetic "Uncategorized" group.
pub const UNCATEGORIZED_GROUP_COLOR: &str = "#71717a";

/// Icon of the synthetic "Uncategorized" group.
pub const UNCATEGORIZED_GROUP_ICON: &str = "inbox";

/// Fields to change on a category; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CategoryUpdate {
    /// New display name
    pub name: Option<String>,
    /// New parent category
    pub parent_id: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New color
    pub color: Option<String>,
    /// New icon
    pub icon: Option<String>,
}

/// A category with the number of services filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    /// The category
    #[serde(flatten)]
    pub category: models::Category,
    /// Services whose `category_id` is this category
    pub service_count: usize,
}

/// The fields of a service shown inside a category group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBrief {
    /// Service identity
    pub id: String,
    /// Service name
    pub name: String,
    /// When the service expires
    pub expiry_date: DateTime<Utc>,
}

/// A category together with its services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    /// The category, or the synthetic uncategorized group
    #[serde(flatten)]
    pub category: models::Category,
    /// Services in this category, ordered by name
    pub services: Vec<ServiceBrief>,
    /// Number of services
    pub service_count: usize,
}

fn validated_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation {
            missing: vec!["name"],
        });
    }
    Ok(name)
}

/// Finds a category whose name matches `name` ignoring case.
async fn find_by_name<C>(db: &C, name: &str) -> Result<Option<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find()
        .filter(Expr::expr(Func::lower(Expr::col(category::Column::Name))).eq(name.to_lowercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a category with default color and icon.
///
/// # Arguments
/// * `db` - Database connection
/// * `name` - Display name; trimmed, must be non-blank and unused (ignoring case)
/// * `parent_id` - Optional parent category
/// * `ids` - Identity source for the new row
///
/// # Returns
/// The inserted category, or `DuplicateCategory` when the name is taken
pub async fn create_category(
    db: &DatabaseConnection,
    name: &str,
    parent_id: Option<String>,
    ids: &dyn IdGenerator,
) -> Result<category::Model> {
    let name = validated_name(name)?;
    if find_by_name(db, name).await?.is_some() {
        return Err(Error::DuplicateCategory {
            name: name.to_string(),
        });
    }

    let now = Utc::now();
    let model = category::ActiveModel {
        id: Set(ids.new_id()),
        name: Set(name.to_string()),
        parent_id: Set(parent_id),
        description: Set(String::new()),
        color: Set(DEFAULT_CATEGORY_COLOR.to_string()),
        icon: Set("folder".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let result = model.insert(db).await?;
    info!("Created category '{}'", result.name);
    Ok(result)
}

/// Applies `update` to a category.
///
/// A rename is checked for clashes with other categories and copied onto the
/// `category_name` of every service in the category, atomically.
///
/// # Arguments
/// * `db` - Database connection
/// * `category_id` - Category to change
/// * `update` - Fields to change
///
/// # Returns
/// The updated category
pub async fn update_category(
    db: &DatabaseConnection,
    category_id: &str,
    update: &CategoryUpdate,
) -> Result<category::Model> {
    let txn = db.begin().await?;

    let existing = Category::find_by_id(category_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::CategoryNotFound {
            id: category_id.to_string(),
        })?;

    let mut active_model: category::ActiveModel = existing.clone().into();

    if let Some(name) = update.name.as_deref() {
        let name = validated_name(name)?;
        if let Some(other) = find_by_name(&txn, name).await? {
            if other.id != existing.id {
                return Err(Error::DuplicateCategory {
                    name: name.to_string(),
                });
            }
        }

        if name != existing.name {
            let renamed = Service::update_many()
                .col_expr(service::Column::CategoryName, Expr::value(name))
                .filter(service::Column::CategoryId.eq(category_id))
                .exec(&txn)
                .await?;
            debug!("Renamed category on {} services", renamed.rows_affected);
        }
        active_model.name = Set(name.to_string());
    }
    if let Some(parent_id) = update.parent_id.clone() {
        active_model.parent_id = Set(Some(parent_id));
    }
    if let Some(description) = update.description.clone() {
        active_model.description = Set(description);
    }
    if let Some(color) = update.color.clone() {
        active_model.color = Set(color);
    }
    if let Some(icon) = update.icon.clone() {
        active_model.icon = Set(icon);
    }
    active_model.updated_at = Set(Utc::now());

    let result = active_model.update(&txn).await?;
    txn.commit().await?;

    info!("Updated category '{}' ({})", result.name, result.id);
    Ok(result)
}

/// Deletes a category and moves its services to "Uncategorized".
///
/// Sub-categories lose their parent link. Everything happens in one
/// transaction, so a failure leaves services and categories untouched.
///
/// # Arguments
/// * `db` - Database connection
/// * `category_id` - Category to delete
///
/// # Returns
/// How many services were reassigned
pub async fn delete_category(db: &DatabaseConnection, category_id: &str) -> Result<u64> {
    let txn = db.begin().await?;

    Category::find_by_id(category_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::CategoryNotFound {
            id: category_id.to_string(),
        })?;

    let reassigned = Service::update_many()
        .col_expr(service::Column::CategoryId, Expr::value(Option::<String>::None))
        .col_expr(service::Column::CategoryName, Expr::value(UNCATEGORIZED))
        .col_expr(service::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(service::Column::CategoryId.eq(category_id))
        .exec(&txn)
        .await?
        .rows_affected;

    Category::update_many()
        .col_expr(category::Column::ParentId, Expr::value(Option::<String>::None))
        .filter(category::Column::ParentId.eq(category_id))
        .exec(&txn)
        .await?;

    Category::delete_by_id(category_id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted category {category_id}, {reassigned} services now uncategorized");
    Ok(reassigned)
}

/// Lists all categories alphabetically, in the shape the editor consumes.
pub async fn get_all_categories(db: &DatabaseConnection) -> Result<Vec<models::Category>> {
    Ok(Category::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Lists all categories alphabetically with their service counts.
pub async fn get_categories_with_counts(db: &DatabaseConnection) -> Result<Vec<CategorySummary>> {
    let services = Service::find().all(db).await?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for service in &services {
        if let Some(id) = service.category_id.as_deref() {
            *counts.entry(id).or_default() += 1;
        }
    }

    Ok(get_all_categories(db)
        .await?
        .into_iter()
        .map(|category| CategorySummary {
            service_count: counts.get(category.id.as_str()).copied().unwrap_or(0),
            category,
        })
        .collect())
}

/// Groups services under their categories.
///
/// Categories come alphabetically, each with its services ordered by name.
/// Services without a category are gathered in a trailing "Uncategorized"
/// group, which is only present when it has members.
pub async fn get_categories_with_services(db: &DatabaseConnection) -> Result<Vec<CategoryGroup>> {
    let services = Service::find()
        .order_by_asc(service::Column::Name)
        .all(db)
        .await?;

    let mut by_category: HashMap<String, Vec<ServiceBrief>> = HashMap::new();
    let mut uncategorized = Vec::new();
    for service in services {
        let brief = ServiceBrief {
            id: service.id,
            name: service.name,
            expiry_date: service.expiry_date,
        };
        match service.category_id.filter(|id| !id.is_empty()) {
            Some(id) => by_category.entry(id).or_default().push(brief),
            None => uncategorized.push(brief),
        }
    }

    let mut groups: Vec<CategoryGroup> = get_all_categories(db)
        .await?
        .into_iter()
        .map(|category| {
            let services = by_category.remove(&category.id).unwrap_or_default();
            CategoryGroup {
                service_count: services.len(),
                services,
                category,
            }
        })
        .collect();

    if !uncategorized.is_empty() {
        groups.push(CategoryGroup {
            category: models::Category {
                id: UNCATEGORIZED_FILTER.to_string(),
                name: UNCATEGORIZED.to_string(),
                parent_id: None,
                color: UNCATEGORIZED_GROUP_COLOR.to_string(),
                description: "Services without a category".to_string(),
                icon: UNCATEGORIZED_GROUP_ICON.to_string(),
            },
            service_count: uncategorized.len(),
            services: uncategorized,
        });
    }

    Ok(groups)
}
