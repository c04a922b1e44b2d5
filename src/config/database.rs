//! Database configuration module.
//!
//! Handles the `SQLite` connection and creates the tables from the entity
//! definitions with `SeaORM`'s `Schema::create_table_from_entity`, so the
//! schema always matches the Rust models.

use crate::entities::{Category, Service};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Fallback when `DATABASE_URL` is not set; `mode=rwc` creates the file.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/renewal_hub.sqlite?mode=rwc";

/// Gets the database URL from the environment or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Connects to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates the `services` and `categories` tables if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut category_table = schema.create_table_from_entity(Category);
    category_table.if_not_exists();
    let mut service_table = schema.create_table_from_entity(Service);
    service_table.if_not_exists();

    db.execute(builder.build(&category_table)).await?;
    db.execute(builder.build(&service_table)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CategoryModel, ServiceModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;

        let _: Vec<ServiceModel> = Service::find().limit(1).all(&db).await?;
        let _: Vec<CategoryModel> = Category::find().limit(1).all(&db).await?;
        Ok(())
    }
}
