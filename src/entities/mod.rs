//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod category;
pub mod service;

pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use service::{Column as ServiceColumn, Entity as Service, Model as ServiceModel};
