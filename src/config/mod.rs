/// Database configuration and connection management
pub mod database;

/// Application settings from renewal_hub.toml and the environment
pub mod settings;
