/// Database connection and table provisioning
pub mod database;

/// Application settings loaded from config.toml
pub mod settings;
