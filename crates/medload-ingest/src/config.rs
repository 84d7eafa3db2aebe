//! Loader configuration
//!
//! Values come from command-line flags with environment fallbacks; see the
//! binary for the flag and variable names.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";

pub const DEFAULT_DATABASE: &str = "medical_db";

pub const DEFAULT_COLLECTION: &str = "admissions";

pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Upper bound on batch size.
///
/// Bounds the records held per bulk write; batches whose encoded size exceeds
/// the server's 16 MiB document limit are split further when sent.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Settings for one load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source CSV file
    pub csv_path: PathBuf,

    pub mongo_uri: String,

    pub database: String,

    pub collection: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl MigrationConfig {
    /// Config for `csv_path` with every other setting at its default
    pub fn new(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_mongo_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongo_uri = uri.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.csv_path.as_os_str().is_empty() {
            return Err(IngestError::config("CSV path must not be empty"));
        }
        if self.mongo_uri.trim().is_empty() {
            return Err(IngestError::config("MongoDB URI must not be empty"));
        }
        if self.database.trim().is_empty() {
            return Err(IngestError::config("database name must not be empty"));
        }
        if self.collection.trim().is_empty() {
            return Err(IngestError::config("collection name must not be empty"));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(IngestError::config(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::new("admissions.csv");
        assert_eq!(config.mongo_uri, "mongodb://localhost:27017");
        assert_eq!(config.database, "medical_db");
        assert_eq!(config.collection, "admissions");
        assert_eq!(config.batch_size, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = MigrationConfig::new("data.csv")
            .with_mongo_uri("mongodb://db:27017")
            .with_database("hospital")
            .with_collection("visits")
            .with_batch_size(250);

        assert_eq!(config.mongo_uri, "mongodb://db:27017");
        assert_eq!(config.database, "hospital");
        assert_eq!(config.collection, "visits");
        assert_eq!(config.batch_size, 250);
    }

    #[test]
    fn test_validate_batch_size_bounds() {
        let config = MigrationConfig::new("data.csv");
        assert!(config.clone().with_batch_size(1).validate().is_ok());
        assert!(config.clone().with_batch_size(MAX_BATCH_SIZE).validate().is_ok());

        let err = config.clone().with_batch_size(0).validate().unwrap_err();
        assert!(err.to_string().contains("between 1 and 10000, got 0"));
        assert!(config.with_batch_size(MAX_BATCH_SIZE + 1).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_names() {
        let config = MigrationConfig::new("data.csv");
        assert!(config.clone().with_database("  ").validate().is_err());
        assert!(config.clone().with_collection("").validate().is_err());
        assert!(config.with_mongo_uri("").validate().is_err());
        assert!(MigrationConfig::new("").validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults_batch_size() {
        let json = r#"{
            "csv_path": "data.csv",
            "mongo_uri": "mongodb://localhost:27017",
            "database": "medical_db",
            "collection": "admissions"
        }"#;
        let config: MigrationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }
}
