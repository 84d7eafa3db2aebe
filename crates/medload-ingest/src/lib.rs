//! Medload Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Idempotent loader for healthcare admission records: reads a CSV export,
//! normalizes it to a fixed schema and upserts it into MongoDB keyed by a
//! content-derived `record_id`.
//!
//! # Overview
//!
//! - **Schema validation**: every required column must be present ([`schema`])
//! - **Normalization**: raw cells become typed values; bad values become absent ([`normalize`])
//! - **Identity**: SHA-256 over the rendered field values ([`identity`])
//! - **Upsert**: fixed-size unordered bulk upserts with per-batch counts ([`upsert`])
//! - **Indexes**: unique `record_id` plus lookup indexes ([`indexes`])
//!
//! Loading the same file twice leaves the collection unchanged.

pub mod config;
pub mod error;
pub mod identity;
pub mod indexes;
pub mod normalize;
pub mod observer;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod shutdown;
pub mod source;
pub mod store;
pub mod upsert;

// Re-export commonly used types
pub use config::MigrationConfig;
pub use error::{IngestError, Result};
pub use observer::{MigrationObserver, NoopObserver, RecordingObserver, TracingObserver};
pub use pipeline::{prepare, MigrationPipeline, MigrationReport, PrepareStats, PreparedLoad};
pub use record::{AdmissionRecord, IdentifiedRecord, RecordId};
pub use source::SourceTable;
pub use store::{AdmissionStore, InMemoryStore, MongoStore};
