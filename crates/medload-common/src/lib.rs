//! Medload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the medload workspace.
//!
//! - **Fingerprints**: content-derived identifiers used as idempotency keys
//! - **Logging**: `tracing` subscriber configuration shared by every binary
//!
//! # Example
//!
//! ```
//! use medload_common::fingerprint::fingerprint;
//!
//! let id = fingerprint(["Bobby Jackson", "30", ""]);
//! assert_eq!(id.len(), 64);
//! ```

pub mod fingerprint;
pub mod logging;

pub use fingerprint::{fingerprint, FIELD_SEPARATOR, FINGERPRINT_HEX_LEN};
