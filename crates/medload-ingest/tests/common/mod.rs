//! Shared fixtures for medload integration tests
//!
//! - CSV builders for the admissions schema written to temporary directories
//! - MongoDB test container (requires Docker)
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::mongo::Mongo;
use tracing::info;

// ============================================================================
// CSV Fixtures
// ============================================================================

pub const HEADER: &str = "Name,Age,Gender,Blood Type,Medical Condition,Date of Admission,Doctor,Hospital,Insurance Provider,Billing Amount,Room Number,Admission Type,Discharge Date,Medication,Test Results";

pub const BOBBY: &str = "Bobby Jackson,30,Male,B-,Cancer,2024-01-31,Matthew Smith,Sons and Miller,Blue Cross,18856.281306765,328,Urgent,2024-02-02,Paracetamol,Normal";

pub const LESLIE: &str = "Leslie Terry,62,Male,A+,Obesity,2019-08-20,Samantha Davies,Kim Inc,Medicare,33643.327286577,265,Emergency,2019-08-26,Ibuprofen,Inconclusive";

pub const DANNY: &str = "Danny Smith,76,Female,A-,Obesity,2022-09-22,Tiffany Mitchell,Cook PLC,Aetna,27955.096078842,205,Emergency,2022-10-07,Aspirin,Normal";

/// A CSV file inside a temporary directory that lives as long as this value
pub struct CsvFixture {
    dir: TempDir,
    path: PathBuf,
}

impl CsvFixture {
    /// Write `header` followed by `rows`, one per line
    pub fn with_header(header: &str, rows: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("admissions.csv");

        let mut data = String::from(header);
        data.push('\n');
        for row in rows {
            data.push_str(row);
            data.push('\n');
        }
        std::fs::write(&path, data).expect("Failed to write CSV fixture");

        Self { dir, path }
    }

    /// Admissions file with the standard header
    pub fn admissions(rows: &[&str]) -> Self {
        Self::with_header(HEADER, rows)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}

/// `n` distinct admission rows
pub fn patient_rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            format!(
                "Patient {i},{},Female,O+,Asthma,2023-05-{:02},Dr. Grey,Seattle Grace,Cigna,{}.50,{},Elective,2023-06-01,Lipitor,Normal",
                20 + i % 60,
                1 + i % 28,
                1000 + i,
                100 + i,
            )
        })
        .collect()
}

/// `medload` run from `dir` with no inherited configuration
pub fn medload_command(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("medload").expect("binary should be built");
    cmd.current_dir(dir);
    for var in [
        "MIGRATE_CSV",
        "MONGO_URI",
        "MONGO_DB",
        "MONGO_COLLECTION",
        "MONGO_BATCH_SIZE",
        "LOG_LEVEL",
        "LOG_OUTPUT",
        "LOG_FORMAT",
        "LOG_DIR",
        "LOG_FILTER",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("medload_ingest=debug")
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MongoDB Test Container
// ============================================================================

/// MongoDB container; stopped when dropped
pub struct TestMongo {
    _container: ContainerAsync<Mongo>,
    uri: String,
}

impl TestMongo {
    pub async fn start() -> Result<Self> {
        info!("Starting MongoDB test container...");

        let container = Mongo::default()
            .start()
            .await
            .context("Failed to start MongoDB container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(27017.tcp())
            .await
            .context("Failed to get container port")?;

        let uri = format!("mongodb://{}:{}", host, port);
        info!(uri = %uri, "MongoDB container ready");

        Ok(Self {
            _container: container,
            uri,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}
