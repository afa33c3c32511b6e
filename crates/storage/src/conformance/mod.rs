//! Conformance test suite for `SessionStore` implementations.
//!
//! A backend-agnostic suite that any `SessionStore` implementation can run
//! to verify correctness. The suite covers:
//!
//! - **Instances**: creation defaults, duplicate ids, filtered listings
//! - **Entries**: append-only log, `(created_at, seq)` ordering, `updated_at` bump
//! - **Collaborators**: append order, duplicate rejection
//! - **Status**: outcome writes, compare-and-set conflicts
//! - **Error handling**: correct error variants for unknown instances
//! - **Concurrency**: racing appends and status writes through `tokio::spawn`
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use pathway_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async { open_test_store().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod collaborator;
mod concurrent;
mod entries;
mod error;
mod instance;
mod status;

use std::fmt;
use std::future::Future;

use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use crate::record::{NewDataEntry, NewInstance};
use crate::SessionStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "instance", "entries", "status").
    pub category: String,
    /// Test name (e.g. "create_starts_in_progress").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(instance::run_instance_tests(&factory).await);
    results.extend(entries::run_entry_tests(&factory).await);
    results.extend(collaborator::run_collaborator_tests(&factory).await);
    results.extend(status::run_status_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

const T0: OffsetDateTime = datetime!(2025-01-01 08:00 UTC);

/// `T0` plus `minutes`.
fn at(minutes: i64) -> OffsetDateTime {
    T0 + Duration::minutes(minutes)
}

fn make_instance(id: &str) -> NewInstance {
    NewInstance {
        id: id.to_string(),
        protocol_graph_id: "test-protocol".to_string(),
        patient_identifier: format!("patient-{id}"),
        created_at: T0,
    }
}

fn make_instance_at(id: &str, protocol: &str, created_at: OffsetDateTime) -> NewInstance {
    NewInstance {
        id: id.to_string(),
        protocol_graph_id: protocol.to_string(),
        patient_identifier: format!("patient-{id}"),
        created_at,
    }
}

fn make_entry(instance_id: &str, step_id: &str, created_at: OffsetDateTime) -> NewDataEntry {
    NewDataEntry {
        instance_id: instance_id.to_string(),
        step_id: step_id.to_string(),
        author_id: "author-1".to_string(),
        value: serde_json::json!({ "step": step_id }),
        created_at,
    }
}
