//! Embedded PostgreSQL plumbing for the store integration tests.
//!
//! Setup failures panic unless `SKIP_TEST_CLUSTER` is truthy ("1", "true" or
//! "yes", any case), in which case the test prints a skip marker and returns.
#![allow(dead_code)]

pub fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}
