//! Consolidated integration tests for fortdocs-integrity.
//!
//! One test binary instead of one per file, so proptest suites do not run
//! in parallel processes.
//! See: https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod aggregator_properties;
mod policy_files;
mod registry_ordering;
mod scenarios;
