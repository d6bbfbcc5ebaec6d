//! Shared test utilities for the snapshot tool
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique test identifiers
//! - [`fixtures`]: fixed clock, snapshot names and ARNs

pub mod aws;
pub mod fixtures;

pub use aws::{get_test_region, test_cluster_id, test_run_id};
pub use fixtures::{days_ago, fixed_now, hours_ago, snapshot_arn, snapshot_name_at};
