//! AWS client modules
//!
//! This module provides wrappers around AWS SDK clients for:
//! - RDS: Cluster and cluster snapshot management
//! - KMS: Key ARN resolution
//! - STS: Account ID lookup

pub mod account;
pub mod context;
pub mod error;
pub mod kms;
pub mod rds;

pub use account::{AccountId, get_current_account_id};
pub use context::{AwsContext, FromAwsContext, RegionContexts};
pub use kms::KmsClient;
pub use rds::{RdsClient, RdsOperations};

// Error handling
pub use error::{AwsError, classify_anyhow_error, classify_aws_error, find_aws_error, ignore_not_found};
