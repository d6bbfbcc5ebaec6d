//! KMS key resolution
//!
//! Snapshots report the full key ARN, while operators usually configure a
//! key id or alias. Resolving once per pass lets the share pass compare the
//! two directly.

use anyhow::{Context, Result};
use tracing::debug;

use super::context::{AwsContext, FromAwsContext};
use super::error::AwsError;

/// KMS client for key lookups
pub struct KmsClient {
    client: aws_sdk_kms::Client,
}

impl FromAwsContext for KmsClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.kms_client(),
        }
    }
}

impl KmsClient {
    /// Resolve a key id, alias, or ARN to the key's ARN
    pub async fn resolve_key_arn(&self, key_id: &str) -> Result<String> {
        let response = self
            .client
            .describe_key()
            .key_id(key_id)
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .with_context(|| format!("Failed to describe KMS key '{key_id}'"))?;

        let arn = response
            .key_metadata()
            .and_then(|meta| meta.arn())
            .with_context(|| format!("KMS returned no ARN for key '{key_id}'"))?;

        debug!(key_id = %key_id, key_arn = %arn, "Resolved KMS key");
        Ok(arn.to_string())
    }
}
