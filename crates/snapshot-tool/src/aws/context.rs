//! Shared AWS configuration context
//!
//! `AwsContext` loads SDK configuration once per region. `RegionContexts`
//! holds the source region's context plus, for passes that copy across
//! regions, the destination's.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use std::sync::Arc;

/// Loaded SDK configuration for one region.
///
/// # Example
/// ```ignore
/// let source = AwsContext::new("us-east-1").await;
/// let rds = RdsClient::from_context(&source);
/// let kms = KmsClient::from_context(&source);
/// ```
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load AWS configuration for `region`.
    ///
    /// Credentials come from the environment, config files, or the execution
    /// role, in the SDK's usual order.
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Credentials the clients sign with, for requests signed outside them
    pub fn credentials_provider(&self) -> Option<SharedCredentialsProvider> {
        self.config.credentials_provider()
    }

    pub fn rds_client(&self) -> aws_sdk_rds::Client {
        aws_sdk_rds::Client::new(&self.config)
    }

    pub fn kms_client(&self) -> aws_sdk_kms::Client {
        aws_sdk_kms::Client::new(&self.config)
    }

    pub fn sts_client(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(&self.config)
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Construct a service wrapper from a loaded context.
pub trait FromAwsContext {
    fn from_context(ctx: &AwsContext) -> Self;
}

/// Contexts for the two regions a pass touches
#[derive(Debug, Clone)]
pub struct RegionContexts {
    pub source: AwsContext,
    /// `None` when the destination is the source region
    remote: Option<AwsContext>,
}

impl RegionContexts {
    /// Load both regions concurrently; a single context when they match
    pub async fn load(source: &str, destination: &str) -> Self {
        if source == destination {
            return Self {
                source: AwsContext::new(source).await,
                remote: None,
            };
        }
        let (source, remote) = tokio::join!(AwsContext::new(source), AwsContext::new(destination));
        Self {
            source,
            remote: Some(remote),
        }
    }

    pub fn destination(&self) -> &AwsContext {
        self.remote.as_ref().unwrap_or(&self.source)
    }

    pub fn is_cross_region(&self) -> bool {
        self.remote.is_some()
    }

    /// One client per region; the destination client is only built when it
    /// differs from the source
    pub fn clients<T: FromAwsContext>(&self) -> (T, Option<T>) {
        (
            T::from_context(&self.source),
            self.remote.as_ref().map(T::from_context),
        )
    }
}
