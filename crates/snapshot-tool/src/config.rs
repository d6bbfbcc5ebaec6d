//! Configuration types for the snapshot tool
//!
//! One invocation runs one pass in one mode. The CLI layer (`main.rs`)
//! builds a [`ToolConfig`] from flags and environment variables; everything
//! below the CLI reads only this struct.

use serde::Serialize;
use snapshot_tool_common::defaults::{ALL_CLUSTERS, ALL_SNAPSHOTS};
use thiserror::Error;

use crate::aws::AccountId;
use crate::filter::{Selector, SelectorTarget};
use crate::lifecycle::Schedule;

/// Configuration problems, reported before any provider call
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid AWS account id '{0}': expected 12 digits")]
    InvalidAccountId(String),

    #[error("Invalid pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Retention must be at least one day")]
    ZeroRetention,

    #[error("Backup interval must be at least one hour")]
    ZeroInterval,

    #[error("Max in-flight operations must be at least one")]
    ZeroInFlight,

    #[error("No cluster engines selected")]
    NoEngines,

    #[error("No region configured: pass --region or set REGION_OVERRIDE or AWS_DEFAULT_REGION")]
    MissingRegion,

    #[error("Mode '{0}' requires a destination account (--dest-account / DEST_ACCOUNT)")]
    MissingDestinationAccount(Mode),

    #[error("Mode '{0}' requires a source KMS key (--source-kms-key / KMS_KEY_SOURCE_REGION)")]
    MissingSourceKey(Mode),

    #[error("Mode '{0}' requires a destination region different from the source region")]
    SameRegion(Mode),

    #[error("Refusing to share snapshots with the account they live in ({0})")]
    ShareWithSelf(AccountId),
}

/// Deployment mode: the set of transitions one invocation performs
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Snapshot clusters that are due for a backup
    Take,
    /// Share pending snapshots with the destination account
    Share,
    /// Re-encrypt snapshots flagged for re-encryption
    Reencrypt,
    /// Copy snapshots shared with this account into it, then across regions
    CopyShared,
    /// Copy own snapshots to the destination region
    CopyOwn,
    /// Delete expired tool-created snapshots
    Expire,
    /// Delete expired tool-made copies in the destination region
    ExpireDest,
}

impl Mode {
    /// Whether the pattern is matched against cluster or snapshot identifiers
    pub fn selector_target(self) -> SelectorTarget {
        match self {
            Mode::Take | Mode::Share | Mode::Reencrypt | Mode::CopyOwn => {
                SelectorTarget::ClusterId
            }
            Mode::CopyShared | Mode::Expire | Mode::ExpireDest => SelectorTarget::SnapshotId,
        }
    }

    /// Match-all sentinel used when no pattern is configured
    pub fn default_pattern(self) -> &'static str {
        match self.selector_target() {
            SelectorTarget::ClusterId => ALL_CLUSTERS,
            SelectorTarget::SnapshotId => ALL_SNAPSHOTS,
        }
    }
}

/// Which clusters and snapshots a pass considers
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Identifier regex or a match-all sentinel
    pub pattern: String,
    /// Engine allow-list
    pub engines: Vec<String>,
}

/// Retention and backup cadence
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub retention_days: u32,
    pub interval_hours: u32,
}

#[derive(Debug, Clone)]
pub struct RegionConfig {
    /// Region the tool's own snapshots live in
    pub source: String,
    /// Region copies end up in (equal to `source` when not copying across regions)
    pub destination: String,
}

#[derive(Debug, Clone)]
pub struct SharingConfig {
    pub destination_account: Option<AccountId>,
    /// Re-encrypt snapshots not under the backup key before sharing them
    pub reencrypt_before_share: bool,
}

#[derive(Debug, Clone, Default)]
pub struct KmsConfig {
    /// Key for copies made in the source region (and the backup key)
    pub source_key: Option<String>,
    /// Key for copies made in the destination region
    pub destination_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreationConfig {
    pub name_prefix: Option<String>,
    /// Create from the latest automated backup instead of the live cluster
    pub use_automated_backup: bool,
    /// Flag new snapshots for the re-encrypt pass
    pub mark_reencrypt: bool,
}

/// Runtime behavior flags
#[derive(Debug, Clone)]
pub struct RuntimeFlags {
    /// Classify and report without mutating anything
    pub dry_run: bool,
    /// Concurrent provider mutations within one pass
    pub max_in_flight: usize,
}

/// Configuration for one pass
///
/// Composed of focused sub-configs. The common fields are also reachable
/// through flat accessor methods.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub mode: Mode,
    pub selection: SelectionConfig,
    pub schedule: ScheduleConfig,
    pub regions: RegionConfig,
    pub sharing: SharingConfig,
    pub keys: KmsConfig,
    pub creation: CreationConfig,
    pub flags: RuntimeFlags,
}

impl ToolConfig {
    /// Check cross-field rules
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.retention_days == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if self.schedule.interval_hours == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.flags.max_in_flight == 0 {
            return Err(ConfigError::ZeroInFlight);
        }
        if self.selection.engines.is_empty() {
            return Err(ConfigError::NoEngines);
        }
        self.selector()?;

        match self.mode {
            Mode::Share if self.sharing.destination_account.is_none() => {
                return Err(ConfigError::MissingDestinationAccount(self.mode));
            }
            Mode::Share if self.sharing.reencrypt_before_share && self.keys.source_key.is_none() => {
                return Err(ConfigError::MissingSourceKey(self.mode));
            }
            Mode::Reencrypt if self.keys.source_key.is_none() => {
                return Err(ConfigError::MissingSourceKey(self.mode));
            }
            Mode::CopyOwn if !self.is_cross_region() => {
                return Err(ConfigError::SameRegion(self.mode));
            }
            _ => {}
        }
        Ok(())
    }

    /// Refuse sharing into the account the tool runs in
    pub fn check_share_target(&self, current: &AccountId) -> Result<(), ConfigError> {
        match &self.sharing.destination_account {
            Some(dest) if self.mode == Mode::Share && dest == current => {
                Err(ConfigError::ShareWithSelf(dest.clone()))
            }
            _ => Ok(()),
        }
    }

    pub fn selector(&self) -> Result<Selector, ConfigError> {
        Selector::parse(&self.selection.pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.selection.pattern.clone(),
            source,
        })
    }

    pub fn schedule(&self) -> Schedule {
        Schedule::new(self.schedule.retention_days, self.schedule.interval_hours)
    }

    pub fn is_cross_region(&self) -> bool {
        self.regions.source != self.regions.destination
    }

    pub fn region(&self) -> &str {
        &self.regions.source
    }
    pub fn destination_region(&self) -> &str {
        &self.regions.destination
    }
    pub fn dry_run(&self) -> bool {
        self.flags.dry_run
    }
    pub fn max_in_flight(&self) -> usize {
        self.flags.max_in_flight
    }
}

/// Parse an optional account id, treating blank values as unset
pub fn parse_account(raw: Option<&str>) -> Result<Option<AccountId>, ConfigError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some),
    }
}

/// Literal that leaves the region override unset
pub const REGION_UNSET: &str = "NO";

/// Literal that leaves the name prefix or a KMS key unset
pub const VALUE_UNSET: &str = "NONE";

/// Trim an optional string setting; blank means unset
pub fn optional_setting(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Like [`optional_setting`], also treating `unset` (any case) as unset
pub fn optional_setting_or(raw: Option<String>, unset: &str) -> Option<String> {
    optional_setting(raw).filter(|s| !s.eq_ignore_ascii_case(unset))
}
