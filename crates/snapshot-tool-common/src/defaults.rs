//! Default configuration values
//!
//! These constants keep the CLI defaults and the library defaults in one place.

/// Default number of days a tool-managed snapshot is kept
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Default hours between backups of the same cluster
pub const DEFAULT_BACKUP_INTERVAL_HOURS: u32 = 24;

/// Default number of provider mutations in flight within one pass
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Cluster engines the tool manages
pub const SUPPORTED_ENGINES: &[&str] = &["aurora", "aurora-mysql", "aurora-postgresql", "neptune"];

/// Pattern sentinel selecting every cluster
pub const ALL_CLUSTERS: &str = "ALL_CLUSTERS";

/// Pattern sentinel selecting every snapshot
pub const ALL_SNAPSHOTS: &str = "ALL_SNAPSHOTS";

/// Snapshot attribute that lists accounts allowed to restore
pub const RESTORE_ATTRIBUTE: &str = "restore";

/// Returns the default engine list
pub fn default_engines() -> Vec<String> {
    SUPPORTED_ENGINES.iter().map(|e| e.to_string()).collect()
}
