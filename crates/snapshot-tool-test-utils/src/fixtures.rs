//! Snapshot fixtures
//!
//! A fixed clock plus helpers that build identifiers and ARNs the way the
//! tool names snapshots, so tests can place snapshots at known ages.

use chrono::{DateTime, Duration, TimeZone, Utc};
use snapshot_tool_common::naming;

/// Account the tool runs in
pub const SOURCE_ACCOUNT: &str = "111122223333";

/// Account snapshots are shared with
pub const DEST_ACCOUNT: &str = "444455556666";

pub const SOURCE_REGION: &str = "us-east-1";
pub const DEST_REGION: &str = "us-west-2";

/// Clock used by every fixture: 2024-06-15 12:30 UTC
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0)
        .single()
        .expect("valid fixture time")
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    fixed_now() - Duration::hours(hours)
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    fixed_now() - Duration::days(days)
}

/// `<cluster>-<timestamp>` for a snapshot taken at `time`
pub fn snapshot_name_at(cluster_id: &str, time: DateTime<Utc>) -> String {
    naming::encode(cluster_id, time, None)
}

/// Cluster snapshot ARN in the given region and account
pub fn snapshot_arn(region: &str, account: &str, identifier: &str) -> String {
    format!("arn:aws:rds:{region}:{account}:cluster-snapshot:{identifier}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_name_decodes_back() {
        let name = snapshot_name_at("orders", hours_ago(3));
        assert_eq!(name, "orders-2024-06-15-09-30");
        assert_eq!(naming::decode(&name, "orders"), Some(hours_ago(3)));
    }

    #[test]
    fn arn_carries_identifier() {
        let arn = snapshot_arn(SOURCE_REGION, SOURCE_ACCOUNT, "orders-2024-06-15-09-30");
        assert_eq!(
            naming::identifier_from_arn(&arn),
            Some("orders-2024-06-15-09-30")
        );
    }
}
