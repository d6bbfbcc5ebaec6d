//! Snapshot identifier codec
//!
//! Tool-created snapshots are named `[<prefix>-]<cluster>-<YYYY-MM-DD-HH-MM>`.
//! The timestamp in the name is the only creation time the lifecycle logic
//! trusts, so decoding has to stay stable for every identifier the tool has
//! ever produced, including re-encrypted copies (`<name>-reencrypted`).

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

/// Timestamp layout embedded in snapshot identifiers (minute resolution, UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Suffix appended to re-encrypted copies
pub const REENCRYPTED_SUFFIX: &str = "-reencrypted";

/// Render a timestamp the way it appears in identifiers and `CreatedOn` tags
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Build the identifier for a snapshot of `cluster_id` taken at `time`
pub fn encode(cluster_id: &str, time: DateTime<Utc>, prefix: Option<&str>) -> String {
    let stamp = format_timestamp(time);
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}-{cluster_id}-{stamp}"),
        _ => format!("{cluster_id}-{stamp}"),
    }
}

/// Recover the creation time from an identifier of a snapshot of `cluster_id`
///
/// Returns `None` for identifiers that do not follow the naming scheme; such
/// snapshots are never expired or copied by age. The cluster id may occur
/// more than once in the identifier (e.g. when the prefix repeats it), so
/// every occurrence is tried.
pub fn decode(identifier: &str, cluster_id: &str) -> Option<DateTime<Utc>> {
    if cluster_id.is_empty() {
        return None;
    }
    let base = identifier
        .strip_suffix(REENCRYPTED_SUFFIX)
        .unwrap_or(identifier);

    // Occurrences may overlap (`a-a` in `a-a-a-...`), so scan every offset.
    (0..base.len())
        .filter(|&idx| base.is_char_boundary(idx) && base[idx..].starts_with(cluster_id))
        .find_map(|idx| {
            let rest = base[idx + cluster_id.len()..].strip_prefix('-')?;
            NaiveDateTime::parse_from_str(rest, TIMESTAMP_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Decode truncated to the hour, the granularity backup freshness is judged at
pub fn decode_hour(identifier: &str, cluster_id: &str) -> Option<DateTime<Utc>> {
    decode(identifier, cluster_id).and_then(|time| time.with_minute(0))
}

/// Identifier of the re-encrypted copy of `identifier`
pub fn reencrypted_name(identifier: &str) -> String {
    format!("{identifier}{REENCRYPTED_SUFFIX}")
}

pub fn is_reencrypted_name(identifier: &str) -> bool {
    identifier.ends_with(REENCRYPTED_SUFFIX)
}

/// Extract the snapshot identifier from a cluster snapshot ARN
///
/// `arn:<partition>:rds:<region>:<account>:cluster-snapshot:<identifier>`.
/// Shared snapshots are listed by ARN, and this is how they are keyed.
pub fn identifier_from_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(7, ':');
    let (Some("arn"), Some(_partition), Some("rds"), Some(_region), Some(_account)) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };
    match (parts.next(), parts.next()) {
        (Some("cluster-snapshot"), Some(identifier)) if !identifier.is_empty() => Some(identifier),
        _ => None,
    }
}

/// Region component of an ARN
pub fn region_from_arn(arn: &str) -> Option<&str> {
    arn.split(':').nth(3).filter(|region| !region.is_empty())
}
