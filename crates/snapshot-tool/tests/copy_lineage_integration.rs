//! Copy lineages across passes: shared snapshots move through a local copy to
//! the destination region, own snapshots go straight to the destination

mod test_utils;

use chrono::{DateTime, Utc};
use snapshot_tool::config::Mode;
use snapshot_tool::executor::Outcome;
use snapshot_tool_common::naming;
use snapshot_tool_common::tags::{TAG_COPIED_BY, TOOL_MARKER, TagSet, copy_marker, creation_tags};
use snapshot_tool_common::{SnapshotRecord, SnapshotStatus};
use test_utils::*;

fn add_own_snapshot(cloud: &FakeCloud, cluster: &str, time: DateTime<Utc>) -> String {
    let identifier = snapshot_name_at(cluster, time);
    cloud.add_snapshot(
        SOURCE_REGION,
        &identifier,
        cluster,
        creation_tags(&naming::format_timestamp(time), false),
    );
    identifier
}

#[tokio::test]
async fn shared_snapshot_walks_the_whole_lineage() {
    let cloud = FakeCloud::new();
    let identifier = snapshot_name_at("orders", hours_ago(6));
    cloud.add_shared_snapshot(SOURCE_REGION, &identifier, "orders");
    let config = config(Mode::CopyShared);

    // Local copy first; the destination copy needs another pass
    let first = run_pass(&config, &cloud).await;
    assert_eq!(first.succeeded.len(), 1);
    assert_eq!(first.succeeded[0].outcome, Outcome::FollowUp);
    assert_eq!(first.waiting, vec![identifier.clone()]);
    assert_eq!(first.pending_count(), 1);
    assert!(first.check().is_err());
    let local = cloud.snapshot(SOURCE_REGION, &identifier).unwrap();
    assert_eq!(local.tags.get(TAG_COPIED_BY), Some(TOOL_MARKER));

    let second = run_pass(&config, &cloud).await;
    assert_eq!(second.pending_count(), 0);
    assert_eq!(second.succeeded[0].action, "copy-remote");
    let remote = cloud.snapshot(DEST_REGION, &identifier).unwrap();
    assert_eq!(remote.tags.get(TAG_COPIED_BY), Some(TOOL_MARKER));
    assert!(cloud.snapshot(SOURCE_REGION, &identifier).is_some());

    let third = run_pass(&config, &cloud).await;
    assert_eq!(third.succeeded[0].action, "delete");
    assert!(cloud.snapshot(SOURCE_REGION, &identifier).is_none());
    assert!(cloud.snapshot(DEST_REGION, &identifier).is_some());

    let settled = run_pass(&config, &cloud).await;
    assert!(settled.succeeded.is_empty());
    assert!(settled.check().is_ok());
    assert_eq!(cloud.calls_of("copy").len(), 2);
    assert_eq!(cloud.calls_of("delete").len(), 1);
}

#[tokio::test]
async fn remote_copy_waits_for_local_copy() {
    let cloud = FakeCloud::new();
    let identifier = snapshot_name_at("orders", hours_ago(6));
    cloud.add_shared_snapshot(SOURCE_REGION, &identifier, "orders");
    cloud.set_new_status(SnapshotStatus::Copying);
    let config = config(Mode::CopyShared);

    run_pass(&config, &cloud).await;
    let second = run_pass(&config, &cloud).await;

    assert!(second.succeeded.is_empty());
    assert_eq!(second.waiting, vec![identifier.clone()]);
    assert_eq!(second.pending_count(), 1);
    assert!(cloud.snapshot(DEST_REGION, &identifier).is_none());

    cloud.set_status(SOURCE_REGION, &identifier, SnapshotStatus::Available);
    let third = run_pass(&config, &cloud).await;
    assert_eq!(third.succeeded[0].action, "copy-remote");
}

#[tokio::test]
async fn local_copy_kept_until_destination_copy_is_available() {
    let cloud = FakeCloud::new();
    let identifier = snapshot_name_at("orders", hours_ago(6));
    cloud.add_shared_snapshot(SOURCE_REGION, &identifier, "orders");
    let config = config(Mode::CopyShared);

    run_pass(&config, &cloud).await;
    cloud.set_new_status(SnapshotStatus::Copying);
    run_pass(&config, &cloud).await;

    let third = run_pass(&config, &cloud).await;
    assert!(third.succeeded.is_empty());
    assert_eq!(third.skipped[0].reason, "destination copy not available yet");
    assert_eq!(third.pending_count(), 0);
    assert!(cloud.snapshot(SOURCE_REGION, &identifier).is_some());
}

#[tokio::test]
async fn local_snapshot_not_copied_by_the_tool_is_never_deleted() {
    let cloud = FakeCloud::new();
    let identifier = snapshot_name_at("orders", hours_ago(6));
    cloud.add_shared_snapshot(SOURCE_REGION, &identifier, "orders");
    cloud.add_snapshot(SOURCE_REGION, &identifier, "orders", TagSet::new());
    cloud.insert(
        DEST_REGION,
        SnapshotRecord::new(
            &identifier,
            snapshot_arn(DEST_REGION, SOURCE_ACCOUNT, &identifier),
            "orders",
            ENGINE,
        )
        .with_tags(copy_marker()),
    );

    let report = run_pass(&config(Mode::CopyShared), &cloud).await;

    assert!(cloud.calls_of("delete").is_empty());
    assert!(cloud.snapshot(SOURCE_REGION, &identifier).is_some());
    assert_eq!(report.skipped[0].reason, "local snapshot not copied by the tool");
}

#[tokio::test]
async fn shared_snapshots_past_retention_are_not_copied() {
    let cloud = FakeCloud::new();
    let old = snapshot_name_at("orders", days_ago(8));
    cloud.add_shared_snapshot(SOURCE_REGION, &old, "orders");
    cloud.add_shared_snapshot(SOURCE_REGION, "orders-handpicked", "orders");

    let report = run_pass(&config(Mode::CopyShared), &cloud).await;

    assert!(cloud.calls_of("copy").is_empty());
    let reasons: Vec<_> = report.skipped.iter().map(|s| s.reason.as_str()).collect();
    assert_eq!(reasons, vec!["older than retention", "no valid timestamp"]);
}

#[tokio::test]
async fn same_region_copy_shared_stops_after_local_copy() {
    let cloud = FakeCloud::new();
    let identifier = snapshot_name_at("orders", hours_ago(6));
    cloud.add_shared_snapshot(SOURCE_REGION, &identifier, "orders");
    let mut config = config(Mode::CopyShared);
    config.regions.destination = SOURCE_REGION.into();

    let first = run_pass(&config, &cloud).await;
    assert_eq!(first.succeeded[0].outcome, Outcome::Done);
    assert_eq!(first.pending_count(), 0);

    let second = run_pass(&config, &cloud).await;
    assert!(second.succeeded.is_empty());
    assert!(cloud.snapshot(SOURCE_REGION, &identifier).is_some());
}

#[tokio::test]
async fn copy_own_moves_tool_snapshots_and_keeps_originals() {
    let cloud = FakeCloud::new();
    let managed = add_own_snapshot(&cloud, "orders", days_ago(1));
    let manual = snapshot_name_at("orders", days_ago(2));
    cloud.add_snapshot(SOURCE_REGION, &manual, "orders", TagSet::new());
    let config = config(Mode::CopyOwn);

    let report = run_pass(&config, &cloud).await;

    assert_eq!(report.pending_count(), 0);
    let remote = cloud.snapshot(DEST_REGION, &managed).unwrap();
    assert!(remote.tags.is_created_by_tool());
    assert!(remote.tags.is_copied_by_tool());
    assert!(cloud.snapshot(DEST_REGION, &manual).is_none());
    assert!(cloud.snapshot(SOURCE_REGION, &managed).is_some());

    let again = run_pass(&config, &cloud).await;
    assert!(again.succeeded.is_empty());
    assert_eq!(cloud.calls_of("copy").len(), 1);
}

#[tokio::test]
async fn encrypted_copy_without_key_fails_and_stays_pending() {
    let cloud = FakeCloud::new();
    let identifier = snapshot_name_at("orders", days_ago(1));
    cloud.insert(
        SOURCE_REGION,
        SnapshotRecord::new(
            &identifier,
            snapshot_arn(SOURCE_REGION, SOURCE_ACCOUNT, &identifier),
            "orders",
            ENGINE,
        )
        .with_kms_key("arn:aws:kms:us-east-1:111122223333:key/source")
        .with_tags(creation_tags(&naming::format_timestamp(days_ago(1)), false)),
    );

    let report = run_pass(&config(Mode::CopyOwn), &cloud).await;

    assert_eq!(report.pending_count(), 1);
    assert_eq!(report.failures[0].action, "copy-remote");
    assert!(report.failures[0].reason.contains("no KMS key"));
    assert!(cloud.calls_of("copy").is_empty());
}

#[tokio::test]
async fn encrypted_copy_uses_destination_key() {
    let cloud = FakeCloud::new();
    let identifier = snapshot_name_at("orders", days_ago(1));
    cloud.insert(
        SOURCE_REGION,
        SnapshotRecord::new(
            &identifier,
            snapshot_arn(SOURCE_REGION, SOURCE_ACCOUNT, &identifier),
            "orders",
            ENGINE,
        )
        .with_kms_key("arn:aws:kms:us-east-1:111122223333:key/source")
        .with_tags(creation_tags(&naming::format_timestamp(days_ago(1)), false)),
    );
    let dest_key = "arn:aws:kms:us-west-2:111122223333:key/dest";
    let mut config = config(Mode::CopyOwn);
    config.keys.destination_key = Some(dest_key.into());

    run_pass(&config, &cloud).await;

    let remote = cloud.snapshot(DEST_REGION, &identifier).unwrap();
    assert_eq!(remote.kms_key_id.as_deref(), Some(dest_key));
}

#[tokio::test]
async fn expire_dest_deletes_old_copies_only() {
    let cloud = FakeCloud::new();
    let old = add_own_snapshot(&cloud, "orders", days_ago(10));
    let recent = add_own_snapshot(&cloud, "orders", days_ago(2));
    run_pass(&config(Mode::CopyOwn), &cloud).await;

    let foreign = snapshot_name_at("orders", days_ago(20));
    cloud.insert(
        DEST_REGION,
        SnapshotRecord::new(
            &foreign,
            snapshot_arn(DEST_REGION, SOURCE_ACCOUNT, &foreign),
            "orders",
            ENGINE,
        ),
    );

    let report = run_pass(&config(Mode::ExpireDest), &cloud).await;

    assert_eq!(report.pending_count(), 0);
    let remaining = cloud.own_identifiers(DEST_REGION);
    assert!(!remaining.contains(&old));
    assert!(remaining.contains(&recent));
    assert!(remaining.contains(&foreign));
    assert!(cloud.snapshot(SOURCE_REGION, &old).is_some());
    assert!(cloud.calls_of("delete").iter().all(|c| c.region == DEST_REGION));
    assert_eq!(
        report.skipped.iter().find(|s| s.identifier == foreign).unwrap().reason,
        "missing CopiedBy tag"
    );
}
