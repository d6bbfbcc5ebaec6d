//! snapshot-tool-common - Shared snapshot types and naming
//!
//! This crate holds the pieces of the snapshot tool that do not touch AWS:
//! identifier encoding, tag schema and provider-neutral records.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`naming`]: Snapshot identifier codec
//! - [`snapshot`]: Snapshot and cluster records
//! - [`tags`]: Tag schema and tag set

pub mod defaults;
pub mod naming;
pub mod snapshot;
pub mod tags;

pub use snapshot::{ClusterRecord, SnapshotOrigin, SnapshotRecord, SnapshotStatus};
pub use tags::TagSet;
