//! snapshot-tool - cluster snapshot lifecycle automation
//!
//! Each invocation runs one reconciliation pass in one mode: take, share,
//! re-encrypt, copy or expire cluster snapshots, using snapshot names and
//! tags as the only state.

pub mod aws;
pub mod config;
pub mod executor;
pub mod filter;
pub mod inventory;
pub mod lifecycle;
pub mod reconcile;
