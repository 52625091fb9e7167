//! Storage layer for snapkv
//!
//! This crate implements the multi-version storage backend with:
//! - VersionChain: append-only per-key log with binary-search snapshot reads
//! - VersionStore: DashMap-sharded index of chains
//! - Garbage collection of superseded entries below a safe version

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod store;

pub use chain::{VersionChain, VersionEntry};
pub use store::{GcStats, VersionStore};
