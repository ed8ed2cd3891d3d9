//! # Persistent Storage
//!
//! Disk-backed implementations of the Traza stores.

pub mod redb_store;

pub use redb_store::RedbStore;
