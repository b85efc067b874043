//! Local Configuration Store
//!
//! Persistent per-node records the agent consults when the cluster asks it
//! to act on a target.

pub mod kv;
pub mod targets;

pub use kv::{DirectoryStore, KeyValueStore, KeyValueStoreRef, MemoryStore};
pub use targets::TargetStore;
