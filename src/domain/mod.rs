//! Domain layer - Target model, cluster model and port definitions
//!
//! This module defines the core traits (ports) that adapters implement,
//! following hexagonal architecture principles.

pub mod cluster;
pub mod ports;
pub mod target;

pub use cluster::*;
pub use ports::*;
pub use target::*;
