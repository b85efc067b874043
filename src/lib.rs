//! Target HA Agent - Lustre target lifecycle on Pacemaker clusters
//!
//! Maps each Lustre target (MGS, MDT, OST) onto exactly one cluster node at
//! a time, using Pacemaker as the placement and failover engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        Lifecycle Actions (TargetManager)                     │
//! │  configure / unconfigure / start / stop / failover / failback / convert      │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │   Definition    │  │   Constraint    │  │   Resource Controller       │  │
//! │  │   Builder       │  │   Manager       │  │   (convergence wait)        │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────┬───────────────┘  │
//! │           │                    │                         │                   │
//! │           └────────────────────┼─────────────────────────┘                   │
//! │                                │                                             │
//! │                    ┌───────────┴───────────┐   ┌─────────────────────────┐  │
//! │                    │   ClusterManager port │   │  Mount Controller       │  │
//! │                    │   (Pacemaker CLI)     │   │  (resource agent shim)  │  │
//! │                    └───────────────────────┘   └────────────┬────────────┘  │
//! ├─────────────────────────────────────────────────────────────┼───────────────┤
//! │                          Local Node                         │                │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌───────────────┴─────────────┐  │
//! │  │  Target Store   │  │  Block Devices  │  │  Lustre Filesystem /        │  │
//! │  │  (JSON records) │  │  (zpool/debugfs)│  │  Mount Table                │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`ha`]: Lifecycle actions, convergence wait and legacy conversion
//! - [`pacemaker`]: Pacemaker CLI adapter and document parsing
//! - [`devices`]: Command-backed block devices, filesystems and mount table
//! - [`store`]: Local target configuration store
//! - [`shell`]: External command execution
//! - [`domain`]: Core domain types and traits
//! - [`config`]: Agent configuration
//! - [`error`]: Error types and handling

pub mod config;
pub mod devices;
pub mod domain;
pub mod error;
pub mod ha;
pub mod pacemaker;
pub mod shell;
pub mod store;

// Re-export commonly used types
pub use config::{AgentConfig, ConvergencePolicy, MountConfig, PacemakerConfig};

pub use domain::cluster::{CibSnapshot, Locations, ResourceState};
pub use domain::ports::{
    BlockDevice, ClusterManager, ClusterManagerRef, DeviceFactory, Filesystem, MountTable,
};
pub use domain::target::{BackingFs, DeviceType, Preference, TargetInfo};

pub use error::{Error, OcfStatus, Result};

pub use ha::{
    action_status, ActionValue, ConversionReport, LegacyConverter, MountController, ResourceController,
    TargetAction, TargetManager,
};

pub use pacemaker::PacemakerCli;
pub use store::TargetStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
