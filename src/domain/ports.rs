//! Domain Ports - Core trait definitions for the target HA agent
//!
//! These traits define the boundaries between the lifecycle logic and the
//! external systems it drives: the cluster resource manager, storage devices,
//! the Lustre filesystem, and the local mount table.

use crate::domain::cluster::{CibScope, CibSnapshot, DeclaredTimeouts, ResourceState};
use crate::domain::target::{AgentType, BackingFs, DeviceType, TargetRole};
use crate::error::Result;
use crate::pacemaker::xml::Element;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Cluster Manager Port
// =============================================================================

/// Port for the external cluster resource manager
#[async_trait]
pub trait ClusterManager: Send + Sync {
    /// Snapshot of the full declarative configuration
    async fn cib(&self) -> Result<CibSnapshot>;

    /// Live state of every resource; fails when the manager is not running
    async fn resource_status(&self) -> Result<Vec<ResourceState>>;

    /// Whether a resource with this id is defined
    async fn resource_exists(&self, id: &str) -> Result<bool>;

    /// Submit a fragment to the declarative configuration
    async fn create(&self, scope: CibScope, fragment: &Element) -> Result<()>;

    /// Remove the object identified by a fragment; absent objects are not an error
    async fn delete(&self, scope: CibScope, fragment: &Element) -> Result<()>;

    /// Set a resource's desired role
    async fn set_target_role(&self, id: &str, role: TargetRole) -> Result<()>;

    /// Clear failure history of a resource
    async fn cleanup(&self, id: &str) -> Result<()>;

    /// Move a resource to a node, pinning it there
    async fn move_resource(&self, id: &str, node: &str) -> Result<()>;

    /// Remove the pin created by a move
    async fn clear_move(&self, id: &str, node: &str) -> Result<()>;

    /// Toggle cluster-wide maintenance mode
    async fn set_maintenance_mode(&self, enabled: bool) -> Result<()>;

    /// Name of this node as known to the cluster
    async fn local_node(&self) -> Result<String>;

    /// Operation timeouts declared in an agent's metadata
    async fn agent_metadata(&self, agent: &AgentType) -> Result<DeclaredTimeouts>;
}

// =============================================================================
// Storage Device Ports
// =============================================================================

/// Port for import/export of the device underneath a target
#[async_trait]
pub trait BlockDevice: Send + Sync {
    /// Device path this handle operates on
    fn path(&self) -> &str;

    /// Bring the device online on this node
    async fn import(&self, force: bool) -> Result<()>;

    /// Take the device offline on this node
    async fn export(&self) -> Result<()>;

    /// Remove a filesystem's configuration logs from a management target device
    async fn purge_filesystem_configuration(&self, filesystem: &str) -> Result<()>;
}

/// Port for mounting the Lustre filesystem of a target
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn mount(&self, mount_point: &str) -> Result<()>;

    async fn umount(&self) -> Result<()>;

    /// Whether a device from the mount table is this filesystem's device
    async fn devices_match(&self, candidate: &str, uuid: &str) -> bool;
}

/// Port for constructing device and filesystem handles
pub trait DeviceFactory: Send + Sync {
    fn block_device(&self, device_type: DeviceType, path: &str) -> Box<dyn BlockDevice>;

    fn filesystem(&self, backfstype: BackingFs, device: &str) -> Box<dyn Filesystem>;
}

// =============================================================================
// Mount Table Port
// =============================================================================

/// A mounted filesystem on this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMount {
    pub device: String,
    pub mount_point: String,
    pub fstype: String,
}

/// Port for enumerating local mounts
#[async_trait]
pub trait MountTable: Send + Sync {
    async fn local_mounts(&self) -> Result<Vec<LocalMount>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterManagerRef = Arc<dyn ClusterManager>;
pub type DeviceFactoryRef = Arc<dyn DeviceFactory>;
pub type MountTableRef = Arc<dyn MountTable>;
