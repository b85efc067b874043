//! Target Types
//!
//! Storage targets, their device and filesystem kinds, and the names under
//! which a target's resources and constraints live in the cluster manager.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Device / Filesystem Kinds
// =============================================================================

/// Kind of block device a target lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Linux,
    Zfs,
}

impl DeviceType {
    /// Whether the device must be imported on a node before it can be mounted
    pub fn requires_import(self) -> bool {
        matches!(self, DeviceType::Zfs)
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Linux
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Linux => write!(f, "linux"),
            DeviceType::Zfs => write!(f, "zfs"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linux" => Ok(DeviceType::Linux),
            "zfs" => Ok(DeviceType::Zfs),
            other => Err(Error::UnsupportedDeviceType(other.to_string())),
        }
    }
}

/// Backing filesystem of a Lustre target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackingFs {
    Ldiskfs,
    Zfs,
}

impl Default for BackingFs {
    fn default() -> Self {
        BackingFs::Ldiskfs
    }
}

impl std::fmt::Display for BackingFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackingFs::Ldiskfs => write!(f, "ldiskfs"),
            BackingFs::Zfs => write!(f, "zfs"),
        }
    }
}

impl FromStr for BackingFs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ldiskfs" => Ok(BackingFs::Ldiskfs),
            "zfs" => Ok(BackingFs::Zfs),
            other => Err(Error::UnsupportedFilesystemType(other.to_string())),
        }
    }
}

// =============================================================================
// Target Info
// =============================================================================

/// Locally stored facts about a target, keyed by target UUID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// Device path (block device or `pool/dataset`)
    pub device: String,
    /// Where the target is mounted
    pub mount_point: String,
    /// Backing filesystem type
    pub backfstype: BackingFs,
    /// Device type
    pub device_type: DeviceType,
}

impl TargetInfo {
    /// Pool name of a pool-backed device: the first path segment
    pub fn pool_name(&self) -> &str {
        pool_name(&self.device)
    }
}

/// First path segment of a `pool/dataset` device path
pub fn pool_name(device: &str) -> &str {
    device.split('/').next().unwrap_or(device)
}

// =============================================================================
// Placement Preference
// =============================================================================

/// Location preference class of a target constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    Primary,
    Secondary,
}

impl Preference {
    /// Constraint score for this preference
    pub fn score(self) -> u32 {
        match self {
            Preference::Primary => 20,
            Preference::Secondary => 10,
        }
    }

    /// Preference encoded in a constraint id, if any
    pub fn from_constraint_id(ha_label: &str, id: &str) -> Option<Self> {
        [Preference::Primary, Preference::Secondary]
            .into_iter()
            .find(|p| constraint_id(ha_label, *p) == id)
    }
}

impl std::fmt::Display for Preference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preference::Primary => write!(f, "primary"),
            Preference::Secondary => write!(f, "secondary"),
        }
    }
}

// =============================================================================
// Resource Role
// =============================================================================

/// Desired role of a resource in the cluster manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRole {
    Started,
    Stopped,
}

impl TargetRole {
    pub fn from_running(running: bool) -> Self {
        if running {
            TargetRole::Started
        } else {
            TargetRole::Stopped
        }
    }
}

impl std::fmt::Display for TargetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetRole::Started => write!(f, "Started"),
            TargetRole::Stopped => write!(f, "Stopped"),
        }
    }
}

// =============================================================================
// Resource Agents
// =============================================================================

/// A resource agent, identified by class, provider and type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentType {
    pub class: &'static str,
    pub provider: &'static str,
    pub kind: &'static str,
}

impl AgentType {
    /// Lustre filesystem mount agent
    pub const LUSTRE: AgentType = AgentType {
        class: "ocf",
        provider: "lustre",
        kind: "Lustre",
    };

    /// Pool import agent
    pub const ZFS: AgentType = AgentType {
        class: "ocf",
        provider: "chroma",
        kind: "ZFS",
    };

    /// Monolithic legacy target agent (import + mount in one resource)
    pub const LEGACY_TARGET: AgentType = AgentType {
        class: "ocf",
        provider: "chroma",
        kind: "Target",
    };

    /// Agents whose resources count as targets in live placement
    pub const TARGET_AGENTS: [AgentType; 3] =
        [AgentType::LUSTRE, AgentType::ZFS, AgentType::LEGACY_TARGET];

    /// Name as reported by the live status document (`ocf::lustre:Lustre`)
    pub fn status_name(&self) -> String {
        format!("{}::{}:{}", self.class, self.provider, self.kind)
    }

    /// Whether a primitive's attributes describe this agent
    pub fn matches(&self, class: &str, provider: &str, kind: &str) -> bool {
        self.class == class && self.provider == provider && self.kind == kind
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.class, self.provider, self.kind)
    }
}

// =============================================================================
// Naming
// =============================================================================

/// Id of the pool-import member of a target's group
pub fn zfs_resource_id(ha_label: &str) -> String {
    format!("{}-zfs", ha_label)
}

/// Id of the group holding a pool-backed target
pub fn group_id(ha_label: &str) -> String {
    format!("group-{}", ha_label)
}

/// Id of a target's location constraint for a preference class
pub fn constraint_id(ha_label: &str, preference: Preference) -> String {
    format!("{}-{}", ha_label, preference)
}
