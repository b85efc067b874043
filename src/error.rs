//! Error types for the Target HA Agent
//!
//! Provides structured error types for every agent component: the target
//! configuration store, command execution, the cluster resource manager,
//! convergence waits, and the storage device collaborators.

use thiserror::Error;

/// Unified error type for the agent
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Target Configuration Store Errors
    // =========================================================================
    #[error("No stored configuration for target {uuid}")]
    TargetNotFound { uuid: String },

    #[error("Invalid configuration identifier: '{key}'")]
    InvalidConfigIdentifier { key: String },

    #[error("Malformed configuration record {section}/{key}: {reason}")]
    ConfigRecord {
        section: String,
        key: String,
        reason: String,
    },

    #[error("Unsupported device type: {0}")]
    UnsupportedDeviceType(String),

    #[error("Unsupported backing filesystem type: {0}")]
    UnsupportedFilesystemType(String),

    // =========================================================================
    // Command Execution Errors
    // =========================================================================
    #[error("Failed to run '{command}': {reason}")]
    CommandSpawn { command: String, reason: String },

    #[error("Error ({rc}) running '{command}': '{stdout}' '{stderr}'")]
    CommandFailed {
        command: String,
        rc: i32,
        stdout: String,
        stderr: String,
    },

    // =========================================================================
    // Cluster Resource Manager Errors
    // =========================================================================
    #[error("Cluster manager unavailable: {0}")]
    ClusterUnavailable(String),

    #[error("Cluster document parse error: {0}")]
    CibParse(String),

    #[error("Cluster object already exists: {id}")]
    CibObjectExists { id: String },

    #[error("Resource not found: {ha_label}")]
    ResourceNotFound { ha_label: String },

    #[error("A resource with the name {ha_label} already exists")]
    ResourceConflict { ha_label: String },

    #[error("Unable to find the {preference} server for '{ha_label}'")]
    ConstraintNotFound { ha_label: String, preference: String },

    #[error("cannot unconfigure-ha: {ha_label} is still running")]
    TargetStillRunning { ha_label: String },

    #[error("Started {ha_label} but now can't locate it")]
    LocateFailed { ha_label: String },

    #[error("{action} is irreversible and requires --force")]
    ForceRequired { action: String },

    // =========================================================================
    // Convergence Errors
    // =========================================================================
    #[error("Failed to {action} target {ha_label}: cluster did not converge")]
    ConvergenceTimeout { ha_label: String, action: String },

    #[error("Failed to move target {ha_label} to node {node}")]
    MoveTimeout { ha_label: String, node: String },

    #[error("Conversion incomplete, failed targets: {}", failed.join(", "))]
    ConversionIncomplete { failed: Vec<String> },

    #[error("Failed to clear targets: {}", failed.join(", "))]
    ClearIncomplete { failed: Vec<String> },

    // =========================================================================
    // Storage Device Errors
    // =========================================================================
    #[error("Error importing pool {device}: {message}")]
    DeviceImport { device: String, message: String },

    #[error("Error exporting pool {device}: {message}")]
    DeviceExport { device: String, message: String },

    #[error("Failed to mount {device} at {mount_point}: {reason}")]
    Mount {
        device: String,
        mount_point: String,
        reason: String,
    },

    #[error("Failed to unmount {device}: {reason}")]
    Unmount { device: String, reason: String },

    #[error("Failed to purge configuration for {filesystem} on {device}: {reason}")]
    Purge {
        device: String,
        filesystem: String,
        reason: String,
    },

    // =========================================================================
    // Parse / IO Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exit status reported to the resource manager when the agent is invoked
/// as a resource-agent callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcfStatus {
    /// OCF_SUCCESS
    Success,
    /// OCF_ERR_GENERIC
    GenericError,
    /// OCF_NOT_RUNNING
    NotRunning,
}

impl OcfStatus {
    /// Process exit code for this status
    pub fn exit_code(self) -> i32 {
        match self {
            OcfStatus::Success => 0,
            OcfStatus::GenericError => 1,
            OcfStatus::NotRunning => 7,
        }
    }
}

impl Error {
    /// Exit code carried by a failed external command, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::CommandFailed { rc, .. } => Some(*rc),
            _ => None,
        }
    }
}

/// Result type alias for the agent
pub type Result<T> = std::result::Result<T, Error>;
