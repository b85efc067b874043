//! Host Devices
//!
//! Command-backed implementations of the device, filesystem and mount table
//! ports for the node the agent runs on.

pub mod linux;
pub mod lustre;
pub mod mounts;
pub mod zfs;

pub use linux::LinuxDevice;
pub use lustre::LustreFilesystem;
pub use mounts::ProcMounts;
pub use zfs::ZfsPool;

use crate::domain::ports::{BlockDevice, DeviceFactory, Filesystem};
use crate::domain::target::{BackingFs, DeviceType};
use crate::error::Result;
use crate::shell::ExecutorRef;
use std::path::Path;

/// Builds device handles that run their commands through one executor
pub struct HostDevices {
    executor: ExecutorRef,
}

impl HostDevices {
    pub fn new(executor: ExecutorRef) -> Self {
        Self { executor }
    }
}

impl DeviceFactory for HostDevices {
    fn block_device(&self, device_type: DeviceType, path: &str) -> Box<dyn BlockDevice> {
        match device_type {
            DeviceType::Linux => Box::new(LinuxDevice::new(self.executor.clone(), path)),
            DeviceType::Zfs => Box::new(ZfsPool::new(self.executor.clone(), path)),
        }
    }

    fn filesystem(&self, backfstype: BackingFs, device: &str) -> Box<dyn Filesystem> {
        Box::new(LustreFilesystem::new(self.executor.clone(), backfstype, device))
    }
}

/// Remove a filesystem's configuration logs from a mounted `CONFIGS` directory
async fn remove_config_logs(configs: &Path, filesystem: &str) -> Result<usize> {
    let prefix = format!("{}-", filesystem);
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(configs).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
