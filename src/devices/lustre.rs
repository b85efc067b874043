//! Lustre Filesystem
//!
//! Mounts and unmounts a target's Lustre filesystem and recognises the
//! target's device in the local mount table.

use crate::domain::ports::Filesystem;
use crate::domain::target::BackingFs;
use crate::error::{Error, Result};
use crate::shell::{ExecutorRef, Invocation};
use async_trait::async_trait;
use tracing::info;

/// The Lustre filesystem on a target device
pub struct LustreFilesystem {
    executor: ExecutorRef,
    backfstype: BackingFs,
    device: String,
}

impl LustreFilesystem {
    pub fn new(executor: ExecutorRef, backfstype: BackingFs, device: impl Into<String>) -> Self {
        Self {
            executor,
            backfstype,
            device: device.into(),
        }
    }
}

#[async_trait]
impl Filesystem for LustreFilesystem {
    async fn mount(&self, mount_point: &str) -> Result<()> {
        self.executor
            .try_run(&Invocation::new(
                "mount",
                ["-t", "lustre", self.device.as_str(), mount_point],
            ))
            .await
            .map_err(|e| Error::Mount {
                device: self.device.clone(),
                mount_point: mount_point.to_string(),
                reason: e.to_string(),
            })?;
        info!(device = %self.device, mount_point, "mounted target");
        Ok(())
    }

    async fn umount(&self) -> Result<()> {
        self.executor
            .try_run(&Invocation::new("umount", [self.device.as_str()]))
            .await
            .map_err(|e| Error::Unmount {
                device: self.device.clone(),
                reason: e.to_string(),
            })?;
        info!(device = %self.device, "unmounted target");
        Ok(())
    }

    async fn devices_match(&self, candidate: &str, _uuid: &str) -> bool {
        match self.backfstype {
            // Datasets appear in the mount table under their own name
            BackingFs::Zfs => candidate == self.device,
            BackingFs::Ldiskfs => {
                if candidate == self.device {
                    return true;
                }
                match (
                    tokio::fs::canonicalize(candidate).await,
                    tokio::fs::canonicalize(&self.device).await,
                ) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            }
        }
    }
}
