//! ZFS Pool Device
//!
//! Pool-backed targets live on a dataset (`pool/dataset`); the pool must be
//! imported on the node that mounts the target.

use crate::domain::ports::BlockDevice;
use crate::domain::target::pool_name;
use crate::error::{Error, Result};
use crate::shell::{CommandOutput, ExecutorRef, Invocation};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

/// A ZFS pool addressed through one of its datasets
pub struct ZfsPool {
    executor: ExecutorRef,
    dataset: String,
}

impl ZfsPool {
    pub fn new(executor: ExecutorRef, dataset: impl Into<String>) -> Self {
        Self {
            executor,
            dataset: dataset.into(),
        }
    }

    pub fn pool(&self) -> &str {
        pool_name(&self.dataset)
    }

    fn command_error(output: CommandOutput) -> String {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            output.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

#[async_trait]
impl BlockDevice for ZfsPool {
    fn path(&self) -> &str {
        &self.dataset
    }

    async fn import(&self, force: bool) -> Result<()> {
        let mut args = vec!["import"];
        if force {
            args.push("-f");
        }
        args.push(self.pool());

        let output = self
            .executor
            .execute(&Invocation::new("zpool", args))
            .await?;
        if !output.is_success() {
            return Err(Error::DeviceImport {
                device: self.pool().to_string(),
                message: Self::command_error(output),
            });
        }
        info!(pool = self.pool(), force, "imported pool");
        Ok(())
    }

    async fn export(&self) -> Result<()> {
        let output = self
            .executor
            .execute(&Invocation::new("zpool", ["export", self.pool()]))
            .await?;
        if !output.is_success() {
            return Err(Error::DeviceExport {
                device: self.pool().to_string(),
                message: Self::command_error(output),
            });
        }
        info!(pool = self.pool(), "exported pool");
        Ok(())
    }

    async fn purge_filesystem_configuration(&self, filesystem: &str) -> Result<()> {
        let purge_error = |reason: String| Error::Purge {
            device: self.dataset.clone(),
            filesystem: filesystem.to_string(),
            reason,
        };

        let scratch: PathBuf =
            std::env::temp_dir().join(format!("target-ha-purge-{}", self.pool()));
        tokio::fs::create_dir_all(&scratch).await?;
        let scratch_str = scratch.to_string_lossy().into_owned();

        self.executor
            .try_run(&Invocation::new(
                "mount",
                ["-t", "zfs", self.dataset.as_str(), scratch_str.as_str()],
            ))
            .await
            .map_err(|e| purge_error(e.to_string()))?;

        let removed = super::remove_config_logs(&scratch.join("CONFIGS"), filesystem).await;

        let unmounted = self
            .executor
            .try_run(&Invocation::new("umount", [scratch_str.as_str()]))
            .await;
        if let Err(e) = tokio::fs::remove_dir(&scratch).await {
            warn!(path = %scratch.display(), error = %e, "could not remove scratch mount point");
        }

        let removed = removed.map_err(|e| purge_error(e.to_string()))?;
        unmounted.map_err(|e| purge_error(e.to_string()))?;
        info!(dataset = %self.dataset, filesystem, removed, "purged filesystem configuration");
        Ok(())
    }
}
