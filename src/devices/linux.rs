//! Linux Block Device
//!
//! Plain block devices are visible on every node that can see the disk, so
//! import and export do nothing.

use crate::domain::ports::BlockDevice;
use crate::error::{Error, Result};
use crate::shell::{ExecutorRef, Invocation};
use async_trait::async_trait;
use tracing::info;

/// A directly attached block device
pub struct LinuxDevice {
    executor: ExecutorRef,
    path: String,
}

impl LinuxDevice {
    pub fn new(executor: ExecutorRef, path: impl Into<String>) -> Self {
        Self {
            executor,
            path: path.into(),
        }
    }
}

#[async_trait]
impl BlockDevice for LinuxDevice {
    fn path(&self) -> &str {
        &self.path
    }

    async fn import(&self, _force: bool) -> Result<()> {
        Ok(())
    }

    async fn export(&self) -> Result<()> {
        Ok(())
    }

    /// Remove the filesystem's configuration logs from an ldiskfs MGS
    async fn purge_filesystem_configuration(&self, filesystem: &str) -> Result<()> {
        let purge_error = |e: Error| Error::Purge {
            device: self.path.clone(),
            filesystem: filesystem.to_string(),
            reason: e.to_string(),
        };

        let listing = self
            .executor
            .try_run(&Invocation::new(
                "debugfs",
                ["-c", "-R", "ls -l CONFIGS/", self.path.as_str()],
            ))
            .await
            .map_err(purge_error)?;

        let logs = config_logs(&listing, filesystem);
        for name in &logs {
            let request = format!("rm CONFIGS/{}", name);
            self.executor
                .try_run(&Invocation::new(
                    "debugfs",
                    ["-w", "-R", request.as_str(), self.path.as_str()],
                ))
                .await
                .map_err(purge_error)?;
        }

        info!(device = %self.path, filesystem, removed = logs.len(), "purged filesystem configuration");
        Ok(())
    }
}

/// Names of a filesystem's logs in a `debugfs ls -l` listing
fn config_logs(listing: &str, filesystem: &str) -> Vec<String> {
    let prefix = format!("{}-", filesystem);
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .filter(|name| name.starts_with(&prefix))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::fake::FakeExecutor;
    use crate::shell::CommandOutput;

    const LISTING: &str = "\
debugfs 1.46.5 (30-Dec-2021)
     12   40755 (2)      0      0    4096 17-Oct-2026 09:12 .
      2   40755 (2)      0      0    4096 17-Oct-2026 09:12 ..
     13  100644 (1)      0      0    9152 17-Oct-2026 09:12 testfs-client
     14  100644 (1)      0      0   12288 17-Oct-2026 09:12 testfs-MDT0000
     15  100644 (1)      0      0    8192 17-Oct-2026 09:12 otherfs-client
     16  100644 (1)      0      0    8192 17-Oct-2026 09:12 params
";

    #[test]
    fn test_config_logs() {
        assert_eq!(
            config_logs(LISTING, "testfs"),
            vec!["testfs-client", "testfs-MDT0000"]
        );
    }

    #[tokio::test]
    async fn test_import_export_are_noops() {
        let fake = FakeExecutor::new();
        let device = LinuxDevice::new(fake.clone(), "/dev/sdb");
        device.import(true).await.unwrap();
        device.export().await.unwrap();
        assert!(fake.commands().is_empty());
    }

    #[tokio::test]
    async fn test_purge_removes_filesystem_logs() {
        let fake = FakeExecutor::with_handler(|inv| {
            if inv.args[0] == "-c" {
                CommandOutput::success(LISTING)
            } else {
                CommandOutput::success("")
            }
        });
        let device = LinuxDevice::new(fake.clone(), "/dev/sdb");
        device.purge_filesystem_configuration("otherfs").await.unwrap();

        assert_eq!(
            fake.commands()[1],
            "debugfs -w -R rm CONFIGS/otherfs-client /dev/sdb"
        );
        assert_eq!(fake.commands().len(), 2);
    }
}
