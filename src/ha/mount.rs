//! Mount Controller
//!
//! Runs on whichever node the cluster chooses when it starts, stops or
//! monitors a legacy target resource. Recovers the target's device and mount
//! point from the local store by UUID.

use crate::config::MountConfig;
use crate::domain::ports::{BlockDevice, ClusterManagerRef, DeviceFactoryRef, MountTableRef};
use crate::error::{Error, Result};
use crate::store::TargetStore;
use tracing::{error, info, warn};

pub struct MountController {
    store: TargetStore,
    cluster: ClusterManagerRef,
    devices: DeviceFactoryRef,
    mounts: MountTableRef,
    config: MountConfig,
}

impl MountController {
    pub fn new(
        store: TargetStore,
        cluster: ClusterManagerRef,
        devices: DeviceFactoryRef,
        mounts: MountTableRef,
        config: MountConfig,
    ) -> Self {
        Self {
            store,
            cluster,
            devices,
            mounts,
            config,
        }
    }

    /// Import the target's device if needed, then mount it.
    ///
    /// `ha_operation` marks a call made by the cluster during failover, where
    /// the pool may still be held by a fenced node: only then are forced
    /// imports and import retries allowed.
    pub async fn mount(&self, uuid: &str, ha_operation: bool) -> Result<()> {
        let info = self.store.get(uuid).await?;
        let device = self.devices.block_device(info.device_type, &info.device);

        if info.device_type.requires_import() {
            self.import_with_retries(device.as_ref(), ha_operation).await?;
        }

        let filesystem = self.devices.filesystem(info.backfstype, &info.device);
        if let Err(mount_err) = filesystem.mount(&info.mount_point).await {
            if info.device_type.requires_import() {
                if let Err(e) = device.export().await {
                    error!(uuid, error = %e, "failed to export device after failed mount");
                }
            }
            return Err(mount_err);
        }

        info!(uuid, mount_point = %info.mount_point, "target mounted");
        Ok(())
    }

    async fn import_with_retries(&self, device: &dyn BlockDevice, ha_operation: bool) -> Result<()> {
        let attempts = self.config.import_retries.max(1);
        let mut attempt = 1;
        loop {
            match import(device, ha_operation).await {
                Ok(()) => return Ok(()),
                Err(e) if !ha_operation || attempt >= attempts => {
                    error!(device = device.path(), attempt, error = %e, "failed to import device");
                    return Err(e);
                }
                Err(e) => {
                    warn!(device = device.path(), attempt, error = %e, "import failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.import_retry_interval()).await;
                }
            }
        }
    }

    /// Unmount and export a target, if a legacy resource still serves it
    pub async fn unmount(&self, uuid: &str) -> Result<()> {
        let cib = self.cluster.cib().await?;
        if !cib.legacy_targets().iter().any(|t| t.uuid == uuid) {
            info!(uuid, "no legacy target resource serves this target, not unmounting");
            return Ok(());
        }

        let info = self.store.get(uuid).await?;
        self.devices
            .filesystem(info.backfstype, &info.device)
            .umount()
            .await?;

        if info.device_type.requires_import() {
            self.devices
                .block_device(info.device_type, &info.device)
                .export()
                .await?;
        }
        info!(uuid, "target unmounted");
        Ok(())
    }

    /// Whether the target is mounted on this node
    pub async fn is_running(&self, uuid: &str) -> bool {
        let info = match self.store.get(uuid).await {
            Ok(info) => info,
            Err(e) => {
                warn!(uuid, error = %e, "cannot read target configuration");
                return false;
            }
        };
        let mounts = match self.mounts.local_mounts().await {
            Ok(mounts) => mounts,
            Err(e) => {
                warn!(uuid, error = %e, "cannot read local mounts");
                return false;
            }
        };

        let filesystem = self.devices.filesystem(info.backfstype, &info.device);
        for mount in mounts.iter().filter(|m| m.mount_point == info.mount_point) {
            if filesystem.devices_match(&mount.device, uuid).await {
                return true;
            }
        }

        warn!(uuid, "did not find mount with matching mount point and device");
        false
    }
}

/// Import once; retry forced when the tool says force would help and the
/// cluster asked for it
async fn import(device: &dyn BlockDevice, ha_operation: bool) -> Result<()> {
    match device.import(false).await {
        Err(Error::DeviceImport { message, .. }) if ha_operation && message.contains("-f") => {
            info!(device = device.path(), "import refused, forcing");
            device.import(true).await
        }
        other => other,
    }
}
