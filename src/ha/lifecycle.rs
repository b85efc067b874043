//! Target Lifecycle Actions
//!
//! The externally invokable action surface. Each [`TargetAction`] is one
//! self-contained call returning a single [`ActionValue`] or error.

use crate::config::AgentConfig;
use crate::devices::{HostDevices, ProcMounts};
use crate::domain::cluster::CibScope;
use crate::domain::ports::{ClusterManagerRef, DeviceFactoryRef, MountTableRef};
use crate::domain::target::{group_id, BackingFs, DeviceType, Preference, TargetInfo};
use crate::error::{Error, OcfStatus, Result};
use crate::ha::constraints::ConstraintManager;
use crate::ha::controller::ResourceController;
use crate::ha::convert::{ConversionReport, LegacyConverter};
use crate::ha::definition::ResourceDefinitionBuilder;
use crate::ha::mount::MountController;
use crate::pacemaker::xml::Element;
use crate::pacemaker::PacemakerCli;
use crate::shell::HostExecutor;
use crate::store::{DirectoryStore, TargetStore};
use clap::Subcommand;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

// =============================================================================
// Action Surface
// =============================================================================

/// Lifecycle actions
#[derive(Debug, Clone, Subcommand)]
pub enum TargetAction {
    /// Record a target's device and mount point on this node
    ConfigureTargetStore {
        #[arg(long)]
        device: String,
        #[arg(long)]
        uuid: String,
        #[arg(long)]
        mount_point: String,
        #[arg(long, default_value = "ldiskfs")]
        backfstype: BackingFs,
        #[arg(long, default_value = "linux")]
        device_type: DeviceType,
    },

    /// Forget a target and remove its mount point
    UnconfigureTargetStore {
        #[arg(long)]
        uuid: String,
    },

    /// Define the target's cluster resource (primary) and pin it to this node
    ConfigureTargetHa {
        #[arg(long)]
        primary: bool,
        #[arg(long)]
        device: String,
        #[arg(long)]
        ha_label: String,
        #[arg(long)]
        uuid: String,
        #[arg(long)]
        mount_point: String,
    },

    /// Remove the target's pin (and, on the primary, its resource)
    UnconfigureTargetHa {
        #[arg(long)]
        primary: bool,
        #[arg(long)]
        ha_label: String,
    },

    /// Import and mount a target (resource agent start)
    MountTarget {
        #[arg(long)]
        uuid: String,
        #[arg(long)]
        pacemaker_ha_operation: bool,
    },

    /// Unmount and export a target (resource agent stop)
    UnmountTarget {
        #[arg(long)]
        uuid: String,
    },

    /// Whether a target is mounted here (resource agent monitor)
    #[command(alias = "target-running")]
    IsRunning {
        #[arg(long)]
        uuid: String,
    },

    StartTarget {
        #[arg(long)]
        ha_label: String,
    },

    StopTarget {
        #[arg(long)]
        ha_label: String,
    },

    FailoverTarget {
        #[arg(long)]
        ha_label: String,
    },

    FailbackTarget {
        #[arg(long)]
        ha_label: String,
    },

    /// Rewrite legacy target resources into the split form
    ConvertTargets {
        #[arg(long)]
        force: bool,
    },

    /// Remove a filesystem's configuration logs from the management target
    PurgeConfiguration {
        #[arg(long)]
        mgs_device_path: String,
        #[arg(long)]
        mgs_device_type: DeviceType,
        #[arg(long)]
        filesystem_name: String,
    },

    /// Stop and unconfigure every target in the cluster
    ClearTargets {
        #[arg(long)]
        force: bool,
    },
}

/// Value of a successful action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActionValue {
    None,
    Node(String),
    Running(bool),
    Conversion(ConversionReport),
}

impl ActionValue {
    /// False only for a monitor that found the target not running
    pub fn is_running(&self) -> bool {
        !matches!(self, ActionValue::Running(false))
    }
}

/// Status an invoking shim reports for an action's outcome.
///
/// Only a monitor answering "not running" yields `NotRunning`; an unknown
/// target already answers that way, so every error is a generic failure.
pub fn action_status(outcome: &Result<ActionValue>) -> OcfStatus {
    match outcome {
        Ok(value) if value.is_running() => OcfStatus::Success,
        Ok(_) => OcfStatus::NotRunning,
        Err(_) => OcfStatus::GenericError,
    }
}

// =============================================================================
// Target Manager
// =============================================================================

pub struct TargetManager {
    store: TargetStore,
    cluster: ClusterManagerRef,
    controller: Arc<ResourceController>,
    builder: ResourceDefinitionBuilder,
    constraints: ConstraintManager,
    mounts: MountController,
    converter: LegacyConverter,
    devices: DeviceFactoryRef,
    node_name: Option<String>,
}

impl TargetManager {
    pub fn new(
        config: &AgentConfig,
        store: TargetStore,
        cluster: ClusterManagerRef,
        devices: DeviceFactoryRef,
        mount_table: MountTableRef,
    ) -> Self {
        let controller = Arc::new(ResourceController::new(
            cluster.clone(),
            config.convergence.clone(),
            config.move_timeout(),
        ));

        Self {
            mounts: MountController::new(
                store.clone(),
                cluster.clone(),
                devices.clone(),
                mount_table,
                config.mount.clone(),
            ),
            converter: LegacyConverter::new(controller.clone(), store.clone()),
            builder: ResourceDefinitionBuilder::new(cluster.clone()),
            constraints: ConstraintManager::new(cluster.clone()),
            controller,
            store,
            cluster,
            devices,
            node_name: config.node_name.clone(),
        }
    }

    /// Manager wired to this host's store, cluster tools and devices
    pub fn for_host(config: &AgentConfig) -> Self {
        let executor = HostExecutor::new();
        Self::new(
            config,
            TargetStore::new(Arc::new(DirectoryStore::new(&config.store_dir))),
            Arc::new(PacemakerCli::new(executor.clone(), config.pacemaker.clone())),
            Arc::new(HostDevices::new(executor)),
            Arc::new(ProcMounts::new(&config.mounts_path)),
        )
    }

    pub async fn run(&self, action: TargetAction) -> Result<ActionValue> {
        match action {
            TargetAction::ConfigureTargetStore {
                device,
                uuid,
                mount_point,
                backfstype,
                device_type,
            } => {
                let info = TargetInfo {
                    device,
                    mount_point,
                    backfstype,
                    device_type,
                };
                self.configure_target_store(&uuid, &info).await?;
                Ok(ActionValue::None)
            }
            TargetAction::UnconfigureTargetStore { uuid } => {
                self.unconfigure_target_store(&uuid).await?;
                Ok(ActionValue::None)
            }
            TargetAction::ConfigureTargetHa {
                primary,
                device,
                ha_label,
                uuid,
                mount_point,
            } => {
                self.configure_target_ha(primary, &device, &ha_label, &uuid, &mount_point)
                    .await?;
                Ok(ActionValue::None)
            }
            TargetAction::UnconfigureTargetHa { primary, ha_label } => {
                self.unconfigure_target_ha(primary, &ha_label).await?;
                Ok(ActionValue::None)
            }
            TargetAction::MountTarget {
                uuid,
                pacemaker_ha_operation,
            } => {
                self.mounts.mount(&uuid, pacemaker_ha_operation).await?;
                Ok(ActionValue::None)
            }
            TargetAction::UnmountTarget { uuid } => {
                self.mounts.unmount(&uuid).await?;
                Ok(ActionValue::None)
            }
            TargetAction::IsRunning { uuid } => {
                Ok(ActionValue::Running(self.mounts.is_running(&uuid).await))
            }
            TargetAction::StartTarget { ha_label } => {
                Ok(ActionValue::Node(self.controller.start_target(&ha_label).await?))
            }
            TargetAction::StopTarget { ha_label } => {
                self.controller.stop_target(&ha_label).await?;
                Ok(ActionValue::None)
            }
            TargetAction::FailoverTarget { ha_label } => {
                self.controller.failover(&ha_label).await?;
                Ok(ActionValue::None)
            }
            TargetAction::FailbackTarget { ha_label } => {
                self.controller.failback(&ha_label).await?;
                Ok(ActionValue::None)
            }
            TargetAction::ConvertTargets { force } => {
                Ok(ActionValue::Conversion(self.converter.convert(force).await?))
            }
            TargetAction::PurgeConfiguration {
                mgs_device_path,
                mgs_device_type,
                filesystem_name,
            } => {
                self.devices
                    .block_device(mgs_device_type, &mgs_device_path)
                    .purge_filesystem_configuration(&filesystem_name)
                    .await?;
                Ok(ActionValue::None)
            }
            TargetAction::ClearTargets { force } => {
                self.clear_targets(force).await?;
                Ok(ActionValue::None)
            }
        }
    }

    async fn configure_target_store(&self, uuid: &str, info: &TargetInfo) -> Result<()> {
        self.store.update(uuid, info).await?;
        info!(uuid, device = %info.device, mount_point = %info.mount_point, "stored target configuration");
        Ok(())
    }

    async fn unconfigure_target_store(&self, uuid: &str) -> Result<()> {
        match self.store.get(uuid).await {
            Ok(info) => {
                if let Err(e) = tokio::fs::remove_dir(&info.mount_point).await {
                    warn!(uuid, mount_point = %info.mount_point, error = %e, "cannot remove target mount point");
                }
            }
            Err(e) => warn!(uuid, error = %e, "cannot retrieve target information"),
        }
        self.store.delete(uuid).await
    }

    async fn configure_target_ha(
        &self,
        primary: bool,
        device: &str,
        ha_label: &str,
        uuid: &str,
        mount_point: &str,
    ) -> Result<()> {
        mkdir_concurrent(Path::new(mount_point)).await?;

        let preference = if primary {
            let stored = self.store.get(uuid).await?;
            if self.controller.exists(ha_label).await? {
                if stored.device == device && stored.mount_point == mount_point {
                    info!(ha_label, "target resource already configured");
                    return Ok(());
                }
                return Err(Error::ResourceConflict {
                    ha_label: ha_label.to_string(),
                });
            }

            let requested = TargetInfo {
                device: device.to_string(),
                mount_point: mount_point.to_string(),
                ..stored
            };
            let definition = self.builder.build(ha_label, &requested, false).await;
            self.cluster.create(CibScope::Resources, &definition).await?;
            info!(ha_label, uuid, device_type = %requested.device_type, "created target resource");
            Preference::Primary
        } else {
            Preference::Secondary
        };

        let node = match &self.node_name {
            Some(node) => node.clone(),
            None => self.cluster.local_node().await?,
        };
        self.constraints.add_priority(ha_label, &node, preference).await
    }

    async fn unconfigure_target_ha(&self, primary: bool, ha_label: &str) -> Result<()> {
        if let Some(node) = self.controller.location(ha_label).await {
            warn!(ha_label, %node, "refusing to unconfigure a running target");
            return Err(Error::TargetStillRunning {
                ha_label: ha_label.to_string(),
            });
        }

        if !primary {
            return self
                .constraints
                .remove_priority(ha_label, Preference::Secondary)
                .await;
        }

        self.constraints
            .remove_priority(ha_label, Preference::Primary)
            .await?;

        let group = group_id(ha_label);
        let resource = if self.controller.exists(&group).await? {
            Element::new("group").attr("id", group)
        } else {
            Element::new("primitive").attr("id", ha_label)
        };
        self.cluster.delete(CibScope::Resources, &resource).await?;
        info!(ha_label, "removed target resource");
        Ok(())
    }

    async fn clear_targets(&self, force: bool) -> Result<()> {
        if !force {
            warn!(
                "clear-targets forcibly unmounts and unconfigures every Lustre target on every \
                 node of this HA domain; data loss may occur. Supply --force to proceed."
            );
            return Err(Error::ForceRequired {
                action: "clear-targets".to_string(),
            });
        }

        let mut failed = Vec::new();
        for ha_label in self.cluster.cib().await?.target_labels() {
            info!(ha_label = %ha_label, "stopping target");
            if let Err(e) = self.controller.stop_target(&ha_label).await {
                error!(ha_label = %ha_label, error = %e, "failed to stop target");
                failed.push(ha_label);
                continue;
            }
            info!(ha_label = %ha_label, "unconfiguring target");
            if let Err(e) = self.unconfigure_target_ha(true, &ha_label).await {
                error!(ha_label = %ha_label, error = %e, "failed to unconfigure target");
                failed.push(ha_label);
            }
        }

        if !failed.is_empty() {
            return Err(Error::ClearIncomplete { failed });
        }
        Ok(())
    }
}

/// Create a directory and its parent, tolerating concurrent creation of a
/// shared parent by another invocation
async fn mkdir_concurrent(path: &Path) -> Result<()> {
    let path = path
        .to_str()
        .map(|s| Path::new(s.trim_end_matches('/')))
        .unwrap_or(path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_silent(parent).await?;
    }
    create_dir_silent(path).await
}

async fn create_dir_silent(path: &Path) -> Result<()> {
    match tokio::fs::create_dir_all(path).await {
        Err(e) if e.kind() != ErrorKind::AlreadyExists => Err(e.into()),
        _ => Ok(()),
    }
}
