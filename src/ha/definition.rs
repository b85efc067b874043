//! Resource Definition Builder
//!
//! Builds the resource fragment for a target: a single Lustre primitive for
//! plain block devices, or for pool-backed devices a group holding the pool
//! import primitive followed by the Lustre primitive. Group members start in
//! order and stop in reverse, so the pool is imported before the mount and
//! exported after the unmount.

use crate::domain::cluster::OperationTimeouts;
use crate::domain::ports::ClusterManagerRef;
use crate::domain::target::{group_id, zfs_resource_id, AgentType, TargetInfo, TargetRole};
use crate::pacemaker::metadata::format_duration;
use crate::pacemaker::xml::{attribute_set, Element};
use std::time::Duration;
use tracing::warn;

/// Operation timeouts used when the Lustre agent's metadata is unavailable
pub const LUSTRE_FALLBACK_TIMEOUTS: OperationTimeouts = OperationTimeouts {
    start: Duration::from_secs(120),
    stop: Duration::from_secs(120),
    monitor: Duration::from_secs(60),
    monitor_interval: Duration::from_secs(20),
};

/// Operation timeouts used when the pool agent's metadata is unavailable
pub const ZFS_FALLBACK_TIMEOUTS: OperationTimeouts = OperationTimeouts {
    start: Duration::from_secs(90),
    stop: Duration::from_secs(90),
    monitor: Duration::from_secs(60),
    monitor_interval: Duration::from_secs(20),
};

pub struct ResourceDefinitionBuilder {
    cluster: ClusterManagerRef,
}

impl ResourceDefinitionBuilder {
    pub fn new(cluster: ClusterManagerRef) -> Self {
        Self { cluster }
    }

    /// Build the resource fragment for a target. A disabled definition carries
    /// `target-role=Stopped` so the cluster creates it inert.
    pub async fn build(&self, ha_label: &str, info: &TargetInfo, enabled: bool) -> Element {
        if !info.device_type.requires_import() {
            let lustre = self
                .primitive(ha_label, &AgentType::LUSTRE, &[
                    ("target", info.device.as_str()),
                    ("mountpoint", info.mount_point.as_str()),
                ])
                .await;
            return with_role(lustre, enabled);
        }

        let device = resolve_device(&info.device).await;
        let zfs_id = zfs_resource_id(ha_label);
        let zfs = self
            .primitive(&zfs_id, &AgentType::ZFS, &[("pool", info.pool_name())])
            .await;
        let lustre = self
            .primitive(ha_label, &AgentType::LUSTRE, &[
                ("target", device.as_str()),
                ("mountpoint", info.mount_point.as_str()),
            ])
            .await;

        let group = with_role(Element::new("group").attr("id", group_id(ha_label)), enabled);
        group.child(zfs).child(lustre)
    }

    async fn primitive(&self, id: &str, agent: &AgentType, params: &[(&str, &str)]) -> Element {
        let timeouts = self.timeouts(agent).await;
        Element::new("primitive")
            .attr("id", id)
            .attr("class", agent.class)
            .attr("provider", agent.provider)
            .attr("type", agent.kind)
            .child(attribute_set("instance_attributes", id, params))
            .child(operations(id, &timeouts))
    }

    /// Agent-declared timeouts, or fallbacks when the metadata query fails
    async fn timeouts(&self, agent: &AgentType) -> OperationTimeouts {
        let fallback = if *agent == AgentType::ZFS {
            ZFS_FALLBACK_TIMEOUTS
        } else {
            LUSTRE_FALLBACK_TIMEOUTS
        };

        match self.cluster.agent_metadata(agent).await {
            Ok(declared) => declared.or_defaults(fallback),
            Err(e) => {
                warn!(%agent, error = %e, "agent metadata unavailable, using default operation timeouts");
                fallback
            }
        }
    }
}

/// Attach `target-role=Stopped` to a disabled resource
fn with_role(element: Element, enabled: bool) -> Element {
    if enabled {
        return element;
    }
    let id = element.attribute("id").unwrap_or_default().to_string();
    let role = TargetRole::Stopped.to_string();
    element.child(attribute_set("meta_attributes", &id, &[("target-role", role.as_str())]))
}

fn operations(id: &str, timeouts: &OperationTimeouts) -> Element {
    let op = |name: &str, interval: Duration, timeout: Duration| {
        let interval = format_duration(interval);
        Element::new("op")
            .attr("id", format!("{}-{}-interval-{}", id, name, interval))
            .attr("name", name)
            .attr("interval", interval)
            .attr("timeout", format_duration(timeout))
    };

    Element::new("operations")
        .child(op("start", Duration::ZERO, timeouts.start))
        .child(op("stop", Duration::ZERO, timeouts.stop))
        .child(op("monitor", timeouts.monitor_interval, timeouts.monitor))
}

/// Canonical path of a device, or the path unchanged when it cannot be resolved
async fn resolve_device(device: &str) -> String {
    match tokio::fs::canonicalize(device).await {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(_) => device.to_string(),
    }
}
