//! Resource Controller
//!
//! Enables, disables and moves target resources and waits for the cluster to
//! act on each request.

use crate::config::ConvergencePolicy;
use crate::domain::cluster::Locations;
use crate::domain::ports::ClusterManagerRef;
use crate::domain::target::{constraint_id, group_id, zfs_resource_id, AgentType, Preference, TargetRole};
use crate::error::{Error, Result};
use crate::ha::convergence::{await_convergence, PlacementSource};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

pub struct ResourceController {
    cluster: ClusterManagerRef,
    policy: ConvergencePolicy,
    move_timeout: Duration,
}

impl ResourceController {
    pub fn new(cluster: ClusterManagerRef, policy: ConvergencePolicy, move_timeout: Duration) -> Self {
        Self {
            cluster,
            policy,
            move_timeout,
        }
    }

    pub fn cluster(&self) -> &ClusterManagerRef {
        &self.cluster
    }

    pub async fn exists(&self, ha_label: &str) -> Result<bool> {
        self.cluster.resource_exists(ha_label).await
    }

    /// Node a target is running on
    pub async fn location(&self, ha_label: &str) -> Option<String> {
        self.locations().await.remove(ha_label).flatten()
    }

    /// Set a resource's desired role
    pub async fn set_running(&self, id: &str, running: bool) -> Result<()> {
        let role = TargetRole::from_running(running);
        self.cluster.set_target_role(id, role).await?;
        info!(resource = id, %role, "set target role");
        Ok(())
    }

    /// Wait for a target to reach the requested running state
    pub async fn await_convergence(&self, ha_label: &str, want_running: bool) -> bool {
        await_convergence(self, &self.policy, ha_label, want_running).await
    }

    /// Node pinned by a target's constraint of one preference class
    pub async fn constraint_node(&self, ha_label: &str, preference: Preference) -> Result<Option<String>> {
        let cib = self.cluster.cib().await?;
        Ok(cib
            .location(&constraint_id(ha_label, preference))
            .map(|c| c.node.clone()))
    }

    /// Start a target and return the node it runs on
    pub async fn start_target(&self, ha_label: &str) -> Result<String> {
        if !self.exists(ha_label).await? {
            return Err(Error::ResourceNotFound {
                ha_label: ha_label.to_string(),
            });
        }

        if let Some(current) = self.location(ha_label).await {
            if let Some(primary) = self.constraint_node(ha_label, Preference::Primary).await? {
                if primary != current {
                    info!(ha_label, %current, %primary, "target running away from its primary, moving");
                    self.move_target(ha_label, &primary).await?;
                    return Ok(primary);
                }
            }
        }

        let zfs_id = zfs_resource_id(ha_label);
        let grouped = self.exists(&zfs_id).await?;
        let top = if grouped { group_id(ha_label) } else { ha_label.to_string() };
        let attempts = self.policy.attempts();

        for attempt in 1..=attempts {
            // Enabling only a member can leave a disabled group holding it down
            if grouped {
                self.set_running(&zfs_id, true).await?;
            }
            self.set_running(ha_label, true).await?;
            if grouped {
                self.set_running(&top, true).await?;
            }

            if self.await_convergence(ha_label, true).await {
                return self.location(ha_label).await.ok_or_else(|| Error::LocateFailed {
                    ha_label: ha_label.to_string(),
                });
            }

            warn!(ha_label, attempt, attempts, "target failed to start, disabling");
            if let Err(e) = self.set_running(&top, false).await {
                error!(ha_label, error = %e, "failed to disable target after failed start");
            }
        }

        Err(Error::ConvergenceTimeout {
            ha_label: ha_label.to_string(),
            action: "start".to_string(),
        })
    }

    pub async fn stop_target(&self, ha_label: &str) -> Result<()> {
        // Disabling the group stops every member whatever its own role
        let top = if self.exists(&zfs_resource_id(ha_label)).await? {
            group_id(ha_label)
        } else {
            ha_label.to_string()
        };

        let attempts = self.policy.attempts();
        for attempt in 1..=attempts {
            self.set_running(&top, false).await?;
            if self.await_convergence(ha_label, false).await {
                return Ok(());
            }
            warn!(ha_label, attempt, attempts, "target failed to stop");
        }

        Err(Error::ConvergenceTimeout {
            ha_label: ha_label.to_string(),
            action: "stop".to_string(),
        })
    }

    /// Move a target to `node`, then drop the pin the move creates
    pub async fn move_target(&self, ha_label: &str, node: &str) -> Result<()> {
        debug!(ha_label, locations = ?self.locations().await, "placement before move");

        self.cluster.cleanup(ha_label).await?;
        let zfs_id = zfs_resource_id(ha_label);
        if self.exists(&zfs_id).await? {
            self.cluster.cleanup(&zfs_id).await?;
        }

        self.cluster.move_resource(ha_label, node).await?;

        let deadline = Instant::now() + self.move_timeout;
        let arrived = loop {
            if self.location(ha_label).await.as_deref() == Some(node) {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }
            sleep(self.policy.poll_interval()).await;
        };

        self.cluster.clear_move(ha_label, node).await?;

        if !arrived {
            warn!(ha_label, node, "target did not arrive on destination node");
            return Err(Error::MoveTimeout {
                ha_label: ha_label.to_string(),
                node: node.to_string(),
            });
        }
        info!(ha_label, node, "moved target");
        Ok(())
    }

    /// Move a target to its secondary node
    pub async fn failover(&self, ha_label: &str) -> Result<()> {
        self.move_to_preferred(ha_label, Preference::Secondary).await
    }

    /// Move a target back to its primary node
    pub async fn failback(&self, ha_label: &str) -> Result<()> {
        self.move_to_preferred(ha_label, Preference::Primary).await
    }

    async fn move_to_preferred(&self, ha_label: &str, preference: Preference) -> Result<()> {
        let node = self
            .constraint_node(ha_label, preference)
            .await?
            .ok_or_else(|| Error::ConstraintNotFound {
                ha_label: ha_label.to_string(),
                preference: preference.to_string(),
            })?;
        self.move_target(ha_label, &node).await
    }
}

#[async_trait]
impl PlacementSource for ResourceController {
    /// An unreachable cluster reports as nothing running
    async fn locations(&self) -> Locations {
        let states = match self.cluster.resource_status().await {
            Ok(states) => states,
            Err(e) => {
                debug!(error = %e, "cluster status unavailable");
                return Locations::new();
            }
        };

        let agents: Vec<String> = AgentType::TARGET_AGENTS
            .iter()
            .map(AgentType::status_name)
            .collect();

        states
            .iter()
            .filter(|s| agents.contains(&s.agent))
            .map(|s| (s.id.clone(), s.placement().map(str::to_string)))
            .collect()
    }
}
