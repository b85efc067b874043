//! Pacemaker CLI Adapter
//!
//! Implements [`ClusterManager`] by invoking the Pacemaker command line tools.
//! Exit codes that mean "already absent" or "already exists" are translated
//! here so callers see either success or a typed error.

use crate::config::PacemakerConfig;
use crate::domain::cluster::{CibScope, CibSnapshot, DeclaredTimeouts, ResourceState};
use crate::domain::ports::ClusterManager;
use crate::domain::target::{AgentType, TargetRole};
use crate::error::{Error, Result};
use crate::pacemaker::cib::parse_cib;
use crate::pacemaker::metadata::parse_metadata;
use crate::pacemaker::status::parse_status;
use crate::pacemaker::xml::Element;
use crate::shell::{CommandOutput, ExecutorRef, Invocation};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use std::time::Duration;
use tracing::{debug, info, warn};

const CIBADMIN: &str = "cibadmin";
const CRM_RESOURCE: &str = "crm_resource";
const CRM_MON: &str = "crm_mon";
const CRM_ATTRIBUTE: &str = "crm_attribute";
const CRM_NODE: &str = "crm_node";

/// Cluster manager backed by the Pacemaker command line tools
pub struct PacemakerCli {
    executor: ExecutorRef,
    config: PacemakerConfig,
}

impl PacemakerCli {
    pub fn new(executor: ExecutorRef, config: PacemakerConfig) -> Self {
        Self { executor, config }
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: Duration::from_millis(250),
            initial_interval: Duration::from_millis(250),
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
            max_elapsed_time: Some(self.config.cib_retry_timeout()),
            ..ExponentialBackoff::default()
        }
    }

    /// Run `cibadmin`, retrying while it reports a transient status
    async fn cibadmin(&self, args: &[&str]) -> Result<(Invocation, CommandOutput)> {
        let invocation = Invocation::new(CIBADMIN, args.iter().copied());

        let inv = &invocation;
        let executor = &self.executor;
        let config = &self.config;
        let output = backoff::future::retry(self.retry_policy(), move || async move {
            let output = executor.execute(inv).await.map_err(backoff::Error::permanent)?;

            if config.is_retryable(output.rc) {
                debug!(rc = output.rc, command = %inv, "transient cibadmin failure, retrying");
                return Err(backoff::Error::transient(Error::CommandFailed {
                    command: inv.to_string(),
                    rc: output.rc,
                    stdout: output.stdout,
                    stderr: output.stderr,
                }));
            }
            Ok(output)
        })
        .await?;

        Ok((invocation, output))
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<(Invocation, CommandOutput)> {
        let invocation = Invocation::new(program, args.iter().copied());
        let output = self.executor.execute(&invocation).await?;
        Ok((invocation, output))
    }

    async fn try_run(&self, program: &str, args: &[&str]) -> Result<String> {
        let (invocation, output) = self.run(program, args).await?;
        Ok(output.into_result(&invocation)?.stdout)
    }
}

#[async_trait]
impl ClusterManager for PacemakerCli {
    async fn cib(&self) -> Result<CibSnapshot> {
        let (invocation, output) = self.cibadmin(&["--query"]).await?;
        parse_cib(&output.into_result(&invocation)?.stdout)
    }

    async fn resource_status(&self) -> Result<Vec<ResourceState>> {
        let (_, output) = self
            .run(CRM_MON, &["--one-shot", "--inactive", "--as-xml"])
            .await?;
        if !output.is_success() {
            return Err(Error::ClusterUnavailable(format!(
                "crm_mon exited with {}: {}",
                output.rc,
                output.stderr.trim()
            )));
        }
        parse_status(&output.stdout)
    }

    async fn resource_exists(&self, id: &str) -> Result<bool> {
        let (invocation, output) = self.run(CRM_RESOURCE, &["-W", "-r", id]).await?;
        if output.is_success() {
            Ok(true)
        } else if self.config.is_absent(output.rc) {
            Ok(false)
        } else {
            output.into_result(&invocation).map(|_| false)
        }
    }

    async fn create(&self, scope: CibScope, fragment: &Element) -> Result<()> {
        let xml = fragment.render();
        let (invocation, output) = self
            .cibadmin(&["--create", "--scope", scope.as_str(), "--xml-text", &xml])
            .await?;

        if output.rc == self.config.duplicate_exit_code {
            return Err(Error::CibObjectExists {
                id: fragment.attribute("id").unwrap_or_default().to_string(),
            });
        }
        output.into_result(&invocation)?;
        info!(scope = scope.as_str(), id = ?fragment.attribute("id"), "created cluster object");
        Ok(())
    }

    async fn delete(&self, scope: CibScope, fragment: &Element) -> Result<()> {
        let xml = fragment.reference().render();
        let (invocation, output) = self
            .cibadmin(&["--delete", "--scope", scope.as_str(), "--xml-text", &xml])
            .await?;

        if self.config.is_absent(output.rc) {
            debug!(id = ?fragment.attribute("id"), "cluster object already absent");
            return Ok(());
        }
        output.into_result(&invocation)?;
        info!(scope = scope.as_str(), id = ?fragment.attribute("id"), "deleted cluster object");
        Ok(())
    }

    async fn set_target_role(&self, id: &str, role: TargetRole) -> Result<()> {
        let role = role.to_string();
        self.try_run(
            CRM_RESOURCE,
            &[
                "--resource",
                id,
                "--meta",
                "--set-parameter",
                "target-role",
                "--parameter-value",
                &role,
            ],
        )
        .await?;
        Ok(())
    }

    async fn cleanup(&self, id: &str) -> Result<()> {
        self.try_run(CRM_RESOURCE, &["--resource", id, "--cleanup"])
            .await?;
        Ok(())
    }

    async fn move_resource(&self, id: &str, node: &str) -> Result<()> {
        self.try_run(CRM_RESOURCE, &["--resource", id, "--move", "--node", node])
            .await?;
        Ok(())
    }

    async fn clear_move(&self, id: &str, node: &str) -> Result<()> {
        self.try_run(CRM_RESOURCE, &["--resource", id, "--un-move", "--node", node])
            .await?;
        Ok(())
    }

    async fn set_maintenance_mode(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "true" } else { "false" };
        self.try_run(
            CRM_ATTRIBUTE,
            &[
                "--type",
                "crm_config",
                "--name",
                "maintenance-mode",
                "--update",
                value,
            ],
        )
        .await?;
        if enabled {
            warn!("cluster maintenance mode enabled");
        } else {
            info!("cluster maintenance mode disabled");
        }
        Ok(())
    }

    async fn local_node(&self) -> Result<String> {
        let name = self.try_run(CRM_NODE, &["--name"]).await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::ClusterUnavailable(
                "crm_node reported no node name".to_string(),
            ));
        }
        Ok(name.to_string())
    }

    async fn agent_metadata(&self, agent: &AgentType) -> Result<DeclaredTimeouts> {
        let agent = agent.to_string();
        let xml = self
            .try_run(CRM_RESOURCE, &["--show-metadata", &agent])
            .await?;
        parse_metadata(&xml)
    }
}
