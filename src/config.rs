//! Agent Configuration
//!
//! Tunables for the agent: where target records live, the convergence and
//! move timeouts, pool import retries, and the cluster tool exit codes that
//! carry special meaning. Every field has a default so an empty (or absent)
//! configuration file yields a working agent.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Agent Configuration
// =============================================================================

/// Top-level agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Root directory of the local configuration store
    pub store_dir: PathBuf,
    /// Cluster node name of this host; queried from the cluster when unset
    pub node_name: Option<String>,
    /// Convergence wait policy
    pub convergence: ConvergencePolicy,
    /// Ceiling on waiting for a moved target to arrive
    pub move_timeout_secs: u64,
    /// Pool import behaviour
    pub mount: MountConfig,
    /// Cluster tool settings
    pub pacemaker: PacemakerConfig,
    /// Mount table consulted by the monitor probe
    pub mounts_path: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("/var/lib/chroma"),
            node_name: None,
            convergence: ConvergencePolicy::default(),
            move_timeout_secs: 100,
            mount: MountConfig::default(),
            pacemaker: PacemakerConfig::default(),
            mounts_path: PathBuf::from("/proc/mounts"),
        }
    }
}

impl AgentConfig {
    /// Load from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Parse from YAML text; an empty document yields defaults
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| Error::Configuration(e.to_string()))
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.move_timeout_secs)
    }
}

// =============================================================================
// Convergence Policy
// =============================================================================

/// Timeouts for waiting on the cluster to reach a requested state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergencePolicy {
    /// Hard ceiling on the whole wait
    pub master_timeout_secs: u64,
    /// Wait ends early if the running resource count stays unchanged this long
    pub activity_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Start or stop requests issued before giving up
    pub attempts: u32,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            master_timeout_secs: 1200,
            activity_timeout_secs: 120,
            poll_interval_secs: 1,
            attempts: 4,
        }
    }
}

impl ConvergencePolicy {
    pub fn master_timeout(&self) -> Duration {
        Duration::from_secs(self.master_timeout_secs)
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.activity_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

// =============================================================================
// Mount Configuration
// =============================================================================

/// Pool import retry behaviour for HA-triggered mounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub import_retries: u32,
    pub import_retry_interval_secs: u64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            import_retries: 60,
            import_retry_interval_secs: 1,
        }
    }
}

impl MountConfig {
    pub fn import_retry_interval(&self) -> Duration {
        Duration::from_secs(self.import_retry_interval_secs)
    }
}

// =============================================================================
// Pacemaker Configuration
// =============================================================================

/// Exit codes of the cluster tools and CIB update retry bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacemakerConfig {
    /// `cibadmin --create` status for an object that already exists
    pub duplicate_exit_code: i32,
    /// Statuses meaning the addressed object does not exist
    pub absent_exit_codes: Vec<i32>,
    /// Transient `cibadmin` statuses worth retrying
    pub cib_retry_exit_codes: Vec<i32>,
    pub cib_retry_timeout_secs: u64,
}

impl Default for PacemakerConfig {
    fn default() -> Self {
        Self {
            duplicate_exit_code: 76,
            absent_exit_codes: vec![6, 105, 234],
            cib_retry_exit_codes: vec![10, 41, 62, 107],
            cib_retry_timeout_secs: 120,
        }
    }
}

impl PacemakerConfig {
    pub fn is_absent(&self, rc: i32) -> bool {
        self.absent_exit_codes.contains(&rc)
    }

    pub fn is_retryable(&self, rc: i32) -> bool {
        self.cib_retry_exit_codes.contains(&rc)
    }

    pub fn cib_retry_timeout(&self) -> Duration {
        Duration::from_secs(self.cib_retry_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.store_dir, PathBuf::from("/var/lib/chroma"));
        assert_eq!(config.convergence.master_timeout(), Duration::from_secs(1200));
        assert_eq!(config.convergence.activity_timeout(), Duration::from_secs(120));
        assert_eq!(config.move_timeout(), Duration::from_secs(100));
        assert_eq!(config.mount.import_retries, 60);
        assert_eq!(config.convergence.attempts(), 4);
        assert!(config.pacemaker.is_absent(105));
        assert!(!config.pacemaker.is_absent(76));
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
node_name: oss1
convergence:
  activity_timeout_secs: 300
pacemaker:
  duplicate_exit_code: 21
"#;
        let config = AgentConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.node_name.as_deref(), Some("oss1"));
        assert_eq!(config.convergence.activity_timeout_secs, 300);
        assert_eq!(config.convergence.master_timeout_secs, 1200);
        assert_eq!(config.pacemaker.duplicate_exit_code, 21);
        assert_eq!(config.pacemaker.cib_retry_exit_codes, vec![10, 41, 62, 107]);
    }

    #[test]
    fn test_empty_and_invalid_yaml() {
        assert_eq!(AgentConfig::from_yaml("  \n").unwrap(), AgentConfig::default());
        assert_matches!(
            AgentConfig::from_yaml("convergence: [1, 2]"),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(&path, "move_timeout_secs: 30\n").unwrap();

        let config = AgentConfig::from_file(&path).unwrap();
        assert_eq!(config.move_timeout_secs, 30);
        assert!(AgentConfig::from_file(&dir.path().join("missing.yaml")).is_err());
    }
}
