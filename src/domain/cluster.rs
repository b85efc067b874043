//! Cluster Model
//!
//! Owned snapshots of the cluster manager's declarative configuration and
//! live status, as consumed by the HA lifecycle logic.

use crate::domain::target::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// =============================================================================
// Declarative Configuration (CIB)
// =============================================================================

/// Section of the declarative configuration a fragment is submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CibScope {
    Resources,
    Constraints,
}

impl CibScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CibScope::Resources => "resources",
            CibScope::Constraints => "constraints",
        }
    }
}

/// A cluster member as listed in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CibNode {
    pub id: String,
    pub uname: String,
}

/// A primitive resource definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CibPrimitive {
    pub id: String,
    pub class: String,
    pub provider: String,
    pub kind: String,
    /// Instance attributes (`name` -> `value`)
    pub params: BTreeMap<String, String>,
    /// Enclosing group, if the primitive is a group member
    pub group: Option<String>,
}

impl CibPrimitive {
    pub fn is_agent(&self, agent: &AgentType) -> bool {
        agent.matches(&self.class, &self.provider, &self.kind)
    }
}

/// A location constraint pinning a resource to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConstraint {
    pub id: String,
    pub rsc: String,
    pub node: String,
    pub score: String,
}

/// A legacy monolithic target resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTarget {
    pub ha_label: String,
    pub uuid: String,
}

/// Snapshot of the cluster's declarative configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CibSnapshot {
    /// Node id of the elected coordinator (designated controller)
    pub dc_uuid: Option<String>,
    pub nodes: Vec<CibNode>,
    pub primitives: Vec<CibPrimitive>,
    pub locations: Vec<LocationConstraint>,
}

impl CibSnapshot {
    /// Name of the elected coordinator node
    pub fn dc_node(&self) -> Option<&str> {
        let dc_uuid = self.dc_uuid.as_deref()?;
        self.nodes
            .iter()
            .find(|n| n.id == dc_uuid)
            .map(|n| n.uname.as_str())
    }

    pub fn primitive(&self, id: &str) -> Option<&CibPrimitive> {
        self.primitives.iter().find(|p| p.id == id)
    }

    pub fn location(&self, id: &str) -> Option<&LocationConstraint> {
        self.locations.iter().find(|c| c.id == id)
    }

    /// Location constraints applying to a resource
    pub fn locations_for<'a>(
        &'a self,
        rsc: &'a str,
    ) -> impl Iterator<Item = &'a LocationConstraint> + 'a {
        self.locations.iter().filter(move |c| c.rsc == rsc)
    }

    /// Legacy monolithic target resources and the UUIDs they serve
    pub fn legacy_targets(&self) -> Vec<LegacyTarget> {
        self.primitives
            .iter()
            .filter(|p| p.is_agent(&AgentType::LEGACY_TARGET))
            .filter_map(|p| {
                p.params.get("target").map(|uuid| LegacyTarget {
                    ha_label: p.id.clone(),
                    uuid: uuid.clone(),
                })
            })
            .collect()
    }

    /// Labels of every target resource, legacy or split form
    pub fn target_labels(&self) -> Vec<String> {
        self.primitives
            .iter()
            .filter(|p| p.is_agent(&AgentType::LUSTRE) || p.is_agent(&AgentType::LEGACY_TARGET))
            .map(|p| p.id.clone())
            .collect()
    }
}

// =============================================================================
// Live Status
// =============================================================================

/// Live state of one resource as reported by the cluster status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    pub id: String,
    /// Agent in status notation (`ocf::lustre:Lustre`)
    pub agent: String,
    pub role: String,
    pub failed: bool,
    /// First node the resource is reported on
    pub node: Option<String>,
}

impl ResourceState {
    /// Node the resource is running on, if it counts as placed
    pub fn placement(&self) -> Option<&str> {
        if matches!(self.role.as_str(), "Started" | "Stopping") && !self.failed {
            self.node.as_deref()
        } else {
            None
        }
    }
}

/// Live placement: target resource id -> node it runs on (or none)
pub type Locations = BTreeMap<String, Option<String>>;

// =============================================================================
// Agent Operations
// =============================================================================

/// Operation timeouts for one resource agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimeouts {
    pub start: Duration,
    pub stop: Duration,
    pub monitor: Duration,
    pub monitor_interval: Duration,
}

/// Operation timeouts an agent declares in its metadata; absent entries
/// fall back to defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclaredTimeouts {
    pub start: Option<Duration>,
    pub stop: Option<Duration>,
    pub monitor: Option<Duration>,
    pub monitor_interval: Option<Duration>,
}

impl DeclaredTimeouts {
    /// Fill undeclared timeouts from `defaults`
    pub fn or_defaults(&self, defaults: OperationTimeouts) -> OperationTimeouts {
        OperationTimeouts {
            start: self.start.unwrap_or(defaults.start),
            stop: self.stop.unwrap_or(defaults.stop),
            monitor: self.monitor.unwrap_or(defaults.monitor),
            monitor_interval: self.monitor_interval.unwrap_or(defaults.monitor_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(id: &str, agent: AgentType, params: &[(&str, &str)]) -> CibPrimitive {
        CibPrimitive {
            id: id.into(),
            class: agent.class.into(),
            provider: agent.provider.into(),
            kind: agent.kind.into(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            group: None,
        }
    }

    #[test]
    fn test_dc_node() {
        let cib = CibSnapshot {
            dc_uuid: Some("2".into()),
            nodes: vec![
                CibNode { id: "1".into(), uname: "mds1".into() },
                CibNode { id: "2".into(), uname: "mds2".into() },
            ],
            ..Default::default()
        };
        assert_eq!(cib.dc_node(), Some("mds2"));

        let no_dc = CibSnapshot::default();
        assert_eq!(no_dc.dc_node(), None);
    }

    #[test]
    fn test_legacy_targets() {
        let cib = CibSnapshot {
            primitives: vec![
                primitive("MGS_a1", AgentType::LEGACY_TARGET, &[("target", "u1")]),
                primitive("fs-OST0000", AgentType::LUSTRE, &[("target", "/dev/sdb")]),
                primitive("broken", AgentType::LEGACY_TARGET, &[]),
            ],
            ..Default::default()
        };

        assert_eq!(
            cib.legacy_targets(),
            vec![LegacyTarget { ha_label: "MGS_a1".into(), uuid: "u1".into() }]
        );
        assert_eq!(cib.target_labels(), vec!["MGS_a1", "fs-OST0000", "broken"]);
    }

    #[test]
    fn test_placement_requires_healthy_started_role() {
        let mut state = ResourceState {
            id: "fs-OST0000".into(),
            agent: "ocf::lustre:Lustre".into(),
            role: "Started".into(),
            failed: false,
            node: Some("oss1".into()),
        };
        assert_eq!(state.placement(), Some("oss1"));

        state.role = "Stopping".into();
        assert_eq!(state.placement(), Some("oss1"));

        state.failed = true;
        assert_eq!(state.placement(), None);

        state.failed = false;
        state.role = "Stopped".into();
        assert_eq!(state.placement(), None);
    }

    #[test]
    fn test_declared_timeouts_fallback() {
        let defaults = OperationTimeouts {
            start: Duration::from_secs(120),
            stop: Duration::from_secs(120),
            monitor: Duration::from_secs(60),
            monitor_interval: Duration::from_secs(20),
        };
        let declared = DeclaredTimeouts {
            start: Some(Duration::from_secs(300)),
            ..Default::default()
        };
        let merged = declared.or_defaults(defaults);
        assert_eq!(merged.start, Duration::from_secs(300));
        assert_eq!(merged.stop, Duration::from_secs(120));
    }
}
