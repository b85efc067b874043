//! Simulated Cluster
//!
//! In-memory [`ClusterManager`] for exercising lifecycle logic. Placement
//! follows a small model of the real scheduler:
//!
//! - a running resource stays where it is unless a move pin names another node;
//! - a stopped resource that should run goes to its move pin, else to the
//!   node of its highest-scoring location constraint;
//! - a group places all members together;
//! - changes take effect after `settle_polls` status queries;
//! - in maintenance mode nothing moves, but newly defined resources adopt
//!   whatever is still mounted under their id.

use crate::domain::cluster::{
    CibNode, CibPrimitive, CibScope, CibSnapshot, DeclaredTimeouts, LocationConstraint,
    ResourceState,
};
use crate::domain::ports::ClusterManager;
use crate::domain::target::{constraint_id, AgentType, Preference, TargetRole};
use crate::error::{Error, Result};
use crate::pacemaker::xml::Element;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct SimResource {
    primitive: CibPrimitive,
    role: TargetRole,
    running_on: Option<String>,
}

#[derive(Debug, Clone)]
struct SimGroup {
    members: Vec<String>,
    role: TargetRole,
}

#[derive(Debug, Default)]
struct SimState {
    nodes: Vec<String>,
    local: String,
    dc: String,
    resources: BTreeMap<String, SimResource>,
    groups: BTreeMap<String, SimGroup>,
    constraints: Vec<LocationConstraint>,
    pins: BTreeMap<String, String>,
    pending: BTreeMap<String, (Option<String>, u32)>,
    maintenance: bool,
    settle_polls: u32,
    never_start: BTreeSet<String>,
    /// Disables left before a resource in `never_start` can start again
    start_failures: BTreeMap<String, u32>,
    never_stop: BTreeSet<String>,
    /// Ids whose next create is rejected
    failing_creates: BTreeSet<String>,
    /// Mounts left behind by resources deleted in maintenance mode
    orphaned: BTreeMap<String, String>,
    metadata_unavailable: bool,
    status_unavailable: bool,
    log: Vec<String>,
}

/// A unit of placement: a group with its members, or a lone primitive
struct Unit {
    id: String,
    members: Vec<String>,
    role: TargetRole,
}

impl SimState {
    fn units(&self) -> Vec<Unit> {
        let mut units: Vec<Unit> = self
            .groups
            .iter()
            .map(|(id, g)| Unit {
                id: id.clone(),
                members: g.members.clone(),
                role: g.role,
            })
            .collect();
        units.extend(
            self.resources
                .values()
                .filter(|r| r.primitive.group.is_none())
                .map(|r| Unit {
                    id: r.primitive.id.clone(),
                    members: vec![r.primitive.id.clone()],
                    role: TargetRole::Started,
                }),
        );
        units
    }

    fn unit_ids<'a>(&self, unit: &'a Unit) -> impl Iterator<Item = &'a String> {
        std::iter::once(&unit.id).chain(unit.members.iter())
    }

    fn current(&self, unit: &Unit) -> Option<String> {
        unit.members
            .first()
            .and_then(|m| self.resources.get(m))
            .and_then(|r| r.running_on.clone())
    }

    fn desired(&self, unit: &Unit) -> Option<String> {
        let enabled = unit.role == TargetRole::Started
            && unit
                .members
                .iter()
                .all(|m| self.resources.get(m).map(|r| r.role) == Some(TargetRole::Started));
        if self.unit_ids(unit).any(|id| self.never_stop.contains(id)) {
            if let Some(current) = self.current(unit) {
                return Some(current);
            }
        }
        if !enabled || self.unit_ids(unit).any(|id| self.never_start.contains(id)) {
            return None;
        }

        let pin = self.unit_ids(unit).find_map(|id| self.pins.get(id)).cloned();
        if let Some(pin) = pin {
            return Some(pin);
        }
        if let Some(current) = self.current(unit) {
            return Some(current);
        }

        let ids: Vec<&String> = self.unit_ids(unit).collect();
        self.constraints
            .iter()
            .filter(|c| ids.contains(&&c.rsc))
            .max_by_key(|c| c.score.parse::<i64>().unwrap_or(0))
            .map(|c| c.node.clone())
            .or_else(|| self.nodes.first().cloned())
    }

    fn tick(&mut self) {
        if self.maintenance {
            return;
        }
        for unit in self.units() {
            let desired = self.desired(&unit);
            if desired == self.current(&unit) {
                self.pending.remove(&unit.id);
                continue;
            }

            let settle = self.settle_polls;
            let entry = self
                .pending
                .entry(unit.id.clone())
                .or_insert_with(|| (desired.clone(), settle));
            if entry.0 != desired {
                *entry = (desired.clone(), settle);
            }
            if entry.1 > 0 {
                entry.1 -= 1;
                continue;
            }

            self.pending.remove(&unit.id);
            for member in &unit.members {
                if let Some(r) = self.resources.get_mut(member) {
                    r.running_on = desired.clone();
                }
            }
        }
    }

    fn add_primitive(&mut self, el: &Element, group: Option<&str>) -> Result<()> {
        let id = el.attribute("id").unwrap_or_default().to_string();
        if self.resources.contains_key(&id) || self.groups.contains_key(&id) {
            return Err(Error::CibObjectExists { id });
        }

        let params = el
            .child_elements()
            .iter()
            .filter(|c| c.name() == "instance_attributes")
            .flat_map(|c| c.child_elements())
            .filter_map(|nv| Some((nv.attribute("name")?.to_string(), nv.attribute("value")?.to_string())))
            .collect();

        let running_on = if self.maintenance {
            self.orphaned.get(&id).cloned()
        } else {
            None
        };

        self.resources.insert(
            id.clone(),
            SimResource {
                primitive: CibPrimitive {
                    id,
                    class: el.attribute("class").unwrap_or_default().to_string(),
                    provider: el.attribute("provider").unwrap_or_default().to_string(),
                    kind: el.attribute("type").unwrap_or_default().to_string(),
                    params,
                    group: group.map(str::to_string),
                },
                role: declared_role(el),
                running_on,
            },
        );
        Ok(())
    }

    fn remove_resource(&mut self, id: &str) {
        if let Some(r) = self.resources.remove(id) {
            if let (true, Some(node)) = (self.maintenance, r.running_on) {
                self.orphaned.insert(id.to_string(), node);
            }
        }
    }
}

fn declared_role(el: &Element) -> TargetRole {
    let stopped = el
        .child_elements()
        .iter()
        .filter(|c| c.name() == "meta_attributes")
        .flat_map(|c| c.child_elements())
        .any(|nv| nv.attribute("name") == Some("target-role") && nv.attribute("value") == Some("Stopped"));
    if stopped {
        TargetRole::Stopped
    } else {
        TargetRole::Started
    }
}

/// In-memory cluster manager
pub struct SimCluster {
    state: Mutex<SimState>,
}

impl SimCluster {
    /// A cluster of `nodes`; the first node is local and the coordinator
    pub fn new(nodes: &[&str]) -> Self {
        let nodes: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        let first = nodes.first().cloned().unwrap_or_default();
        Self {
            state: Mutex::new(SimState {
                nodes,
                local: first.clone(),
                dc: first,
                settle_polls: 2,
                ..Default::default()
            }),
        }
    }

    pub fn set_local_node(&self, node: &str) {
        self.state.lock().local = node.to_string();
    }

    pub fn set_dc(&self, node: &str) {
        self.state.lock().dc = node.to_string();
    }

    pub fn set_settle_polls(&self, polls: u32) {
        self.state.lock().settle_polls = polls;
    }

    /// Resources with this id never manage to start
    pub fn never_start(&self, id: &str) {
        self.state.lock().never_start.insert(id.to_string());
    }

    /// `id` fails to start until it has been disabled `count` times
    pub fn fail_starts(&self, id: &str, count: u32) {
        let mut state = self.state.lock();
        state.never_start.insert(id.to_string());
        state.start_failures.insert(id.to_string(), count);
    }

    /// Once running, `id` ignores requests to stop
    pub fn never_stop(&self, id: &str) {
        self.state.lock().never_stop.insert(id.to_string());
    }

    /// Reject the next create of `id`
    pub fn fail_next_create(&self, id: &str) {
        self.state.lock().failing_creates.insert(id.to_string());
    }

    pub fn set_metadata_unavailable(&self) {
        self.state.lock().metadata_unavailable = true;
    }

    pub fn set_status_unavailable(&self, unavailable: bool) {
        self.state.lock().status_unavailable = unavailable;
    }

    /// Define a legacy monolithic target with both constraints
    pub fn add_legacy_target(
        &self,
        ha_label: &str,
        uuid: &str,
        primary: &str,
        secondary: &str,
        running_on: Option<&str>,
    ) {
        let mut state = self.state.lock();
        let agent = AgentType::LEGACY_TARGET;
        state.resources.insert(
            ha_label.to_string(),
            SimResource {
                primitive: CibPrimitive {
                    id: ha_label.to_string(),
                    class: agent.class.to_string(),
                    provider: agent.provider.to_string(),
                    kind: agent.kind.to_string(),
                    params: [("target".to_string(), uuid.to_string())].into_iter().collect(),
                    group: None,
                },
                role: TargetRole::from_running(running_on.is_some()),
                running_on: running_on.map(str::to_string),
            },
        );
        for (preference, node) in [(Preference::Primary, primary), (Preference::Secondary, secondary)] {
            state.constraints.push(LocationConstraint {
                id: constraint_id(ha_label, preference),
                rsc: ha_label.to_string(),
                node: node.to_string(),
                score: preference.score().to_string(),
            });
        }
    }

    /// Force a resource onto a node, bypassing the scheduler
    pub fn place(&self, id: &str, node: Option<&str>) {
        if let Some(r) = self.state.lock().resources.get_mut(id) {
            r.running_on = node.map(str::to_string);
        }
    }

    pub fn placement(&self, id: &str) -> Option<String> {
        self.state
            .lock()
            .resources
            .get(id)
            .and_then(|r| r.running_on.clone())
    }

    pub fn primitive(&self, id: &str) -> Option<CibPrimitive> {
        self.state.lock().resources.get(id).map(|r| r.primitive.clone())
    }

    pub fn has_group(&self, id: &str) -> bool {
        self.state.lock().groups.contains_key(id)
    }

    pub fn constraint(&self, id: &str) -> Option<LocationConstraint> {
        self.state
            .lock()
            .constraints
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn in_maintenance(&self) -> bool {
        self.state.lock().maintenance
    }

    pub fn has_pins(&self) -> bool {
        !self.state.lock().pins.is_empty()
    }

    /// Mutating operations issued so far
    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }
}

#[async_trait]
impl ClusterManager for SimCluster {
    async fn cib(&self) -> Result<CibSnapshot> {
        let state = self.state.lock();
        let nodes: Vec<CibNode> = state
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| CibNode {
                id: (i + 1).to_string(),
                uname: n.clone(),
            })
            .collect();
        let dc_uuid = nodes.iter().find(|n| n.uname == state.dc).map(|n| n.id.clone());

        Ok(CibSnapshot {
            dc_uuid,
            nodes,
            primitives: state.resources.values().map(|r| r.primitive.clone()).collect(),
            locations: state.constraints.clone(),
        })
    }

    async fn resource_status(&self) -> Result<Vec<ResourceState>> {
        let mut state = self.state.lock();
        if state.status_unavailable {
            return Err(Error::ClusterUnavailable("simulated outage".into()));
        }
        state.tick();

        Ok(state
            .resources
            .values()
            .map(|r| ResourceState {
                id: r.primitive.id.clone(),
                agent: format!(
                    "{}::{}:{}",
                    r.primitive.class, r.primitive.provider, r.primitive.kind
                ),
                role: if r.running_on.is_some() { "Started" } else { "Stopped" }.to_string(),
                failed: false,
                node: r.running_on.clone(),
            })
            .collect())
    }

    async fn resource_exists(&self, id: &str) -> Result<bool> {
        let state = self.state.lock();
        Ok(state.resources.contains_key(id) || state.groups.contains_key(id))
    }

    async fn create(&self, scope: CibScope, fragment: &Element) -> Result<()> {
        let mut state = self.state.lock();
        let id = fragment.attribute("id").unwrap_or_default().to_string();
        if state.failing_creates.remove(&id) {
            return Err(Error::CommandFailed {
                command: "cibadmin --create".into(),
                rc: 1,
                stdout: String::new(),
                stderr: format!("simulated failure creating {}", id),
            });
        }

        match (scope, fragment.name()) {
            (CibScope::Resources, "primitive") => state.add_primitive(fragment, None)?,
            (CibScope::Resources, "group") => {
                if state.groups.contains_key(&id) || state.resources.contains_key(&id) {
                    return Err(Error::CibObjectExists { id });
                }
                let mut members = Vec::new();
                for member in fragment.child_elements().iter().filter(|c| c.name() == "primitive") {
                    state.add_primitive(member, Some(&id))?;
                    members.push(member.attribute("id").unwrap_or_default().to_string());
                }
                // Probes find every member where the adopted one is mounted
                if state.maintenance {
                    let adopted = members
                        .iter()
                        .find_map(|m| state.resources.get(m).and_then(|r| r.running_on.clone()));
                    for member in &members {
                        if let Some(r) = state.resources.get_mut(member) {
                            r.running_on = adopted.clone();
                        }
                    }
                }
                state.groups.insert(
                    id.clone(),
                    SimGroup {
                        members,
                        role: declared_role(fragment),
                    },
                );
            }
            (CibScope::Constraints, "rsc_location") => {
                if state.constraints.iter().any(|c| c.id == id) {
                    return Err(Error::CibObjectExists { id });
                }
                state.constraints.push(LocationConstraint {
                    id: id.clone(),
                    rsc: fragment.attribute("rsc").unwrap_or_default().to_string(),
                    node: fragment.attribute("node").unwrap_or_default().to_string(),
                    score: fragment.attribute("score").unwrap_or("0").to_string(),
                });
            }
            (_, other) => {
                return Err(Error::Internal(format!("simulated cluster cannot create <{}>", other)))
            }
        }

        state.log.push(format!("create {}", id));
        Ok(())
    }

    async fn delete(&self, scope: CibScope, fragment: &Element) -> Result<()> {
        let mut state = self.state.lock();
        let id = fragment.attribute("id").unwrap_or_default().to_string();

        match scope {
            CibScope::Resources => {
                if let Some(group) = state.groups.remove(&id) {
                    for member in group.members {
                        state.remove_resource(&member);
                    }
                } else {
                    state.remove_resource(&id);
                    for group in state.groups.values_mut() {
                        group.members.retain(|m| m != &id);
                    }
                    state.groups.retain(|_, g| !g.members.is_empty());
                }
            }
            CibScope::Constraints => state.constraints.retain(|c| c.id != id),
        }

        state.log.push(format!("delete {}", id));
        Ok(())
    }

    async fn set_target_role(&self, id: &str, role: TargetRole) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(group) = state.groups.get_mut(id) {
            group.role = role;
        } else if let Some(r) = state.resources.get_mut(id) {
            r.role = role;
        } else {
            return Err(Error::ResourceNotFound {
                ha_label: id.to_string(),
            });
        }
        if role == TargetRole::Stopped {
            if let Some(left) = state.start_failures.get_mut(id) {
                *left = left.saturating_sub(1);
                if *left == 0 {
                    state.start_failures.remove(id);
                    state.never_start.remove(id);
                }
            }
        }
        state.log.push(format!("role {} {}", id, role));
        Ok(())
    }

    async fn cleanup(&self, id: &str) -> Result<()> {
        self.state.lock().log.push(format!("cleanup {}", id));
        Ok(())
    }

    async fn move_resource(&self, id: &str, node: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.pins.insert(id.to_string(), node.to_string());
        state.log.push(format!("move {} {}", id, node));
        Ok(())
    }

    async fn clear_move(&self, id: &str, node: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.pins.remove(id);
        state.log.push(format!("unmove {} {}", id, node));
        Ok(())
    }

    async fn set_maintenance_mode(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.maintenance = enabled;
        state.log.push(format!("maintenance {}", enabled));
        Ok(())
    }

    async fn local_node(&self) -> Result<String> {
        Ok(self.state.lock().local.clone())
    }

    async fn agent_metadata(&self, _agent: &AgentType) -> Result<DeclaredTimeouts> {
        if self.state.lock().metadata_unavailable {
            return Err(Error::ClusterUnavailable("no metadata".into()));
        }
        Ok(DeclaredTimeouts::default())
    }
}
