//! Legacy Target Conversion
//!
//! Rewrites monolithic `ocf:chroma:Target` resources into the split form
//! (pool import + Lustre mount) across the whole cluster. Runs only on the
//! elected coordinator and inside maintenance mode, so resources stay where
//! they are while their definitions are replaced underneath them.

use crate::domain::cluster::{CibPrimitive, CibScope, LegacyTarget};
use crate::domain::target::{Preference, TargetRole};
use crate::error::{Error, Result};
use crate::ha::constraints::ConstraintManager;
use crate::ha::controller::ResourceController;
use crate::ha::convergence::PlacementSource;
use crate::ha::definition::ResourceDefinitionBuilder;
use crate::pacemaker::xml::{attribute_set, Element};
use crate::store::TargetStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of a conversion run, by target label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub converted: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Saved pins, running state and definition of one legacy target
struct Snapshot {
    pins: Vec<(Preference, String)>,
    was_running: bool,
    legacy: Option<Element>,
}

pub struct LegacyConverter {
    controller: Arc<ResourceController>,
    store: TargetStore,
    builder: ResourceDefinitionBuilder,
    constraints: ConstraintManager,
}

impl LegacyConverter {
    pub fn new(controller: Arc<ResourceController>, store: TargetStore) -> Self {
        let cluster = controller.cluster().clone();
        Self {
            controller,
            store,
            builder: ResourceDefinitionBuilder::new(cluster.clone()),
            constraints: ConstraintManager::new(cluster),
        }
    }

    /// Convert every legacy target this node holds metadata for.
    ///
    /// Returns an empty report when this node is not the coordinator, unless
    /// `force` is set. Maintenance mode is always switched off again before
    /// returning once it has been switched on.
    pub async fn convert(&self, force: bool) -> Result<ConversionReport> {
        let cluster = self.controller.cluster();
        let cib = cluster.cib().await?;
        let local = cluster.local_node().await?;

        if !force && cib.dc_node() != Some(local.as_str()) {
            info!(node = %local, coordinator = ?cib.dc_node(), "not the coordinator, skipping conversion");
            return Ok(ConversionReport::default());
        }

        let legacy = cib.legacy_targets();
        if legacy.is_empty() {
            info!("no legacy target resources to convert");
            return Ok(ConversionReport::default());
        }

        let running = self.controller.locations().await;
        let snapshots: Vec<Snapshot> = legacy
            .iter()
            .map(|t| {
                let was_running = matches!(running.get(&t.ha_label), Some(Some(_)));
                Snapshot {
                    pins: cib
                        .locations_for(&t.ha_label)
                        .filter_map(|c| {
                            Preference::from_constraint_id(&t.ha_label, &c.id).map(|p| (p, c.node.clone()))
                        })
                        .collect(),
                    was_running,
                    legacy: cib
                        .primitives
                        .iter()
                        .find(|p| p.id == t.ha_label)
                        .map(|p| legacy_fragment(p, was_running)),
                }
            })
            .collect();

        cluster.set_maintenance_mode(true).await?;
        info!(targets = legacy.len(), "entered maintenance mode for conversion");

        let mut report = ConversionReport::default();
        let mut settling = Vec::new();
        for (target, snapshot) in legacy.iter().zip(&snapshots) {
            match self.convert_target(target, snapshot).await {
                Ok(true) => {
                    report.converted.push(target.ha_label.clone());
                    settling.push((target.ha_label.as_str(), snapshot.was_running));
                }
                Ok(false) => report.skipped.push(target.ha_label.clone()),
                Err(e) => {
                    error!(ha_label = %target.ha_label, error = %e, "failed to convert target");
                    report.failed.push(target.ha_label.clone());
                }
            }
        }

        for (ha_label, was_running) in settling {
            if !self.controller.await_convergence(ha_label, was_running).await {
                warn!(ha_label, was_running, "converted target did not settle");
                report.failed.push(ha_label.to_string());
            }
        }

        let restored = cluster.set_maintenance_mode(false).await;
        if let Err(e) = &restored {
            error!(error = %e, "failed to leave maintenance mode after conversion");
        }
        restored?;
        info!(
            converted = report.converted.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "conversion finished"
        );

        if !report.failed.is_empty() {
            return Err(Error::ConversionIncomplete {
                failed: report.failed,
            });
        }
        Ok(report)
    }

    /// Replace one legacy resource. `Ok(false)` when it has no local metadata.
    ///
    /// On failure the legacy primitive and its pins are put back, so a later
    /// run finds the target again.
    async fn convert_target(&self, target: &LegacyTarget, snapshot: &Snapshot) -> Result<bool> {
        let info = match self.store.get(&target.uuid).await {
            Ok(info) => info,
            Err(Error::TargetNotFound { .. }) => {
                warn!(ha_label = %target.ha_label, uuid = %target.uuid, "no local metadata, skipping");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let definition = self
            .builder
            .build(&target.ha_label, &info, snapshot.was_running)
            .await;

        if let Err(e) = self.replace(target, snapshot, &definition).await {
            error!(ha_label = %target.ha_label, error = %e, "restoring legacy resource");
            self.restore(target, snapshot, &definition).await;
            return Err(e);
        }

        info!(ha_label = %target.ha_label, device_type = %info.device_type, "converted legacy target");
        Ok(true)
    }

    async fn replace(&self, target: &LegacyTarget, snapshot: &Snapshot, definition: &Element) -> Result<()> {
        for (preference, _) in &snapshot.pins {
            self.constraints
                .remove_priority(&target.ha_label, *preference)
                .await?;
        }

        let cluster = self.controller.cluster();
        let old = Element::new("primitive").attr("id", target.ha_label.as_str());
        cluster.delete(CibScope::Resources, &old).await?;
        cluster.create(CibScope::Resources, definition).await?;

        for (preference, node) in &snapshot.pins {
            self.constraints
                .add_priority(&target.ha_label, node, *preference)
                .await?;
        }
        Ok(())
    }

    /// Best effort: every step is attempted and failures are only logged
    async fn restore(&self, target: &LegacyTarget, snapshot: &Snapshot, definition: &Element) {
        let cluster = self.controller.cluster();
        if let Err(e) = cluster.delete(CibScope::Resources, definition).await {
            warn!(ha_label = %target.ha_label, error = %e, "failed to remove partial definition");
        }

        if let Some(legacy) = &snapshot.legacy {
            match cluster.create(CibScope::Resources, legacy).await {
                Ok(()) | Err(Error::CibObjectExists { .. }) => {}
                Err(e) => warn!(ha_label = %target.ha_label, error = %e, "failed to restore legacy resource"),
            }
        }

        for (preference, node) in &snapshot.pins {
            if let Err(e) = self
                .constraints
                .add_priority(&target.ha_label, node, *preference)
                .await
            {
                warn!(ha_label = %target.ha_label, %node, error = %e, "failed to restore constraint");
            }
        }
    }
}

/// Definition recreating a legacy primitive from its parsed form
fn legacy_fragment(primitive: &CibPrimitive, running: bool) -> Element {
    let params: Vec<(&str, &str)> = primitive
        .params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let element = Element::new("primitive")
        .attr("id", primitive.id.as_str())
        .attr("class", primitive.class.as_str())
        .attr("provider", primitive.provider.as_str())
        .attr("type", primitive.kind.as_str())
        .child(attribute_set("instance_attributes", &primitive.id, &params));
    if running {
        return element;
    }
    let role = TargetRole::Stopped.to_string();
    element.child(attribute_set("meta_attributes", &primitive.id, &[("target-role", role.as_str())]))
}
