//! Location Constraints
//!
//! Each configured target carries up to two location constraints: the
//! primary pin (score 20) and the secondary pin (score 10).

use crate::domain::cluster::CibScope;
use crate::domain::ports::ClusterManagerRef;
use crate::domain::target::{constraint_id, Preference};
use crate::error::{Error, Result};
use crate::pacemaker::xml::Element;
use tracing::{debug, info};

pub struct ConstraintManager {
    cluster: ClusterManagerRef,
}

impl ConstraintManager {
    pub fn new(cluster: ClusterManagerRef) -> Self {
        Self { cluster }
    }

    /// Pin a target to a node. Re-adding an existing constraint succeeds.
    pub async fn add_priority(&self, ha_label: &str, node: &str, preference: Preference) -> Result<()> {
        let fragment = location(ha_label, preference)
            .attr("node", node)
            .attr("rsc", ha_label)
            .attr("score", preference.score().to_string());

        match self.cluster.create(CibScope::Constraints, &fragment).await {
            Ok(()) => {
                info!(ha_label, node, %preference, "added location constraint");
                Ok(())
            }
            Err(Error::CibObjectExists { id }) => {
                debug!(%id, "location constraint already present");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Remove a target's constraint of one preference class, if present
    pub async fn remove_priority(&self, ha_label: &str, preference: Preference) -> Result<()> {
        self.cluster
            .delete(CibScope::Constraints, &location(ha_label, preference))
            .await?;
        info!(ha_label, %preference, "removed location constraint");
        Ok(())
    }
}

fn location(ha_label: &str, preference: Preference) -> Element {
    Element::new("rsc_location").attr("id", constraint_id(ha_label, preference))
}
