//! Convergence Wait
//!
//! Waits for the cluster to place (or remove) a target after a state change.
//! Busy clusters starting many targets at once can take far longer than any
//! fixed timeout for one target, so the wait is bounded by two clocks:
//!
//! - an activity window, reset whenever the number of running target
//!   resources in the cluster changes, which detects a stalled cluster;
//! - a master ceiling on the whole wait.

use crate::config::ConvergencePolicy;
use crate::domain::cluster::Locations;
use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Source of live target placement
#[async_trait]
pub trait PlacementSource: Send + Sync {
    /// Current placement of every target resource; empty when the cluster
    /// cannot be queried
    async fn locations(&self) -> Locations;
}

/// Poll placement until `ha_label` is running (or stopped, per `want_running`).
///
/// Returns `false` once either the master or the activity timeout expires.
pub async fn await_convergence<P>(
    source: &P,
    policy: &ConvergencePolicy,
    ha_label: &str,
    want_running: bool,
) -> bool
where
    P: PlacementSource + ?Sized,
{
    let start = Instant::now();
    let master_deadline = start + policy.master_timeout();
    let mut activity_deadline = start + policy.activity_timeout();
    let mut running_count: Option<usize> = None;

    loop {
        let locations = source.locations().await;

        let running = matches!(locations.get(ha_label), Some(Some(_)));
        if running == want_running {
            debug!(
                ha_label,
                want_running,
                elapsed_secs = start.elapsed().as_secs(),
                "target converged"
            );
            return true;
        }

        let count = locations.values().filter(|node| node.is_some()).count();
        if running_count != Some(count) {
            running_count = Some(count);
            activity_deadline = Instant::now() + policy.activity_timeout();
        }

        let now = Instant::now();
        if now >= master_deadline || now >= activity_deadline {
            warn!(
                ha_label,
                want_running,
                elapsed_secs = start.elapsed().as_secs(),
                stalled = now >= activity_deadline,
                "target did not converge"
            );
            return false;
        }

        sleep(policy.poll_interval()).await;
    }
}
