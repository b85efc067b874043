//! HA Lifecycle
//!
//! Resource definitions, placement constraints, the convergence wait, and the
//! lifecycle actions built on them.

pub mod constraints;
pub mod controller;
pub mod convergence;
pub mod convert;
pub mod definition;
pub mod lifecycle;
pub mod mount;
#[cfg(test)]
pub mod sim;

pub use constraints::ConstraintManager;
pub use controller::ResourceController;
pub use convert::{ConversionReport, LegacyConverter};
pub use definition::ResourceDefinitionBuilder;
pub use lifecycle::{action_status, ActionValue, TargetAction, TargetManager};
pub use mount::MountController;
