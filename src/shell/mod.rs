//! Shell Module
//!
//! Execution of the external tools the agent drives (cluster manager CLIs,
//! pool and mount utilities).

pub mod executor;
#[cfg(test)]
pub mod fake;

pub use executor::*;
