//! Pacemaker Adapter
//!
//! Drives a Pacemaker cluster through its command line tools and parses the
//! documents those tools return.

pub mod cib;
pub mod cli;
pub mod metadata;
pub mod status;
pub mod xml;

pub use cli::PacemakerCli;
pub use xml::Element;
