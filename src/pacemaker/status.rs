//! Live Status Parsing
//!
//! Reads `crm_mon --as-xml` output. Resources may appear at top level or
//! nested inside groups and clones, so every `<resource>` element in the
//! document is taken.

use crate::domain::cluster::ResourceState;
use crate::error::{Error, Result};
use roxmltree::Document;

/// Parse a status document into per-resource states
pub fn parse_status(xml: &str) -> Result<Vec<ResourceState>> {
    let doc = Document::parse(xml).map_err(|e| Error::CibParse(e.to_string()))?;

    let states = doc
        .descendants()
        .filter(|n| n.has_tag_name("resource"))
        .filter_map(|res| {
            Some(ResourceState {
                id: res.attribute("id")?.to_string(),
                agent: res.attribute("resource_agent").unwrap_or_default().to_string(),
                role: res.attribute("role").unwrap_or_default().to_string(),
                failed: res.attribute("failed") == Some("true"),
                node: res
                    .children()
                    .find(|n| n.has_tag_name("node"))
                    .and_then(|n| n.attribute("name"))
                    .map(str::to_string),
            })
        })
        .collect();

    Ok(states)
}
