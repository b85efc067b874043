//! Agent Metadata Parsing
//!
//! Extracts declared operation timeouts from resource agent metadata
//! (`crm_resource --show-metadata`).

use crate::domain::cluster::DeclaredTimeouts;
use crate::error::{Error, Result};
use roxmltree::{Document, ParsingOptions};
use std::time::Duration;

/// Parse `<actions>` of an agent's metadata document
pub fn parse_metadata(xml: &str) -> Result<DeclaredTimeouts> {
    // Agent metadata carries a DOCTYPE declaration
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| Error::CibParse(e.to_string()))?;
    let mut declared = DeclaredTimeouts::default();

    for action in doc.descendants().filter(|n| n.has_tag_name("action")) {
        let timeout = action.attribute("timeout").and_then(parse_duration);
        match action.attribute("name") {
            Some("start") => declared.start = timeout,
            Some("stop") => declared.stop = timeout,
            Some("monitor") => {
                declared.monitor = timeout;
                declared.monitor_interval = action.attribute("interval").and_then(parse_duration);
            }
            _ => {}
        }
    }

    Ok(declared)
}

/// Parse a Pacemaker interval specification (`20`, `20s`, `5m`, `1h`, `500ms`)
pub fn parse_duration(spec: &str) -> Option<Duration> {
    let spec = spec.trim();
    let split = spec
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(spec.len());
    let (digits, unit) = spec.split_at(split);
    let value: u64 = digits.parse().ok()?;

    match unit.trim() {
        "" | "s" | "sec" => Some(Duration::from_secs(value)),
        "ms" | "msec" => Some(Duration::from_millis(value)),
        "m" | "min" => Some(Duration::from_secs(value * 60)),
        "h" | "hr" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

/// Render a duration as a Pacemaker interval specification
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() != 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}s", duration.as_secs())
    }
}
