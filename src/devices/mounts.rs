//! Local Mount Table
//!
//! Reads the kernel mount table fresh on every call; nothing is cached
//! between calls.

use crate::domain::ports::{LocalMount, MountTable};
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Mount table read from a `/proc/mounts`-format file
#[derive(Debug, Clone)]
pub struct ProcMounts {
    path: PathBuf,
}

impl ProcMounts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self::new("/proc/mounts")
    }
}

#[async_trait]
impl MountTable for ProcMounts {
    async fn local_mounts(&self) -> Result<Vec<LocalMount>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_mounts(&text))
    }
}

/// Parse mount table text; malformed lines are skipped
pub fn parse_mounts(text: &str) -> Vec<LocalMount> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            Some(LocalMount {
                device: unescape(fields.next()?),
                mount_point: unescape(fields.next()?),
                fstype: fields.next()?.to_string(),
            })
        })
        .collect()
}

/// Decode the octal escapes (`\040` for space) the kernel uses in mount fields
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let octal = std::str::from_utf8(&bytes[i + 1..i + 4]).ok();
            if let Some(byte) = octal.and_then(|o| u8::from_str_radix(o, 8).ok()) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
