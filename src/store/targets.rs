//! Target Configuration Store
//!
//! Per-target records keyed by target UUID in the `targets` section. Records
//! written by older agents lack `backfstype` and `device_type`; reading such a
//! record fills in `ldiskfs` / `linux` and writes the completed record back.

use crate::domain::target::{BackingFs, DeviceType, TargetInfo};
use crate::error::{Error, Result};
use crate::store::kv::KeyValueStoreRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Store section holding target records
pub const TARGETS_SECTION: &str = "targets";

/// On-disk form of a target record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TargetRecord {
    bdev: String,
    mntpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backfstype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_type: Option<String>,
    /// Fields this agent does not interpret, preserved on rewrite
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Target records backed by a key-value store
#[derive(Clone)]
pub struct TargetStore {
    kv: KeyValueStoreRef,
}

impl TargetStore {
    pub fn new(kv: KeyValueStoreRef) -> Self {
        Self { kv }
    }

    /// Read a target's record, completing and persisting legacy records
    pub async fn get(&self, uuid: &str) -> Result<TargetInfo> {
        let value = self
            .kv
            .get(TARGETS_SECTION, uuid)
            .await?
            .ok_or_else(|| Error::TargetNotFound {
                uuid: uuid.to_string(),
            })?;

        let mut record: TargetRecord =
            serde_json::from_value(value).map_err(|e| Error::ConfigRecord {
                section: TARGETS_SECTION.to_string(),
                key: uuid.to_string(),
                reason: e.to_string(),
            })?;

        let mut backfilled = false;
        if record.backfstype.is_none() {
            record.backfstype = Some(BackingFs::Ldiskfs.to_string());
            backfilled = true;
        }
        if record.device_type.is_none() {
            record.device_type = Some(DeviceType::Linux.to_string());
            backfilled = true;
        }
        if backfilled {
            info!(uuid, "back-filling filesystem and device type of target record");
            self.kv
                .update(TARGETS_SECTION, uuid, &serde_json::to_value(&record)?)
                .await?;
        }

        Ok(TargetInfo {
            device: record.bdev,
            mount_point: record.mntpt,
            backfstype: record.backfstype.as_deref().unwrap_or_default().parse()?,
            device_type: record.device_type.as_deref().unwrap_or_default().parse()?,
        })
    }

    /// Create or replace a target's record
    pub async fn update(&self, uuid: &str, target: &TargetInfo) -> Result<()> {
        let record = TargetRecord {
            bdev: target.device.clone(),
            mntpt: target.mount_point.clone(),
            backfstype: Some(target.backfstype.to_string()),
            device_type: Some(target.device_type.to_string()),
            extra: Map::new(),
        };
        self.kv
            .update(TARGETS_SECTION, uuid, &serde_json::to_value(&record)?)
            .await
    }

    pub async fn delete(&self, uuid: &str) -> Result<()> {
        self.kv.delete(TARGETS_SECTION, uuid).await
    }
}
