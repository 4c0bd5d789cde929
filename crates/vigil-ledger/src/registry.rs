use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use vigil_types::{TargetEntityId, TaskId};

/// Registry answer for one target entity. `weight` is scaled by 100 (100 = 1x).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStatus {
    pub weight: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalNotice {
    pub entity: TargetEntityId,
    pub task_id: TaskId,
}

/// Read-only lookup of target entities, plus the completion callback.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    async fn weight_and_status(&self, entity: TargetEntityId) -> Result<TargetStatus>;

    async fn removal_completed(&self, entity: TargetEntityId, task_id: TaskId) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryRegistry {
    targets: Arc<RwLock<HashMap<TargetEntityId, TargetStatus>>>,
    removals: Arc<RwLock<Vec<RemovalNotice>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, entity: TargetEntityId, weight: u32, active: bool) {
        self.targets
            .write()
            .await
            .insert(entity, TargetStatus { weight, active });
        info!(entity = %entity, weight, active, "📇 Target registered");
    }

    pub async fn set_active(&self, entity: TargetEntityId, active: bool) -> Result<()> {
        let mut targets = self.targets.write().await;
        let target = targets
            .get_mut(&entity)
            .ok_or(LedgerError::UnknownTarget(entity))?;
        target.active = active;
        Ok(())
    }

    pub async fn removals(&self) -> Vec<RemovalNotice> {
        self.removals.read().await.clone()
    }
}

#[async_trait]
impl TargetRegistry for MemoryRegistry {
    async fn weight_and_status(&self, entity: TargetEntityId) -> Result<TargetStatus> {
        self.targets
            .read()
            .await
            .get(&entity)
            .copied()
            .ok_or(LedgerError::UnknownTarget(entity))
    }

    async fn removal_completed(&self, entity: TargetEntityId, task_id: TaskId) -> Result<()> {
        if !self.targets.read().await.contains_key(&entity) {
            return Err(LedgerError::UnknownTarget(entity));
        }
        self.removals
            .write()
            .await
            .push(RemovalNotice { entity, task_id });
        info!(entity = %entity, task_id = %task_id, "✅ Removal completed notification");
        Ok(())
    }
}
