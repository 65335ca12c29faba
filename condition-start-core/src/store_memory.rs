use crate::events::RuntimeEvent;
use crate::store::InstanceStore;
use crate::types::ProcessInstance;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    instances: HashMap<Uuid, ProcessInstance>,
    /// Creation order of instance ids.
    order: Vec<Uuid>,
    events: HashMap<Uuid, Vec<RuntimeEvent>>,
}

/// In-memory InstanceStore for testing and embedding.
#[derive(Default)]
pub struct MemoryInstanceStore {
    inner: RwLock<Inner>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored instances.
    pub fn instance_count(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner.instances.len())
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn save_instance(&self, instance: &ProcessInstance) -> Result<()> {
        let mut inner = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        if inner
            .instances
            .insert(instance.instance_id, instance.clone())
            .is_none()
        {
            inner.order.push(instance.instance_id);
        }
        Ok(())
    }

    async fn load_instance(&self, id: Uuid) -> Result<Option<ProcessInstance>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner.instances.get(&id).cloned())
    }

    async fn find_by_business_key(&self, business_key: &str) -> Result<Vec<ProcessInstance>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.instances.get(id))
            .filter(|i| i.business_key.as_deref() == Some(business_key))
            .cloned()
            .collect())
    }

    async fn append_event(&self, instance_id: Uuid, event: &RuntimeEvent) -> Result<u64> {
        let mut inner = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let log = inner.events.entry(instance_id).or_default();
        log.push(event.clone());
        Ok((log.len() - 1) as u64)
    }

    async fn read_events(
        &self,
        instance_id: Uuid,
        from_seq: u64,
    ) -> Result<Vec<(u64, RuntimeEvent)>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner
            .events
            .get(&instance_id)
            .map(|log| {
                log.iter()
                    .enumerate()
                    .skip(from_seq as usize)
                    .map(|(seq, e)| (seq as u64, e.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
