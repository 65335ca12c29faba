use crate::events::RuntimeEvent;
use crate::types::ProcessInstance;
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence for instances created by correlation.
///
/// Durability and transactions are the backend's concern; the reference
/// factory only needs these operations.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    // ── Instance ──

    async fn save_instance(&self, instance: &ProcessInstance) -> Result<()>;
    async fn load_instance(&self, id: Uuid) -> Result<Option<ProcessInstance>>;
    /// Instances carrying a business key, in creation order.
    async fn find_by_business_key(&self, business_key: &str) -> Result<Vec<ProcessInstance>>;

    // ── Event log (append-only) ──

    /// Append an event and return its sequence number.
    async fn append_event(&self, instance_id: Uuid, event: &RuntimeEvent) -> Result<u64>;
    async fn read_events(
        &self,
        instance_id: Uuid,
        from_seq: u64,
    ) -> Result<Vec<(u64, RuntimeEvent)>>;
}
