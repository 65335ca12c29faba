use crate::types::ProcessDefinition;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Read access to deployed process definitions.
///
/// Deployment itself belongs to the host; `deploy` exists so the in-memory
/// registry can be populated.
#[async_trait]
pub trait DefinitionRegistry: Send + Sync {
    async fn deploy(&self, definition: ProcessDefinition) -> Result<()>;
    async fn load(&self, definition_id: &str) -> Result<Option<ProcessDefinition>>;

    /// Definitions with live conditional start events, ordered by
    /// (key, tenant, version).
    ///
    /// Only the latest version of each (key, tenant) pair is subscribed.
    /// Deploying a new version withdraws the older version's start
    /// conditions, even if the new version has none.
    async fn list_conditional(&self) -> Result<Vec<ProcessDefinition>>;
}

// ── MemoryDefinitionRegistry ──

type SubscriptionKey = (String, Option<String>);

/// In-memory DefinitionRegistry for testing and embedding.
///
/// Enforces deployment identity:
/// - definition ids are unique
/// - (key, tenant, version) is unique
pub struct MemoryDefinitionRegistry {
    inner: RwLock<BTreeMap<String, ProcessDefinition>>,
}

impl MemoryDefinitionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryDefinitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DefinitionRegistry for MemoryDefinitionRegistry {
    async fn deploy(&self, definition: ProcessDefinition) -> Result<()> {
        let mut defs = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;

        if defs.contains_key(definition.id()) {
            return Err(anyhow!(
                "Process definition {} is already deployed",
                definition.id()
            ));
        }
        let r = &definition.reference;
        if defs.values().any(|d| {
            d.reference.key == r.key
                && d.reference.tenant_id == r.tenant_id
                && d.reference.version == r.version
        }) {
            return Err(anyhow!("Version {} of {} is already deployed", r.version, r));
        }

        defs.insert(definition.id().to_string(), definition);
        Ok(())
    }

    async fn load(&self, definition_id: &str) -> Result<Option<ProcessDefinition>> {
        let defs = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(defs.get(definition_id).cloned())
    }

    async fn list_conditional(&self) -> Result<Vec<ProcessDefinition>> {
        let defs = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;

        let mut latest: BTreeMap<SubscriptionKey, &ProcessDefinition> = BTreeMap::new();
        for def in defs.values() {
            let key = (def.reference.key.clone(), def.reference.tenant_id.clone());
            match latest.get(&key) {
                Some(existing) if existing.reference.version >= def.reference.version => {}
                _ => {
                    latest.insert(key, def);
                }
            }
        }

        Ok(latest
            .into_values()
            .filter(|d| d.conditional_start_events().next().is_some())
            .cloned()
            .collect())
    }
}
