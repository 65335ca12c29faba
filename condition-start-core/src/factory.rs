use crate::events::RuntimeEvent;
use crate::registry::DefinitionRegistry;
use crate::store::InstanceStore;
use crate::types::{DefinitionRef, InstanceState, ProcessInstance, Timestamp, VariableMap};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// The start event reported by evaluation does not resolve against the
    /// definition any more.
    #[error("Start event '{start_event_id}' not found in process definition {definition_id}")]
    StartEventNotFound {
        definition_id: String,
        start_event_id: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Creates and starts exactly one process instance per call.
///
/// Side-effecting and not reversible from here. Every call must produce an
/// independent instance; no state is shared between concurrent calls.
#[async_trait]
pub trait InstanceFactory: Send + Sync {
    async fn instantiate(
        &self,
        definition: &DefinitionRef,
        start_event_id: &str,
        business_key: Option<&str>,
        variables: &VariableMap,
    ) -> Result<ProcessInstance, FactoryError>;
}

/// InstanceFactory over a [`DefinitionRegistry`] and an [`InstanceStore`].
///
/// Writes the instance, then the `InstanceCreated`, `VariablesApplied` and
/// `InstanceStarted` events, in that order.
pub struct EngineInstanceFactory {
    registry: Arc<dyn DefinitionRegistry>,
    store: Arc<dyn InstanceStore>,
}

impl EngineInstanceFactory {
    pub fn new(registry: Arc<dyn DefinitionRegistry>, store: Arc<dyn InstanceStore>) -> Self {
        Self { registry, store }
    }
}

#[async_trait]
impl InstanceFactory for EngineInstanceFactory {
    async fn instantiate(
        &self,
        definition: &DefinitionRef,
        start_event_id: &str,
        business_key: Option<&str>,
        variables: &VariableMap,
    ) -> Result<ProcessInstance, FactoryError> {
        let deployed = self
            .registry
            .load(&definition.id)
            .await?
            .ok_or_else(|| anyhow!("Process definition {} is no longer deployed", definition))?;

        if deployed.suspended {
            return Err(anyhow!("Process definition {} is suspended", definition).into());
        }

        let start_event = deployed.find_start_event(start_event_id).ok_or_else(|| {
            FactoryError::StartEventNotFound {
                definition_id: definition.id.clone(),
                start_event_id: start_event_id.to_string(),
            }
        })?;

        let canonical = serde_json::to_string(variables).context("serializing variables")?;
        let created_at = now_ms();
        let instance = ProcessInstance {
            instance_id: Uuid::now_v7(),
            definition: deployed.reference.clone(),
            start_activity_id: start_event.activity_id.clone(),
            business_key: business_key.map(str::to_string),
            state: InstanceState::Running,
            variables: variables.clone(),
            variables_hash: compute_hash(&canonical),
            created_at,
        };

        self.store.save_instance(&instance).await?;
        self.store
            .append_event(
                instance.instance_id,
                &RuntimeEvent::InstanceCreated {
                    definition: instance.definition.clone(),
                    business_key: instance.business_key.clone(),
                    at: created_at,
                },
            )
            .await?;
        self.store
            .append_event(
                instance.instance_id,
                &RuntimeEvent::VariablesApplied {
                    names: variables.keys().cloned().collect(),
                    variables_hash: instance.variables_hash,
                },
            )
            .await?;
        self.store
            .append_event(
                instance.instance_id,
                &RuntimeEvent::InstanceStarted {
                    start_activity_id: instance.start_activity_id.clone(),
                },
            )
            .await?;

        info!(
            instance_id = %instance.instance_id,
            definition = %instance.definition,
            start_event = %instance.start_activity_id,
            business_key = instance.business_key.as_deref().unwrap_or(""),
            "Process instance started"
        );
        Ok(instance)
    }
}

pub fn compute_hash(data: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hasher.finalize().into()
}

fn now_ms() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
