//! Matching published variables against conditional start events.

use crate::registry::DefinitionRegistry;
use crate::request::CorrelationRequest;
use crate::types::{DefinitionRef, ProcessDefinition};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// A definition whose conditional start event is satisfied by the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub definition: DefinitionRef,
    pub start_event_id: String,
}

impl MatchResult {
    pub fn new(definition: DefinitionRef, start_event_id: impl Into<String>) -> Self {
        Self {
            definition,
            start_event_id: start_event_id.into(),
        }
    }
}

/// Finds every (definition, start event) pair whose condition holds.
///
/// Implementations take no caller identity: the scan covers all deployed
/// definitions and authorization is decided afterwards, per match. Results
/// must be ordered deterministically for a given deployment state, and an
/// empty result is not an error at this level. Implementations must be safe
/// to call concurrently.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn evaluate(&self, request: &CorrelationRequest) -> Result<Vec<MatchResult>>;
}

/// ConditionEvaluator backed by a [`DefinitionRegistry`].
///
/// Order: definitions as listed by the registry, then start events in
/// declaration order. Suspended definitions never match.
pub struct RegistryConditionEvaluator {
    registry: Arc<dyn DefinitionRegistry>,
}

impl RegistryConditionEvaluator {
    pub fn new(registry: Arc<dyn DefinitionRegistry>) -> Self {
        Self { registry }
    }

    async fn candidates(&self, request: &CorrelationRequest) -> Result<Vec<ProcessDefinition>> {
        match request.process_definition_id() {
            Some(id) => {
                let def = self
                    .registry
                    .load(id)
                    .await?
                    .ok_or_else(|| anyhow!("No process definition deployed with id '{id}'"))?;
                Ok(vec![def])
            }
            None => {
                let scope = request.tenant_scope();
                Ok(self
                    .registry
                    .list_conditional()
                    .await?
                    .into_iter()
                    .filter(|d| scope.admits(d.reference.tenant_id.as_deref()))
                    .collect())
            }
        }
    }
}

#[async_trait]
impl ConditionEvaluator for RegistryConditionEvaluator {
    async fn evaluate(&self, request: &CorrelationRequest) -> Result<Vec<MatchResult>> {
        let candidates = self.candidates(request).await?;
        let mut matches = Vec::new();

        for def in candidates.iter().filter(|d| !d.suspended) {
            for event in def.conditional_start_events() {
                let Some(condition) = &event.condition else {
                    continue;
                };
                let satisfied = condition.evaluate(request.variables()).with_context(|| {
                    format!(
                        "evaluating start condition '{}' of {} (start event '{}')",
                        condition.describe(),
                        def.reference,
                        event.activity_id
                    )
                })?;
                trace!(
                    definition = %def.reference,
                    start_event = %event.activity_id,
                    satisfied,
                    "Start condition evaluated"
                );
                if satisfied {
                    matches.push(MatchResult::new(
                        def.reference.clone(),
                        event.activity_id.clone(),
                    ));
                }
            }
        }

        debug!(
            candidates = candidates.len(),
            matches = matches.len(),
            "Conditional start events evaluated"
        );
        Ok(matches)
    }
}
