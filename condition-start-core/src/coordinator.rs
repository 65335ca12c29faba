//! Conditional start correlation.
//!
//! One call runs `Idle → Evaluating → ZeroMatchCheck → Authorizing →
//! Instantiating → Done`, or stops in the phase that failed. Steps run
//! sequentially; the host is expected to wrap the call in its own
//! transaction.

use crate::auth::{
    AllowAllGate, AuthDecision, AuthorizationGate, CompositeGate, PolicyGate, TenantGate,
};
use crate::config::CorrelationConfig;
use crate::error::{CorrelationError, CorrelationPhase, Denial};
use crate::evaluator::{ConditionEvaluator, MatchResult};
use crate::factory::{FactoryError, InstanceFactory};
use crate::request::{CorrelationRequest, TenantScope};
use crate::types::{CallerIdentity, ProcessInstance, VariableMap};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Starts one process instance per definition whose start condition is
/// satisfied by the published variables.
pub struct CorrelationCoordinator {
    evaluator: Arc<dyn ConditionEvaluator>,
    gate: Arc<dyn AuthorizationGate>,
    factory: Arc<dyn InstanceFactory>,
}

impl CorrelationCoordinator {
    pub fn new(
        evaluator: Arc<dyn ConditionEvaluator>,
        gate: Arc<dyn AuthorizationGate>,
        factory: Arc<dyn InstanceFactory>,
    ) -> Self {
        Self {
            evaluator,
            gate,
            factory,
        }
    }

    /// Build the gate stack from configuration: no checks when authorization
    /// is off, otherwise the policy gate, plus the tenant gate if enabled.
    pub fn from_config(
        config: &CorrelationConfig,
        evaluator: Arc<dyn ConditionEvaluator>,
        policy: PolicyGate,
        factory: Arc<dyn InstanceFactory>,
    ) -> Self {
        let gate: Arc<dyn AuthorizationGate> = if !config.authorization_enabled {
            Arc::new(AllowAllGate)
        } else if config.tenant_check_enabled {
            Arc::new(CompositeGate::new().with(policy).with(TenantGate))
        } else {
            Arc::new(policy)
        };
        Self::new(evaluator, gate, factory)
    }

    /// Validate the inputs into a request, then correlate it.
    pub async fn correlate_start_by_condition(
        &self,
        caller: &CallerIdentity,
        variables: VariableMap,
        business_key: Option<String>,
        tenant_scope: TenantScope,
    ) -> Result<Vec<ProcessInstance>, CorrelationError> {
        let request = CorrelationRequest::new(variables, business_key, tenant_scope).inspect_err(
            |e| warn!(phase = %CorrelationPhase::Idle, error = %e, "Correlation rejected"),
        )?;
        self.correlate(caller, &request).await
    }

    /// Correlate an already validated request.
    ///
    /// Returns the created instances in evaluation order. A factory fault
    /// aborts the call; instances created before it are not rolled back here.
    #[instrument(
        skip(self, caller, request),
        fields(
            user = %caller.user_id,
            business_key = request.business_key().unwrap_or(""),
            tenant_scope = ?request.tenant_scope(),
        )
    )]
    pub async fn correlate(
        &self,
        caller: &CallerIdentity,
        request: &CorrelationRequest,
    ) -> Result<Vec<ProcessInstance>, CorrelationError> {
        debug!(
            phase = %CorrelationPhase::Evaluating,
            variables = request.variables().len(),
            "Evaluating start conditions"
        );
        let matches = self.evaluator.evaluate(request).await.map_err(|e| {
            error!(
                phase = %CorrelationPhase::Evaluating,
                error = %e,
                "Condition evaluation failed"
            );
            CorrelationError::EvaluationError(e)
        })?;

        debug!(phase = %CorrelationPhase::ZeroMatchCheck, matches = matches.len());
        if matches.is_empty() {
            warn!("No conditional start event matched");
            return Err(CorrelationError::NoMatches);
        }

        debug!(phase = %CorrelationPhase::Authorizing, matches = matches.len());
        self.authorize_all(caller, &matches)?;

        debug!(phase = %CorrelationPhase::Instantiating, matches = matches.len());
        let mut instances = Vec::with_capacity(matches.len());
        for m in &matches {
            let instance = self
                .factory
                .instantiate(
                    &m.definition,
                    &m.start_event_id,
                    request.business_key(),
                    request.variables(),
                )
                .await
                .map_err(|e| {
                    error!(
                        phase = %CorrelationPhase::Instantiating,
                        definition = %m.definition,
                        start_event = %m.start_event_id,
                        already_created = instances.len(),
                        error = %e,
                        "Instantiation failed"
                    );
                    match e {
                        FactoryError::StartEventNotFound {
                            definition_id,
                            start_event_id,
                        } => CorrelationError::StartEventNotFound {
                            definition_id,
                            start_event_id,
                        },
                        FactoryError::Other(e) => CorrelationError::InstantiationError(e),
                    }
                })?;
            instances.push(instance);
        }

        info!(
            phase = %CorrelationPhase::Done,
            started = instances.len(),
            "Conditional start correlation completed"
        );
        Ok(instances)
    }

    /// Ask the gate about every match, then fail if any was denied.
    fn authorize_all(
        &self,
        caller: &CallerIdentity,
        matches: &[MatchResult],
    ) -> Result<(), CorrelationError> {
        let denied: Vec<Denial> = matches
            .iter()
            .filter_map(|m| match self.gate.check(caller, m) {
                AuthDecision::Allow => None,
                AuthDecision::Deny { reason } => Some(Denial {
                    definition_id: m.definition.id.clone(),
                    start_event_id: m.start_event_id.clone(),
                    reason,
                }),
            })
            .collect();

        if denied.is_empty() {
            return Ok(());
        }
        for d in &denied {
            warn!(
                definition = %d.definition_id,
                start_event = %d.start_event_id,
                reason = %d.reason,
                "Start denied"
            );
        }
        Err(CorrelationError::AuthorizationFailed {
            matched: matches.len(),
            denied,
        })
    }
}
