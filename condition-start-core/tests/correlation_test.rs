//! End-to-end correlation over the in-memory registry, gates, factory and
//! store.

use condition_start_core::telemetry::init_tracing;
use condition_start_core::{
    CallerIdentity, CompareOp, CorrelationConfig, CorrelationCoordinator, CorrelationError,
    CorrelationRequest, DefinitionRegistry, EngineInstanceFactory, InstanceState, InstanceStore,
    MemoryDefinitionRegistry, MemoryInstanceStore, Permission, PolicyGate, ProcessDefinition,
    RegistryConditionEvaluator, Resource, RuntimeEvent, StartEvent, Subject, TenantScope,
    VariableCondition, VariableMap,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

struct Harness {
    registry: Arc<MemoryDefinitionRegistry>,
    store: Arc<MemoryInstanceStore>,
    coordinator: Arc<CorrelationCoordinator>,
}

fn harness_with(config: CorrelationConfig, policy: PolicyGate) -> Harness {
    let _ = init_tracing();
    let registry = Arc::new(MemoryDefinitionRegistry::new());
    let store = Arc::new(MemoryInstanceStore::new());
    let coordinator = CorrelationCoordinator::from_config(
        &config,
        Arc::new(RegistryConditionEvaluator::new(registry.clone())),
        policy,
        Arc::new(EngineInstanceFactory::new(registry.clone(), store.clone())),
    );
    Harness {
        registry,
        store,
        coordinator: Arc::new(coordinator),
    }
}

fn harness() -> Harness {
    harness_with(
        CorrelationConfig::default(),
        PolicyGate::new().grant(
            Subject::Group("sales".into()),
            Resource::AnyDefinition,
            Permission::CREATE_INSTANCE,
        ),
    )
}

fn sales_user() -> CallerIdentity {
    CallerIdentity::new("alice").with_group("sales")
}

fn threshold_definition(id: &str, key: &str, threshold: i64) -> ProcessDefinition {
    ProcessDefinition::new(id, key, 1, None).with_start_event(StartEvent::conditional(
        "order_received",
        VariableCondition::new("orderAmount", CompareOp::Gt, threshold),
    ))
}

fn order(amount: i64) -> VariableMap {
    VariableMap::from([("orderAmount".to_string(), json!(amount))])
}

#[tokio::test]
async fn large_order_starts_one_instance_with_business_key() {
    let h = harness();
    h.registry
        .deploy(threshold_definition("large_order:1", "large_order", 100))
        .await
        .unwrap();

    let started = h
        .coordinator
        .correlate_start_by_condition(
            &sales_user(),
            order(500),
            Some("ORD-1".into()),
            TenantScope::Any,
        )
        .await
        .unwrap();

    assert_eq!(started.len(), 1);
    let inst = &started[0];
    assert_eq!(inst.business_key.as_deref(), Some("ORD-1"));
    assert_eq!(inst.definition.id, "large_order:1");
    assert_eq!(inst.start_activity_id, "order_received");
    assert_eq!(inst.state, InstanceState::Running);
    assert_eq!(inst.variables, order(500));

    let stored = h.store.find_by_business_key("ORD-1").await.unwrap();
    assert_eq!(stored, started);

    let events = h.store.read_events(inst.instance_id, 0).await.unwrap();
    assert!(matches!(
        events.last(),
        Some((2, RuntimeEvent::InstanceStarted { start_activity_id })) if start_activity_id == "order_received"
    ));
}

#[tokio::test]
async fn unsatisfied_condition_fails_with_no_matches() {
    let h = harness();
    h.registry
        .deploy(threshold_definition("large_order:1", "large_order", 1000))
        .await
        .unwrap();

    let err = h
        .coordinator
        .correlate_start_by_condition(
            &sales_user(),
            order(500),
            Some("ORD-1".into()),
            TenantScope::Any,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CorrelationError::NoMatches));
    assert_eq!(h.store.instance_count().unwrap(), 0);
}

#[tokio::test]
async fn every_matching_definition_gets_an_instance_in_order() {
    let h = harness();
    h.registry
        .deploy(threshold_definition("b_review:1", "b_review", 10))
        .await
        .unwrap();
    h.registry
        .deploy(threshold_definition("a_audit:1", "a_audit", 100))
        .await
        .unwrap();
    h.registry
        .deploy(threshold_definition("c_escalate:1", "c_escalate", 10_000))
        .await
        .unwrap();

    let request = CorrelationRequest::builder()
        .set_variable("orderAmount", 500)
        .build()
        .unwrap();
    let started = h.coordinator.correlate(&sales_user(), &request).await.unwrap();

    let ids: Vec<_> = started.iter().map(|i| i.definition.id.as_str()).collect();
    assert_eq!(ids, vec!["a_audit:1", "b_review:1"]);
    assert!(started.iter().all(|i| i.business_key.is_none()));
}

#[tokio::test]
async fn one_unauthorized_match_blocks_all_starts() {
    let h = harness_with(
        CorrelationConfig::default(),
        PolicyGate::new().grant(
            Subject::User("bob".into()),
            Resource::DefinitionKey("allowed".into()),
            Permission::CREATE_INSTANCE,
        ),
    );
    h.registry
        .deploy(threshold_definition("allowed:1", "allowed", 0))
        .await
        .unwrap();
    h.registry
        .deploy(threshold_definition("forbidden:1", "forbidden", 0))
        .await
        .unwrap();

    let err = h
        .coordinator
        .correlate_start_by_condition(
            &CallerIdentity::new("bob"),
            order(1),
            None,
            TenantScope::Any,
        )
        .await
        .unwrap_err();

    let CorrelationError::AuthorizationFailed { matched, denied } = err else {
        panic!("expected AuthorizationFailed");
    };
    assert_eq!(matched, 2);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].definition_id, "forbidden:1");
    assert_eq!(h.store.instance_count().unwrap(), 0);
}

#[tokio::test]
async fn tenant_definitions_need_tenant_membership() {
    let h = harness();
    h.registry
        .deploy(
            ProcessDefinition::new("claims:1:acme", "claims", 1, Some("acme".into()))
                .with_start_event(StartEvent::conditional(
                    "claim_filed",
                    VariableCondition::exists("claimId"),
                )),
        )
        .await
        .unwrap();
    let vars = VariableMap::from([("claimId".to_string(), json!("C-7"))]);

    let err = h
        .coordinator
        .correlate_start_by_condition(&sales_user(), vars.clone(), None, TenantScope::Any)
        .await
        .unwrap_err();
    assert!(matches!(err, CorrelationError::AuthorizationFailed { .. }));

    let member = sales_user().with_tenant("acme");
    let started = h
        .coordinator
        .correlate_start_by_condition(
            &member,
            vars,
            None,
            TenantScope::Tenant("acme".into()),
        )
        .await
        .unwrap();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].definition.tenant_id.as_deref(), Some("acme"));
}

#[tokio::test]
async fn only_latest_version_is_started() {
    let h = harness();
    h.registry
        .deploy(threshold_definition("order:1", "order", 0))
        .await
        .unwrap();
    h.registry
        .deploy(
            ProcessDefinition::new("order:2", "order", 2, None).with_start_event(
                StartEvent::conditional(
                    "order_received",
                    VariableCondition::new("orderAmount", CompareOp::Gt, 0),
                ),
            ),
        )
        .await
        .unwrap();

    let started = h
        .coordinator
        .correlate_start_by_condition(&sales_user(), order(1), None, TenantScope::Any)
        .await
        .unwrap();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].definition.version, 2);
}

#[tokio::test]
async fn same_request_twice_starts_twice() {
    let h = harness();
    h.registry
        .deploy(threshold_definition("large_order:1", "large_order", 100))
        .await
        .unwrap();

    for _ in 0..2 {
        let started = h
            .coordinator
            .correlate_start_by_condition(
                &sales_user(),
                order(500),
                Some("ORD-1".into()),
                TenantScope::Any,
            )
            .await
            .unwrap();
        assert_eq!(started.len(), 1);
    }

    assert_eq!(h.store.find_by_business_key("ORD-1").await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_correlations_do_not_interfere() {
    let h = harness();
    h.registry
        .deploy(threshold_definition("small:1", "small", 0))
        .await
        .unwrap();
    h.registry
        .deploy(threshold_definition("large:1", "large", 100))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..8 {
        let coordinator = h.coordinator.clone();
        handles.push(tokio::spawn(async move {
            let amount = if n % 2 == 0 { 500 } else { 50 };
            coordinator
                .correlate_start_by_condition(
                    &sales_user(),
                    order(amount),
                    Some(format!("ORD-{n}")),
                    TenantScope::Any,
                )
                .await
        }));
    }

    let mut all_ids = HashSet::new();
    for (n, handle) in handles.into_iter().enumerate() {
        let started = handle.await.unwrap().unwrap();
        let expected = if n % 2 == 0 { 2 } else { 1 };
        assert_eq!(started.len(), expected);
        for inst in &started {
            assert_eq!(inst.business_key, Some(format!("ORD-{n}")));
            all_ids.insert(inst.instance_id);
        }
    }

    assert_eq!(all_ids.len(), 12);
    assert_eq!(h.store.instance_count().unwrap(), 12);
}

#[tokio::test]
async fn evaluation_fault_starts_nothing() {
    let h = harness();
    h.registry
        .deploy(threshold_definition("large_order:1", "large_order", 100))
        .await
        .unwrap();

    let vars = VariableMap::from([("orderAmount".to_string(), json!("five hundred"))]);
    let err = h
        .coordinator
        .correlate_start_by_condition(&sales_user(), vars, None, TenantScope::Any)
        .await
        .unwrap_err();

    assert!(matches!(err, CorrelationError::EvaluationError(_)));
    assert_eq!(h.store.instance_count().unwrap(), 0);
}
