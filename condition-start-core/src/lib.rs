//! Conditional start correlation.
//!
//! Callers publish variables; every deployed definition whose conditional
//! start event is satisfied by them gets a new process instance.
//!
//! # Architecture
//!
//! ```text
//! caller ──► CorrelationCoordinator
//!                 │
//!                 ├─► ConditionEvaluator   (no caller identity: scans everything)
//!                 ├─► zero-match check
//!                 ├─► AuthorizationGate    (every match, all-or-nothing)
//!                 └─► InstanceFactory      (one instance per match, in order)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let coordinator = CorrelationCoordinator::from_config(
//!     &CorrelationConfig::from_env()?,
//!     Arc::new(RegistryConditionEvaluator::new(registry.clone())),
//!     PolicyGate::new().grant(Subject::Group("ops".into()), Resource::AnyDefinition, Permission::ALL),
//!     Arc::new(EngineInstanceFactory::new(registry, store)),
//! );
//!
//! let request = CorrelationRequest::builder()
//!     .set_variable("orderAmount", 500)
//!     .business_key("ORD-1")
//!     .build()?;
//! let started = coordinator.correlate(&caller, &request).await?;
//! ```

pub mod auth;
pub mod condition;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod factory;
pub mod registry;
pub mod request;
pub mod store;
pub mod store_memory;
pub mod telemetry;
pub mod types;

pub use auth::{
    AllowAllGate, AuthDecision, AuthorizationGate, CompositeGate, Grant, Permission, PolicyGate,
    Resource, Subject, TenantGate,
};
pub use condition::{CompareOp, Condition, VariableCondition};
pub use config::{ConfigError, CorrelationConfig};
pub use coordinator::CorrelationCoordinator;
pub use error::{CorrelationError, CorrelationPhase, Denial};
pub use evaluator::{ConditionEvaluator, MatchResult, RegistryConditionEvaluator};
pub use events::RuntimeEvent;
pub use factory::{EngineInstanceFactory, FactoryError, InstanceFactory};
pub use registry::{DefinitionRegistry, MemoryDefinitionRegistry};
pub use request::{CorrelationRequest, CorrelationRequestBuilder, TenantScope};
pub use store::InstanceStore;
pub use store_memory::MemoryInstanceStore;
pub use types::{
    CallerIdentity, DefinitionRef, InstanceState, ProcessDefinition, ProcessInstance, StartEvent,
    Timestamp, VariableMap,
};
