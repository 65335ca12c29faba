use crate::condition::Condition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ─── Scalar aliases ───────────────────────────────────────────

/// Epoch milliseconds (UTC).
pub type Timestamp = i64;

/// Variable bindings supplied by the caller. Ordered so that hashing and
/// logging are deterministic.
pub type VariableMap = BTreeMap<String, serde_json::Value>;

// ─── Definitions ──────────────────────────────────────────────

/// Identity of a deployed process definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefinitionRef {
    /// Unique deployment id, e.g. `invoice:3:8f1c...`.
    pub id: String,
    /// Process key shared by all versions.
    pub key: String,
    pub version: u32,
    pub tenant_id: Option<String>,
}

impl fmt::Display for DefinitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:v{}", self.key, self.version)?;
        if let Some(tenant) = &self.tenant_id {
            write!(f, "@{tenant}")?;
        }
        Ok(())
    }
}

/// A start event of a deployed definition. Only events carrying a condition
/// take part in correlation.
#[derive(Clone)]
pub struct StartEvent {
    pub activity_id: String,
    pub condition: Option<Arc<dyn Condition>>,
}

impl StartEvent {
    /// A plain (non-conditional) start event.
    pub fn plain(activity_id: impl Into<String>) -> Self {
        Self {
            activity_id: activity_id.into(),
            condition: None,
        }
    }

    pub fn conditional(
        activity_id: impl Into<String>,
        condition: impl Condition + 'static,
    ) -> Self {
        Self {
            activity_id: activity_id.into(),
            condition: Some(Arc::new(condition)),
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

impl fmt::Debug for StartEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartEvent")
            .field("activity_id", &self.activity_id)
            .field("condition", &self.condition.as_ref().map(|c| c.describe()))
            .finish()
    }
}

/// A deployed process definition as seen by correlation. Deployment and
/// versioning happen elsewhere; correlation only reads it.
#[derive(Clone, Debug)]
pub struct ProcessDefinition {
    pub reference: DefinitionRef,
    pub start_events: Vec<StartEvent>,
    /// Suspended definitions stay deployed but cannot be started.
    pub suspended: bool,
}

impl ProcessDefinition {
    pub fn new(
        id: impl Into<String>,
        key: impl Into<String>,
        version: u32,
        tenant_id: Option<String>,
    ) -> Self {
        Self {
            reference: DefinitionRef {
                id: id.into(),
                key: key.into(),
                version,
                tenant_id,
            },
            start_events: Vec::new(),
            suspended: false,
        }
    }

    pub fn suspended(mut self) -> Self {
        self.suspended = true;
        self
    }

    pub fn with_start_event(mut self, event: StartEvent) -> Self {
        self.start_events.push(event);
        self
    }

    pub fn id(&self) -> &str {
        &self.reference.id
    }

    /// Look up a start event by activity id.
    pub fn find_start_event(&self, activity_id: &str) -> Option<&StartEvent> {
        self.start_events
            .iter()
            .find(|e| e.activity_id == activity_id)
    }

    pub fn conditional_start_events(&self) -> impl Iterator<Item = &StartEvent> {
        self.start_events.iter().filter(|e| e.is_conditional())
    }
}

// ─── Process instance ─────────────────────────────────────────

/// Lifecycle state of a process instance. Correlation only ever hands out
/// `Running` instances; the execution engine moves them on from there.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum InstanceState {
    Running,
    Completed { at: Timestamp },
    Cancelled { reason: String, at: Timestamp },
}

impl InstanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceState::Completed { .. } | InstanceState::Cancelled { .. }
        )
    }
}

/// A process instance created by correlation. It is already started when
/// handed out; what happens next is the execution engine's business.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProcessInstance {
    pub instance_id: Uuid,
    pub definition: DefinitionRef,
    /// Activity id of the start event the instance was started from.
    pub start_activity_id: String,
    pub business_key: Option<String>,
    pub state: InstanceState,
    /// Initial data applied when the instance started.
    pub variables: VariableMap,
    /// SHA-256 of the canonical JSON of `variables`.
    pub variables_hash: [u8; 32],
    pub created_at: Timestamp,
}

// ─── Caller identity ──────────────────────────────────────────

/// Who is asking. Authorization decisions are made against this, never
/// during condition evaluation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: String,
    pub groups: BTreeSet<String>,
    pub tenant_ids: BTreeSet<String>,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_ids.insert(tenant.into());
        self
    }

    pub fn is_member_of_tenant(&self, tenant: &str) -> bool {
        self.tenant_ids.contains(tenant)
    }
}
