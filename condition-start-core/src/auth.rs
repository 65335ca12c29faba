//! Authorization of matched definitions.
//!
//! Gates are pure decisions over a caller and a single match. The coordinator
//! asks the gate about every match before anything is instantiated.
//!
//! ```text
//! CompositeGate ──► PolicyGate  (CREATE_INSTANCE grant on definition key)
//!               └─► TenantGate  (caller belongs to the definition's tenant)
//! ```

use crate::evaluator::MatchResult;
use crate::types::CallerIdentity;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Permissions a grant can carry on process definitions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permission: u32 {
        /// See the definition.
        const READ = 1 << 0;

        /// Start new instances of the definition.
        const CREATE_INSTANCE = 1 << 1;

        /// No permissions.
        const NONE = 0;

        /// All permissions.
        const ALL = Self::READ.bits() | Self::CREATE_INSTANCE.bits();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny { reason: String },
}

impl AuthDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        AuthDecision::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow)
    }
}

/// Decides whether a caller may start an instance of a matched definition.
///
/// Must be free of side effects; the coordinator calls it once per match.
pub trait AuthorizationGate: Send + Sync {
    fn check(&self, caller: &CallerIdentity, matched: &MatchResult) -> AuthDecision;
}

/// Used when authorization is switched off.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAllGate;

impl AuthorizationGate for AllowAllGate {
    fn check(&self, _caller: &CallerIdentity, _matched: &MatchResult) -> AuthDecision {
        AuthDecision::Allow
    }
}

// ── PolicyGate ──

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    User(String),
    Group(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    /// Every process definition.
    AnyDefinition,
    /// All versions of one process key.
    DefinitionKey(String),
}

impl Resource {
    fn covers(&self, key: &str) -> bool {
        match self {
            Resource::AnyDefinition => true,
            Resource::DefinitionKey(k) => k == key,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub subject: Subject,
    pub resource: Resource,
    pub permissions: Permission,
}

/// Grants `CREATE_INSTANCE` based on user and group grants.
#[derive(Clone, Debug, Default)]
pub struct PolicyGate {
    grants: Vec<Grant>,
}

impl PolicyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, subject: Subject, resource: Resource, permissions: Permission) -> Self {
        self.grants.push(Grant {
            subject,
            resource,
            permissions,
        });
        self
    }

    /// Union of everything the caller holds on a definition key.
    pub fn effective_permissions(&self, caller: &CallerIdentity, key: &str) -> Permission {
        self.grants
            .iter()
            .filter(|g| g.resource.covers(key))
            .filter(|g| match &g.subject {
                Subject::User(u) => *u == caller.user_id,
                Subject::Group(grp) => caller.groups.contains(grp),
            })
            .fold(Permission::NONE, |acc, g| acc | g.permissions)
    }
}

impl AuthorizationGate for PolicyGate {
    fn check(&self, caller: &CallerIdentity, matched: &MatchResult) -> AuthDecision {
        let held = self.effective_permissions(caller, &matched.definition.key);
        if held.contains(Permission::CREATE_INSTANCE) {
            AuthDecision::Allow
        } else {
            AuthDecision::deny(format!(
                "user '{}' lacks CREATE_INSTANCE on process definition '{}'",
                caller.user_id, matched.definition.key
            ))
        }
    }
}

// ── TenantGate ──

/// A tenant-owned definition may only be started by members of that tenant.
#[derive(Clone, Copy, Debug, Default)]
pub struct TenantGate;

impl AuthorizationGate for TenantGate {
    fn check(&self, caller: &CallerIdentity, matched: &MatchResult) -> AuthDecision {
        match &matched.definition.tenant_id {
            None => AuthDecision::Allow,
            Some(tenant) if caller.is_member_of_tenant(tenant) => AuthDecision::Allow,
            Some(tenant) => AuthDecision::deny(format!(
                "user '{}' is not a member of tenant '{}'",
                caller.user_id, tenant
            )),
        }
    }
}

// ── CompositeGate ──

/// Runs every inner gate and denies if any of them does. All gates are
/// consulted so the denial reason is complete.
#[derive(Default)]
pub struct CompositeGate {
    gates: Vec<Box<dyn AuthorizationGate>>,
}

impl CompositeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, gate: impl AuthorizationGate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }
}

impl AuthorizationGate for CompositeGate {
    fn check(&self, caller: &CallerIdentity, matched: &MatchResult) -> AuthDecision {
        let reasons: Vec<String> = self
            .gates
            .iter()
            .filter_map(|g| match g.check(caller, matched) {
                AuthDecision::Allow => None,
                AuthDecision::Deny { reason } => Some(reason),
            })
            .collect();

        if reasons.is_empty() {
            AuthDecision::Allow
        } else {
            AuthDecision::deny(reasons.join("; "))
        }
    }
}
