//! The correlation request: what the caller publishes.

use crate::error::CorrelationError;
use crate::types::VariableMap;
use serde::{Deserialize, Serialize};

/// Which tenants' definitions a correlation may reach.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantScope {
    /// No restriction.
    #[default]
    Any,
    /// Only definitions owned by this tenant.
    Tenant(String),
    /// Only definitions that belong to no tenant.
    WithoutTenant,
}

impl TenantScope {
    pub fn admits(&self, tenant_id: Option<&str>) -> bool {
        match self {
            TenantScope::Any => true,
            TenantScope::Tenant(id) => tenant_id == Some(id.as_str()),
            TenantScope::WithoutTenant => tenant_id.is_none(),
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, TenantScope::Any)
    }
}

/// Immutable, validated correlation request.
///
/// Constructed only through [`CorrelationRequest::new`] or the builder, so a
/// value of this type always carries at least one variable.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrelationRequest {
    variables: VariableMap,
    business_key: Option<String>,
    tenant_scope: TenantScope,
    process_definition_id: Option<String>,
}

impl CorrelationRequest {
    pub fn new(
        variables: VariableMap,
        business_key: Option<String>,
        tenant_scope: TenantScope,
    ) -> Result<Self, CorrelationError> {
        Self::validated(variables, business_key, tenant_scope, None)
    }

    pub fn builder() -> CorrelationRequestBuilder {
        CorrelationRequestBuilder::default()
    }

    fn validated(
        variables: VariableMap,
        business_key: Option<String>,
        tenant_scope: TenantScope,
        process_definition_id: Option<String>,
    ) -> Result<Self, CorrelationError> {
        if variables.is_empty() {
            return Err(CorrelationError::InvalidRequest(
                "variables are mandatory to start process instances by condition".into(),
            ));
        }
        if variables.keys().any(|k| k.trim().is_empty()) {
            return Err(CorrelationError::InvalidRequest(
                "variable names must not be empty".into(),
            ));
        }
        if matches!(&business_key, Some(k) if k.trim().is_empty()) {
            return Err(CorrelationError::InvalidRequest(
                "business key must not be blank when given".into(),
            ));
        }
        if process_definition_id.is_some() && tenant_scope.is_set() {
            return Err(CorrelationError::InvalidRequest(
                "cannot specify a tenant scope together with a process definition id".into(),
            ));
        }
        if matches!(&process_definition_id, Some(id) if id.trim().is_empty()) {
            return Err(CorrelationError::InvalidRequest(
                "process definition id must not be blank when given".into(),
            ));
        }

        Ok(Self {
            variables,
            business_key,
            tenant_scope,
            process_definition_id,
        })
    }

    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    pub fn business_key(&self) -> Option<&str> {
        self.business_key.as_deref()
    }

    pub fn tenant_scope(&self) -> &TenantScope {
        &self.tenant_scope
    }

    /// Restricts evaluation to a single deployed definition.
    pub fn process_definition_id(&self) -> Option<&str> {
        self.process_definition_id.as_deref()
    }
}

/// Fluent construction of a [`CorrelationRequest`]. Validation runs in
/// [`build`](Self::build).
#[derive(Clone, Debug, Default)]
pub struct CorrelationRequestBuilder {
    variables: VariableMap,
    business_key: Option<String>,
    tenant_scope: TenantScope,
    process_definition_id: Option<String>,
}

impl CorrelationRequestBuilder {
    pub fn set_variable(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn set_variables(mut self, variables: VariableMap) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn business_key(mut self, key: impl Into<String>) -> Self {
        self.business_key = Some(key.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_scope = TenantScope::Tenant(tenant_id.into());
        self
    }

    pub fn without_tenant_id(mut self) -> Self {
        self.tenant_scope = TenantScope::WithoutTenant;
        self
    }

    pub fn process_definition_id(mut self, id: impl Into<String>) -> Self {
        self.process_definition_id = Some(id.into());
        self
    }

    pub fn build(self) -> Result<CorrelationRequest, CorrelationError> {
        CorrelationRequest::validated(
            self.variables,
            self.business_key,
            self.tenant_scope,
            self.process_definition_id,
        )
    }
}
