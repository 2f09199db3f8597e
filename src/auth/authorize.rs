//! Role and ownership authorization.
//!
//! Decisions are pure functions of the caller identity and, for ownership,
//! the owner id reported by the storage layer. Nothing here keeps state.

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;

use crate::auth::claims::{Identity, SubjectId};
use crate::error::{ForbiddenReason, GateError};

/// Elevated roles a route can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
}

impl Role {
    fn held_by(&self, identity: &Identity) -> bool {
        match self {
            Role::Admin => identity.is_admin,
        }
    }
}

/// Admit only callers holding `role`.
pub fn require_role(identity: &Identity, role: Role) -> Result<(), GateError> {
    if role.held_by(identity) {
        Ok(())
    } else {
        Err(GateError::Forbidden(ForbiddenReason::RoleRequired))
    }
}

/// Admit the resource owner, or any caller holding `role`.
pub fn require_owner_or_role(
    identity: &Identity,
    owner: &SubjectId,
    role: Role,
) -> Result<(), GateError> {
    if &identity.subject_id == owner || role.held_by(identity) {
        Ok(())
    } else {
        Err(GateError::Forbidden(ForbiddenReason::NotOwner))
    }
}

/// Kinds of owned content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Post,
    Service,
    Course,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Post => write!(f, "post"),
            ResourceKind::Service => write!(f, "service"),
            ResourceKind::Course => write!(f, "course"),
        }
    }
}

/// Storage lookup failed.
#[derive(Debug, thiserror::Error)]
#[error("ownership lookup failed: {0}")]
pub struct ResolverError(pub String);

impl From<ResolverError> for GateError {
    fn from(e: ResolverError) -> Self {
        GateError::Internal(e.to_string())
    }
}

/// Storage capability consumed by the ownership gate.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// Owner of the resource, or `None` when it does not exist.
    async fn owner_of(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> Result<Option<SubjectId>, ResolverError>;
}

/// Resolve the owner and apply [`require_owner_or_role`].
pub async fn authorize_owner(
    resolver: &dyn OwnershipResolver,
    identity: &Identity,
    kind: ResourceKind,
    resource_id: &str,
) -> Result<(), GateError> {
    let owner = resolver
        .owner_of(kind, resource_id)
        .await?
        .ok_or(GateError::NotFound)?;

    require_owner_or_role(identity, &owner, Role::Admin).inspect_err(|_| {
        tracing::warn!(
            subject = %identity.subject_id,
            resource = %kind,
            resource_id = %resource_id,
            "Ownership check failed"
        );
    })
}

/// In-memory ownership table.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    owners: DashMap<(ResourceKind, String), SubjectId>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: ResourceKind, resource_id: impl Into<String>, owner: SubjectId) {
        self.owners.insert((kind, resource_id.into()), owner);
    }

    pub fn remove(&self, kind: ResourceKind, resource_id: &str) -> Option<SubjectId> {
        self.owners
            .remove(&(kind, resource_id.to_string()))
            .map(|(_, owner)| owner)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[async_trait]
impl OwnershipResolver for InMemoryDirectory {
    async fn owner_of(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> Result<Option<SubjectId>, ResolverError> {
        Ok(self
            .owners
            .get(&(kind, resource_id.to_string()))
            .map(|r| r.value().clone()))
    }
}
