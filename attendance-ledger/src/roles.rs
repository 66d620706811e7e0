//! Identity & role resolution
//!
//! Classifies a caller against two independent predicates: is it the fixed
//! administrator, and does it hold an active participant record. Pure
//! lookups, no mutation.

use crate::types::{Identity, Participant, Role};
use crate::Result;
use std::sync::Arc;

/// Read access to participant records
pub trait ParticipantDirectory: Send + Sync {
    /// Participant record for an identity, if one was ever created
    fn participant(&self, identity: &Identity) -> Result<Option<Participant>>;
}

/// Resolves caller roles against the fixed administrator and a directory
pub struct RoleResolver<D: ?Sized = dyn ParticipantDirectory> {
    admin: Identity,
    directory: Arc<D>,
}

impl<D: ParticipantDirectory + ?Sized> RoleResolver<D> {
    /// Create a resolver for the given administrator
    pub fn new(admin: Identity, directory: Arc<D>) -> Self {
        Self { admin, directory }
    }

    /// The fixed administrator identity
    pub fn admin(&self) -> &Identity {
        &self.admin
    }

    /// True iff `identity` is the administrator
    pub fn is_admin(&self, identity: &Identity) -> bool {
        *identity == self.admin
    }

    /// Raw-input form of [`RoleResolver::is_admin`]
    pub fn is_admin_raw(&self, raw: &str) -> Result<bool> {
        Ok(self.is_admin(&Identity::parse(raw)?))
    }

    /// True iff `identity` holds a participant record with `registered = true`
    pub fn is_registered(&self, identity: &Identity) -> Result<bool> {
        Ok(self
            .directory
            .participant(identity)?
            .map_or(false, |p| p.registered))
    }

    /// Combined classification; the administrator wins over participant
    pub fn resolve(&self, identity: &Identity) -> Result<Role> {
        if self.is_admin(identity) {
            return Ok(Role::Administrator);
        }
        if self.is_registered(identity)? {
            Ok(Role::Participant)
        } else {
            Ok(Role::Unregistered)
        }
    }
}

impl<D: ?Sized> Clone for RoleResolver<D> {
    fn clone(&self) -> Self {
        Self {
            admin: self.admin.clone(),
            directory: Arc::clone(&self.directory),
        }
    }
}

impl<D: ?Sized> std::fmt::Debug for RoleResolver<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleResolver")
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}
