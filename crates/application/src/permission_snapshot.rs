use chrono::{DateTime, Utc};
use serde::Serialize;
use tessera_domain::{EffectivePermissionSet, Module, Role, UserId};

/// Resolved authorization state of one user at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSnapshot {
    user_id: UserId,
    roles: Vec<Role>,
    effective: EffectivePermissionSet,
    resolved_at: DateTime<Utc>,
}

impl PermissionSnapshot {
    /// Creates a snapshot from resolver output.
    #[must_use]
    pub fn new(
        user_id: UserId,
        roles: Vec<Role>,
        effective: EffectivePermissionSet,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            roles,
            effective,
            resolved_at,
        }
    }

    /// Returns the user the snapshot belongs to.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the active roles of the user.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Returns the merged permission set.
    #[must_use]
    pub fn effective(&self) -> &EffectivePermissionSet {
        &self.effective
    }

    /// Returns the wall-clock time of resolution.
    #[must_use]
    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    /// Returns whether the user holds a role with the name.
    #[must_use]
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name() == name)
    }

    /// Returns the modules readable by the user.
    #[must_use]
    pub fn accessible_modules(&self) -> &[Module] {
        self.effective.accessible_modules()
    }
}
