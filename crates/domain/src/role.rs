use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::{AppError, AppResult, NonEmptyString};

use crate::{RoleId, UserId};

/// Named bundle of permission grants assignable to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "active_by_default")]
    is_active: bool,
    #[serde(default)]
    is_default: bool,
}

impl Role {
    /// Creates an active, non-default role.
    pub fn new(id: RoleId, name: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            description: None,
            is_active: true,
            is_default: false,
        })
    }

    /// Sets the optional description, dropping blank values.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = normalize_optional(description);
        self
    }

    /// Sets whether the role is active.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Sets whether the role is assigned to new users.
    #[must_use]
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns whether the role is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns whether the role is the tenant default.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Returns the single default role of a tenant role listing.
    ///
    /// Fails when more than one role is flagged as default.
    pub fn ensure_single_default(roles: &[Role]) -> AppResult<Option<&Role>> {
        let mut defaults = roles.iter().filter(|role| role.is_default);
        let first = defaults.next();
        if let Some(second) = defaults.next() {
            return Err(AppError::Validation(format!(
                "only one default role is allowed, found '{}' and '{}'",
                first.map(Role::name).unwrap_or_default(),
                second.name()
            )));
        }

        Ok(first)
    }
}

/// Assignment of a role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    /// Assigned user.
    pub user_id: UserId,
    /// Assigned role.
    pub role_id: RoleId,
    /// Inactive assignments are ignored during resolution.
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    /// User that created the assignment.
    #[serde(default)]
    pub assigned_by: Option<UserId>,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
}

pub(crate) fn active_by_default() -> bool {
    true
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_owned();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
