use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::{AppError, AppResult, NonEmptyString};

use crate::role::{active_by_default, normalize_optional};
use crate::{Module, ModuleId, PermissionId, RoleId, UserId};

/// Action a permission authorizes on its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    /// Create records.
    Create,
    /// Read records; grants module visibility.
    Read,
    /// Update records.
    Update,
    /// Delete records.
    Delete,
    /// Run module-specific operations.
    Execute,
}

impl PermissionAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Execute => "execute",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionAction] = &[
            PermissionAction::Create,
            PermissionAction::Read,
            PermissionAction::Update,
            PermissionAction::Delete,
            PermissionAction::Execute,
        ];

        ALL
    }

    /// Returns the conventional permission name for a module key.
    #[must_use]
    pub fn permission_name(&self, module_key: &str) -> String {
        format!("{module_key}_{}", self.as_str())
    }
}

impl FromStr for PermissionAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "execute" => Ok(Self::Execute),
            _ => Err(AppError::Validation(format!(
                "unknown permission action '{value}'"
            ))),
        }
    }
}

/// Named capability, optionally bound to one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    id: PermissionId,
    name: NonEmptyString,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    module_id: Option<ModuleId>,
    action: PermissionAction,
    #[serde(default = "active_by_default")]
    is_active: bool,
}

impl Permission {
    /// Creates an active permission without a module binding.
    pub fn new(
        id: PermissionId,
        name: impl Into<String>,
        action: PermissionAction,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            description: None,
            module_id: None,
            action,
            is_active: true,
        })
    }

    /// Sets the optional description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = normalize_optional(description);
        self
    }

    /// Binds the permission to a module.
    #[must_use]
    pub fn with_module(mut self, module_id: Option<ModuleId>) -> Self {
        self.module_id = module_id;
        self
    }

    /// Sets whether the permission is active.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns the permission identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the permission name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the module the permission belongs to.
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        self.module_id
    }

    /// Returns the authorized action.
    #[must_use]
    pub fn action(&self) -> PermissionAction {
        self.action
    }

    /// Returns whether the permission is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Persisted role to permission grant row.
///
/// `granted = false` marks an explicit revocation on that role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Granting role.
    pub role_id: RoleId,
    /// Granted permission.
    pub permission_id: PermissionId,
    /// Grant flag.
    #[serde(default = "active_by_default")]
    pub granted: bool,
}

/// Persisted direct grant or revocation for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissionOverride {
    /// Affected user.
    pub user_id: UserId,
    /// Affected permission.
    pub permission_id: PermissionId,
    /// `true` grants, `false` revokes.
    pub granted: bool,
    /// Optional expiry; expired overrides are inert.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserPermissionOverride {
    /// Returns whether the override still applies at `now`.
    #[must_use]
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        in_effect(self.expires_at, now)
    }
}

/// Role grant joined to its permission and module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoleGrant {
    /// Role the grant came from.
    pub role_id: RoleId,
    /// Granted permission.
    pub permission: Permission,
    /// Module of the permission, when bound and present.
    pub module: Option<Module>,
    /// Grant flag.
    pub granted: bool,
}

/// User override joined to its permission and module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUserOverride {
    /// Affected permission.
    pub permission: Permission,
    /// Module of the permission, when bound and present.
    pub module: Option<Module>,
    /// `true` grants, `false` revokes.
    pub granted: bool,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ResolvedUserOverride {
    /// Returns whether the override still applies at `now`.
    #[must_use]
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        in_effect(self.expires_at, now)
    }
}

fn in_effect(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_none_or(|expires_at| expires_at > now)
}
