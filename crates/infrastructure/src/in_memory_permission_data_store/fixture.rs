use serde::Deserialize;
use tessera_core::{AppError, AppResult};
use tessera_domain::{
    Module, Permission, Role, RoleGrant, UserPermissionOverride, UserRoleAssignment,
};

/// Storage table an in-memory store can report as not provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureTable {
    /// `roles`
    Roles,
    /// `modules`
    Modules,
    /// `permissions`
    Permissions,
    /// `role_permissions`
    RolePermissions,
    /// `user_roles`
    UserRoles,
    /// `user_permissions`
    UserPermissions,
}

impl FixtureTable {
    /// Returns the relational table name.
    #[must_use]
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Roles => "roles",
            Self::Modules => "modules",
            Self::Permissions => "permissions",
            Self::RolePermissions => "role_permissions",
            Self::UserRoles => "user_roles",
            Self::UserPermissions => "user_permissions",
        }
    }
}

/// Seed data for the in-memory permission store.
///
/// Every list is optional in JSON. `unavailable` lists tables the store
/// reports as not provisioned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionFixture {
    /// Role catalog.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Navigation modules.
    #[serde(default)]
    pub modules: Vec<Module>,
    /// Permission catalog.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Role to permission rows.
    #[serde(default)]
    pub role_grants: Vec<RoleGrant>,
    /// User to role assignments.
    #[serde(default)]
    pub user_roles: Vec<UserRoleAssignment>,
    /// Direct user grants and revocations.
    #[serde(default)]
    pub user_overrides: Vec<UserPermissionOverride>,
    /// Tables reported as not provisioned.
    #[serde(default)]
    pub unavailable: Vec<FixtureTable>,
}

impl PermissionFixture {
    /// Parses a fixture from its JSON document.
    pub fn from_json(document: &str) -> AppResult<Self> {
        let fixture: Self = serde_json::from_str(document)
            .map_err(|error| AppError::Validation(format!("invalid permission fixture: {error}")))?;
        Role::ensure_single_default(&fixture.roles)?;

        Ok(fixture)
    }
}
