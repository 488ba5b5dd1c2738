use async_trait::async_trait;
use tessera_core::AppResult;
use tessera_domain::{Module, ResolvedRoleGrant, ResolvedUserOverride, Role, UserId};

use super::filters::{RoleGrantFilter, UserOverrideFilter};

/// Gateway port for permission, role, and module queries.
///
/// Adapters report a table or relation that is not provisioned as
/// `AppError::DataSourceUnavailable` and every other failure as
/// `AppError::DataSource`.
#[async_trait]
pub trait PermissionDataStore: Send + Sync {
    /// Lists active roles held through active assignments of the user.
    async fn fetch_active_roles_for_user(&self, user_id: &UserId) -> AppResult<Vec<Role>>;

    /// Lists role grants joined to their permission and module.
    async fn fetch_role_grants(
        &self,
        filter: &RoleGrantFilter,
    ) -> AppResult<Vec<ResolvedRoleGrant>>;

    /// Lists direct user overrides joined to their permission and module.
    async fn fetch_user_overrides(
        &self,
        filter: &UserOverrideFilter,
    ) -> AppResult<Vec<ResolvedUserOverride>>;

    /// Lists every module regardless of user.
    async fn fetch_all_modules(&self) -> AppResult<Vec<Module>>;
}
