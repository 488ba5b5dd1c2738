mod rows;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tessera_application::{PermissionDataStore, RoleGrantFilter, UserOverrideFilter};
use tessera_core::{AppError, AppResult};
use tessera_domain::{Module, ResolvedRoleGrant, ResolvedUserOverride, Role, UserId};
use tracing::debug;
use uuid::Uuid;

use rows::{ModuleRow, RoleGrantRow, RoleRow, UserOverrideRow};

const UNDEFINED_TABLE: &str = "42P01";
const UNDEFINED_COLUMN: &str = "42703";

/// PostgreSQL-backed permission store.
#[derive(Clone)]
pub struct PostgresPermissionDataStore {
    pool: PgPool,
}

impl PostgresPermissionDataStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a SQLSTATE to the engine error taxonomy.
fn classify_sqlstate(code: Option<&str>, relation: &str, detail: &str) -> AppError {
    match code {
        Some(UNDEFINED_TABLE | UNDEFINED_COLUMN) => AppError::DataSourceUnavailable(format!(
            "{relation} is not provisioned: {detail}"
        )),
        _ => AppError::DataSource(format!("failed to query {relation}: {detail}")),
    }
}

fn classify_query_error(relation: &str, error: sqlx::Error) -> AppError {
    let code = error
        .as_database_error()
        .and_then(|database_error| database_error.code())
        .map(|code| code.into_owned());

    classify_sqlstate(code.as_deref(), relation, &error.to_string())
}

#[async_trait]
impl PermissionDataStore for PostgresPermissionDataStore {
    async fn fetch_active_roles_for_user(&self, user_id: &UserId) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT DISTINCT
                roles.id,
                roles.name,
                roles.description,
                roles.is_active,
                roles.is_default
            FROM user_roles
            INNER JOIN roles ON roles.id = user_roles.role_id
            WHERE user_roles.user_id = $1
                AND user_roles.is_active
                AND roles.is_active
            ORDER BY roles.name, roles.id
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| classify_query_error("user roles", error))?;

        rows.into_iter().map(RoleRow::into_role).collect()
    }

    async fn fetch_role_grants(
        &self,
        filter: &RoleGrantFilter,
    ) -> AppResult<Vec<ResolvedRoleGrant>> {
        let role_ids: Vec<Uuid> = filter.role_ids().iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, RoleGrantRow>(
            r#"
            SELECT
                role_permissions.role_id,
                role_permissions.granted,
                permissions.id AS permission_id,
                permissions.name AS permission_name,
                permissions.description AS permission_description,
                permissions.module_id AS permission_module_id,
                permissions.action AS permission_action,
                permissions.is_active AS permission_is_active,
                modules.id AS module_id,
                modules.name AS module_name,
                modules.description AS module_description,
                modules.path AS module_path,
                modules.icon AS module_icon,
                modules.is_active AS module_is_active,
                modules.parent_id AS module_parent_id,
                modules.sort_order AS module_sort_order
            FROM role_permissions
            INNER JOIN permissions ON permissions.id = role_permissions.permission_id
            LEFT JOIN modules ON modules.id = permissions.module_id
            WHERE role_permissions.role_id = ANY($1)
                AND ($2 OR role_permissions.granted)
            ORDER BY permissions.name, role_permissions.role_id
            "#,
        )
        .bind(role_ids)
        .bind(filter.include_revoked())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| classify_query_error("role permissions", error))?;

        debug!(
            roles = filter.role_ids().len(),
            rows = rows.len(),
            "fetched role permission rows"
        );
        rows.into_iter().map(RoleGrantRow::into_resolved).collect()
    }

    async fn fetch_user_overrides(
        &self,
        filter: &UserOverrideFilter,
    ) -> AppResult<Vec<ResolvedUserOverride>> {
        let as_of: DateTime<Utc> = filter.as_of();
        let rows = sqlx::query_as::<_, UserOverrideRow>(
            r#"
            SELECT
                user_permissions.granted,
                user_permissions.expires_at,
                permissions.id AS permission_id,
                permissions.name AS permission_name,
                permissions.description AS permission_description,
                permissions.module_id AS permission_module_id,
                permissions.action AS permission_action,
                permissions.is_active AS permission_is_active,
                modules.id AS module_id,
                modules.name AS module_name,
                modules.description AS module_description,
                modules.path AS module_path,
                modules.icon AS module_icon,
                modules.is_active AS module_is_active,
                modules.parent_id AS module_parent_id,
                modules.sort_order AS module_sort_order
            FROM user_permissions
            INNER JOIN permissions ON permissions.id = user_permissions.permission_id
            LEFT JOIN modules ON modules.id = permissions.module_id
            WHERE user_permissions.user_id = $1
                AND (
                    $2
                    OR user_permissions.expires_at IS NULL
                    OR user_permissions.expires_at > $3
                )
            ORDER BY permissions.name
            "#,
        )
        .bind(filter.user_id().as_str())
        .bind(filter.include_expired())
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| classify_query_error("user permissions", error))?;

        rows.into_iter().map(UserOverrideRow::into_resolved).collect()
    }

    async fn fetch_all_modules(&self) -> AppResult<Vec<Module>> {
        let rows = sqlx::query_as::<_, ModuleRow>(
            r#"
            SELECT id, name, description, path, icon, is_active, parent_id, sort_order
            FROM modules
            ORDER BY sort_order, name, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| classify_query_error("modules", error))?;

        rows.into_iter().map(ModuleRow::into_module).collect()
    }
}
