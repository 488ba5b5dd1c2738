use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tessera_core::{AppError, AppResult};
use tessera_domain::{
    Module, ModuleId, Permission, PermissionAction, PermissionId, ResolvedRoleGrant,
    ResolvedUserOverride, Role, RoleId,
};
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(super) struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    is_active: bool,
    is_default: bool,
}

impl RoleRow {
    pub(super) fn into_role(self) -> AppResult<Role> {
        let role = Role::new(RoleId::from_uuid(self.id), self.name)
            .map_err(|error| decode_error("role", self.id, error))?;

        Ok(role
            .with_description(self.description)
            .with_active(self.is_active)
            .with_default(self.is_default))
    }
}

#[derive(Debug, FromRow)]
pub(super) struct ModuleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    path: Option<String>,
    icon: Option<String>,
    is_active: bool,
    parent_id: Option<Uuid>,
    sort_order: i32,
}

impl ModuleRow {
    pub(super) fn into_module(self) -> AppResult<Module> {
        let module = Module::new(ModuleId::from_uuid(self.id), self.name)
            .map_err(|error| decode_error("module", self.id, error))?
            .with_description(self.description)
            .with_active(self.is_active)
            .with_parent(self.parent_id.map(ModuleId::from_uuid))
            .with_sort_order(self.sort_order);

        Ok(with_navigation_target(module, self.path, self.icon))
    }
}

fn with_navigation_target(module: Module, path: Option<String>, icon: Option<String>) -> Module {
    let module = match path {
        Some(path) => module.with_path(path),
        None => module,
    };

    match icon {
        Some(icon) => module.with_icon(icon),
        None => module,
    }
}

/// Permission columns plus the optional left-joined module.
#[derive(Debug, FromRow)]
pub(super) struct JoinedPermissionColumns {
    permission_id: Uuid,
    permission_name: String,
    permission_description: Option<String>,
    permission_module_id: Option<Uuid>,
    permission_action: String,
    permission_is_active: bool,
    module_id: Option<Uuid>,
    module_name: Option<String>,
    module_description: Option<String>,
    module_path: Option<String>,
    module_icon: Option<String>,
    module_is_active: Option<bool>,
    module_parent_id: Option<Uuid>,
    module_sort_order: Option<i32>,
}

impl JoinedPermissionColumns {
    fn into_parts(self) -> AppResult<(Permission, Option<Module>)> {
        let action = PermissionAction::from_str(self.permission_action.as_str())
            .map_err(|error| decode_error("permission", self.permission_id, error))?;
        let permission = Permission::new(
            PermissionId::from_uuid(self.permission_id),
            self.permission_name,
            action,
        )
        .map_err(|error| decode_error("permission", self.permission_id, error))?
        .with_description(self.permission_description)
        .with_module(self.permission_module_id.map(ModuleId::from_uuid))
        .with_active(self.permission_is_active);

        let module = match (self.module_id, self.module_name) {
            (Some(module_id), Some(module_name)) => Some(
                ModuleRow {
                    id: module_id,
                    name: module_name,
                    description: self.module_description,
                    path: self.module_path,
                    icon: self.module_icon,
                    is_active: self.module_is_active.unwrap_or(true),
                    parent_id: self.module_parent_id,
                    sort_order: self.module_sort_order.unwrap_or_default(),
                }
                .into_module()?,
            ),
            _ => None,
        };

        Ok((permission, module))
    }
}

#[derive(Debug, FromRow)]
pub(super) struct RoleGrantRow {
    role_id: Uuid,
    granted: bool,
    #[sqlx(flatten)]
    permission: JoinedPermissionColumns,
}

impl RoleGrantRow {
    pub(super) fn into_resolved(self) -> AppResult<ResolvedRoleGrant> {
        let (permission, module) = self.permission.into_parts()?;

        Ok(ResolvedRoleGrant {
            role_id: RoleId::from_uuid(self.role_id),
            permission,
            module,
            granted: self.granted,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct UserOverrideRow {
    granted: bool,
    expires_at: Option<DateTime<Utc>>,
    #[sqlx(flatten)]
    permission: JoinedPermissionColumns,
}

impl UserOverrideRow {
    pub(super) fn into_resolved(self) -> AppResult<ResolvedUserOverride> {
        let (permission, module) = self.permission.into_parts()?;

        Ok(ResolvedUserOverride {
            permission,
            module,
            granted: self.granted,
            expires_at: self.expires_at,
        })
    }
}

fn decode_error(kind: &str, id: Uuid, error: AppError) -> AppError {
    AppError::DataSource(format!("failed to decode {kind} '{id}': {error}"))
}
