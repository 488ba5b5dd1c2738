//! Domain entities and invariants of the permission engine.

#![forbid(unsafe_code)]

mod effective;
mod ids;
mod module;
mod permission;
mod role;

pub use effective::{DetailedPermission, EffectivePermissionSet};
pub use ids::{ModuleId, PermissionId, RoleId, UserId};
pub use module::{BrokenParentLink, Module, ModuleForest, ModuleNode};
pub use permission::{
    Permission, PermissionAction, ResolvedRoleGrant, ResolvedUserOverride, RoleGrant,
    UserPermissionOverride,
};
pub use role::{Role, UserRoleAssignment};
