//! Application services and ports of the permission engine.

#![forbid(unsafe_code)]

mod config;
mod module_tree;
mod permission_ports;
mod permission_resolver;
mod permission_session;
mod permission_snapshot;
mod ttl_cache;

#[cfg(test)]
mod test_support;

pub use config::{
    DEFAULT_CHECK_CACHE_TTL, DEFAULT_RESOLVE_TIMEOUT, DEFAULT_SESSION_TTL, PermissionEngineConfig,
};
pub use module_tree::build_module_tree;
pub use permission_ports::{PermissionDataStore, RoleGrantFilter, UserOverrideFilter};
pub use permission_resolver::PermissionResolver;
pub use permission_session::{PermissionSession, SessionPhase};
pub use permission_snapshot::PermissionSnapshot;
pub use ttl_cache::{
    TtlCache, module_access_key, permission_check_key, user_modules_key, user_permissions_key,
};
