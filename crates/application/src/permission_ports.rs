mod data_store;
mod filters;

pub use data_store::PermissionDataStore;
pub use filters::{RoleGrantFilter, UserOverrideFilter};
