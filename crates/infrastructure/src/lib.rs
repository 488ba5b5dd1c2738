//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_permission_data_store;
mod postgres_permission_data_store;

pub use in_memory_permission_data_store::{
    FixtureTable, InMemoryPermissionDataStore, PermissionFixture,
};
pub use postgres_permission_data_store::PostgresPermissionDataStore;
