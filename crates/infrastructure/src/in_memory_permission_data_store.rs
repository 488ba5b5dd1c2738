mod fixture;

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tessera_application::{PermissionDataStore, RoleGrantFilter, UserOverrideFilter};
use tessera_core::{AppError, AppResult};
use tessera_domain::{
    Module, ModuleId, Permission, PermissionId, ResolvedRoleGrant, ResolvedUserOverride, Role,
    UserId,
};
use tokio::sync::RwLock;
use tracing::debug;

pub use fixture::{FixtureTable, PermissionFixture};

/// In-memory permission store seeded from a fixture.
#[derive(Debug, Default)]
pub struct InMemoryPermissionDataStore {
    fixture: RwLock<PermissionFixture>,
}

impl InMemoryPermissionDataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store serving the fixture.
    #[must_use]
    pub fn from_fixture(fixture: PermissionFixture) -> Self {
        Self {
            fixture: RwLock::new(fixture),
        }
    }

    /// Replaces all stored data.
    pub async fn replace_fixture(&self, fixture: PermissionFixture) -> AppResult<()> {
        Role::ensure_single_default(&fixture.roles)?;
        *self.fixture.write().await = fixture;
        Ok(())
    }

    /// Marks a table as not provisioned.
    pub async fn mark_unavailable(&self, table: FixtureTable) {
        let mut fixture = self.fixture.write().await;
        if !fixture.unavailable.contains(&table) {
            fixture.unavailable.push(table);
        }
    }
}

fn ensure_available(fixture: &PermissionFixture, tables: &[FixtureTable]) -> AppResult<()> {
    match tables
        .iter()
        .find(|table| fixture.unavailable.contains(table))
    {
        Some(table) => Err(AppError::DataSourceUnavailable(format!(
            "relation \"{}\" does not exist",
            table.table_name()
        ))),
        None => Ok(()),
    }
}

struct Catalog<'a> {
    permissions: BTreeMap<PermissionId, &'a Permission>,
    modules: BTreeMap<ModuleId, &'a Module>,
}

impl<'a> Catalog<'a> {
    fn new(fixture: &'a PermissionFixture) -> Self {
        Self {
            permissions: fixture
                .permissions
                .iter()
                .map(|permission| (permission.id(), permission))
                .collect(),
            modules: fixture
                .modules
                .iter()
                .map(|module| (module.id(), module))
                .collect(),
        }
    }

    fn permission_with_module(
        &self,
        permission_id: PermissionId,
    ) -> Option<(Permission, Option<Module>)> {
        let Some(permission) = self.permissions.get(&permission_id) else {
            debug!(permission_id = %permission_id, "skipping row for unknown permission");
            return None;
        };

        let module = permission
            .module_id()
            .and_then(|module_id| self.modules.get(&module_id))
            .map(|module| (*module).clone());

        Some(((*permission).clone(), module))
    }
}

#[async_trait]
impl PermissionDataStore for InMemoryPermissionDataStore {
    async fn fetch_active_roles_for_user(&self, user_id: &UserId) -> AppResult<Vec<Role>> {
        let fixture = self.fixture.read().await;
        ensure_available(&fixture, &[FixtureTable::UserRoles, FixtureTable::Roles])?;

        let assigned: HashSet<_> = fixture
            .user_roles
            .iter()
            .filter(|assignment| assignment.is_active && &assignment.user_id == user_id)
            .map(|assignment| assignment.role_id)
            .collect();

        let mut roles: Vec<Role> = fixture
            .roles
            .iter()
            .filter(|role| role.is_active() && assigned.contains(&role.id()))
            .cloned()
            .collect();
        roles.sort_by(|left, right| {
            left.name()
                .cmp(right.name())
                .then_with(|| left.id().cmp(&right.id()))
        });
        roles.dedup_by_key(|role| role.id());

        Ok(roles)
    }

    async fn fetch_role_grants(
        &self,
        filter: &RoleGrantFilter,
    ) -> AppResult<Vec<ResolvedRoleGrant>> {
        let fixture = self.fixture.read().await;
        ensure_available(
            &fixture,
            &[
                FixtureTable::RolePermissions,
                FixtureTable::Permissions,
                FixtureTable::Modules,
            ],
        )?;

        let catalog = Catalog::new(&fixture);
        Ok(fixture
            .role_grants
            .iter()
            .filter(|grant| filter.matches(grant.role_id, grant.granted))
            .filter_map(|grant| {
                catalog
                    .permission_with_module(grant.permission_id)
                    .map(|(permission, module)| ResolvedRoleGrant {
                        role_id: grant.role_id,
                        permission,
                        module,
                        granted: grant.granted,
                    })
            })
            .collect())
    }

    async fn fetch_user_overrides(
        &self,
        filter: &UserOverrideFilter,
    ) -> AppResult<Vec<ResolvedUserOverride>> {
        let fixture = self.fixture.read().await;
        ensure_available(
            &fixture,
            &[
                FixtureTable::UserPermissions,
                FixtureTable::Permissions,
                FixtureTable::Modules,
            ],
        )?;

        let catalog = Catalog::new(&fixture);
        Ok(fixture
            .user_overrides
            .iter()
            .filter(|user_override| {
                &user_override.user_id == filter.user_id() && filter.matches(user_override.expires_at)
            })
            .filter_map(|user_override| {
                catalog
                    .permission_with_module(user_override.permission_id)
                    .map(|(permission, module)| ResolvedUserOverride {
                        permission,
                        module,
                        granted: user_override.granted,
                        expires_at: user_override.expires_at,
                    })
            })
            .collect())
    }

    async fn fetch_all_modules(&self) -> AppResult<Vec<Module>> {
        let fixture = self.fixture.read().await;
        ensure_available(&fixture, &[FixtureTable::Modules])?;

        let mut modules = fixture.modules.clone();
        modules.sort_by(Module::navigation_cmp);

        Ok(modules)
    }
}
