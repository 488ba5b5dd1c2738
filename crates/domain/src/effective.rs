//! Effective permission set merged from role grants and user overrides.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    Module, ModuleId, Permission, PermissionAction, PermissionId, ResolvedRoleGrant,
    ResolvedUserOverride,
};

/// Permission together with the module snapshot it was resolved with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedPermission {
    /// Granted permission.
    pub permission: Permission,
    /// Module the permission belongs to, if any.
    pub module: Option<Module>,
}

/// Materialized authorization state of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectivePermissionSet {
    permission_names: BTreeSet<String>,
    detailed: Vec<DetailedPermission>,
    modules: Vec<Module>,
    accessible_modules: Vec<Module>,
}

impl EffectivePermissionSet {
    /// Merges role grants and user overrides into one effective set.
    ///
    /// Any active role grant with `granted = true` contributes its
    /// permission; a role row with `granted = false` contributes nothing and
    /// does not cancel another role's grant. User overrides in effect at
    /// `now` are applied last: `granted = true` adds the permission and
    /// `granted = false` removes it regardless of role grants. Inactive
    /// permissions never contribute.
    #[must_use]
    pub fn merge(
        role_grants: &[ResolvedRoleGrant],
        user_overrides: &[ResolvedUserOverride],
        now: DateTime<Utc>,
    ) -> Self {
        let mut merged: BTreeMap<PermissionId, DetailedPermission> = BTreeMap::new();

        for grant in role_grants
            .iter()
            .filter(|grant| grant.granted && grant.permission.is_active())
        {
            merged.insert(
                grant.permission.id(),
                DetailedPermission {
                    permission: grant.permission.clone(),
                    module: grant.module.clone(),
                },
            );
        }

        for user_override in user_overrides
            .iter()
            .filter(|user_override| user_override.is_in_effect(now))
        {
            if !user_override.granted {
                merged.remove(&user_override.permission.id());
                continue;
            }

            if user_override.permission.is_active() {
                merged.insert(
                    user_override.permission.id(),
                    DetailedPermission {
                        permission: user_override.permission.clone(),
                        module: user_override.module.clone(),
                    },
                );
            }
        }

        Self::from_detailed(merged.into_values().collect())
    }

    /// Derives names and module lists from granted permissions.
    #[must_use]
    pub fn from_detailed(mut detailed: Vec<DetailedPermission>) -> Self {
        detailed.sort_by(|left, right| left.permission.name().cmp(right.permission.name()));

        let permission_names = detailed
            .iter()
            .map(|entry| entry.permission.name().to_owned())
            .collect();

        let modules = distinct_modules(detailed.iter());
        let accessible_modules = distinct_modules(
            detailed
                .iter()
                .filter(|entry| entry.permission.action() == PermissionAction::Read),
        );

        Self {
            permission_names,
            detailed,
            modules,
            accessible_modules,
        }
    }

    /// Returns granted permission names.
    #[must_use]
    pub fn permission_names(&self) -> &BTreeSet<String> {
        &self.permission_names
    }

    /// Returns granted permissions with their modules.
    #[must_use]
    pub fn detailed(&self) -> &[DetailedPermission] {
        &self.detailed
    }

    /// Returns active modules referenced by any granted permission.
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Returns active modules readable by the user, in sort order.
    #[must_use]
    pub fn accessible_modules(&self) -> &[Module] {
        &self.accessible_modules
    }

    /// Returns whether the named permission is granted.
    #[must_use]
    pub fn has_permission(&self, name: &str) -> bool {
        self.permission_names.contains(name)
    }

    /// Returns whether at least one of the names is granted.
    #[must_use]
    pub fn has_any_permission<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().any(|name| self.has_permission(name.as_ref()))
    }

    /// Returns whether every name is granted.
    #[must_use]
    pub fn has_all_permissions<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|name| self.has_permission(name.as_ref()))
    }

    /// Returns whether an accessible module has the navigation path.
    #[must_use]
    pub fn has_module_access(&self, path: &str) -> bool {
        self.accessible_modules
            .iter()
            .any(|module| module.path() == Some(path))
    }

    /// Returns granted permissions bound to a module.
    #[must_use]
    pub fn module_permissions(&self, module_id: ModuleId) -> Vec<Permission> {
        self.detailed
            .iter()
            .filter(|entry| entry.permission.module_id() == Some(module_id))
            .map(|entry| entry.permission.clone())
            .collect()
    }

    /// Returns whether nothing is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permission_names.is_empty()
    }
}

fn distinct_modules<'a>(entries: impl Iterator<Item = &'a DetailedPermission>) -> Vec<Module> {
    let mut seen = HashSet::new();
    let mut modules: Vec<Module> = entries
        .filter_map(|entry| entry.module.as_ref())
        .filter(|module| module.is_active() && seen.insert(module.id()))
        .cloned()
        .collect();
    modules.sort_by(Module::navigation_cmp);
    modules
}

#[cfg(test)]
mod tests;
