//! Synchronous access decisions over the served snapshot.
//!
//! Decisions never trigger a load. Without a snapshot every check answers
//! `false` (or empty), so an unloaded or failed session denies access.

use tessera_domain::{Module, ModuleId, ModuleNode, Permission, PermissionAction, Role};

use crate::build_module_tree;

use super::*;

impl PermissionSession {
    /// Returns whether the named permission is granted.
    #[must_use]
    pub fn has_permission(&self, name: &str) -> bool {
        self.decide(|snapshot| snapshot.effective().has_permission(name))
    }

    /// Returns whether at least one of the names is granted.
    #[must_use]
    pub fn has_any_permission<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.decide(|snapshot| snapshot.effective().has_any_permission(names))
    }

    /// Returns whether every name is granted.
    #[must_use]
    pub fn has_all_permissions<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.decide(|snapshot| snapshot.effective().has_all_permissions(names))
    }

    /// Returns whether an accessible module has the navigation path.
    #[must_use]
    pub fn has_module_access(&self, path: &str) -> bool {
        self.decide(|snapshot| snapshot.effective().has_module_access(path))
    }

    /// Returns whether the user holds the role.
    #[must_use]
    pub fn has_role(&self, name: &str) -> bool {
        self.decide(|snapshot| snapshot.has_role(name))
    }

    /// Returns whether `{module_key}_{action}` is granted.
    #[must_use]
    pub fn can(&self, action: PermissionAction, module_key: &str) -> bool {
        self.has_permission(action.permission_name(module_key).as_str())
    }

    /// Returns whether `{module_key}_create` is granted.
    #[must_use]
    pub fn can_create(&self, module_key: &str) -> bool {
        self.can(PermissionAction::Create, module_key)
    }

    /// Returns whether `{module_key}_read` is granted.
    #[must_use]
    pub fn can_read(&self, module_key: &str) -> bool {
        self.can(PermissionAction::Read, module_key)
    }

    /// Returns whether `{module_key}_update` is granted.
    #[must_use]
    pub fn can_update(&self, module_key: &str) -> bool {
        self.can(PermissionAction::Update, module_key)
    }

    /// Returns whether `{module_key}_delete` is granted.
    #[must_use]
    pub fn can_delete(&self, module_key: &str) -> bool {
        self.can(PermissionAction::Delete, module_key)
    }

    /// Returns whether `{module_key}_execute` is granted.
    #[must_use]
    pub fn can_execute(&self, module_key: &str) -> bool {
        self.can(PermissionAction::Execute, module_key)
    }

    /// Returns granted permissions bound to the module.
    #[must_use]
    pub fn module_permissions(&self, module_id: ModuleId) -> Vec<Permission> {
        self.snapshot()
            .map(|snapshot| snapshot.effective().module_permissions(module_id))
            .unwrap_or_default()
    }

    /// Returns granted permission names.
    #[must_use]
    pub fn permission_names(&self) -> Vec<String> {
        self.snapshot()
            .map(|snapshot| {
                snapshot
                    .effective()
                    .permission_names()
                    .iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the active roles of the user.
    #[must_use]
    pub fn roles(&self) -> Vec<Role> {
        self.snapshot()
            .map(|snapshot| snapshot.roles().to_vec())
            .unwrap_or_default()
    }

    /// Returns modules readable by the user, in sort order.
    #[must_use]
    pub fn accessible_modules(&self) -> Vec<Module> {
        self.snapshot()
            .map(|snapshot| snapshot.accessible_modules().to_vec())
            .unwrap_or_default()
    }

    /// Returns the navigation tree of readable modules.
    #[must_use]
    pub fn accessible_module_tree(&self) -> Vec<ModuleNode> {
        build_module_tree(self.accessible_modules())
    }

    fn decide(&self, decision: impl FnOnce(&PermissionSnapshot) -> bool) -> bool {
        self.inner
            .published
            .borrow()
            .as_deref()
            .is_some_and(decision)
    }
}
