use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tessera_core::{AppError, AppResult};
use tessera_domain::{
    Module, ModuleId, Permission, PermissionAction, PermissionId, ResolvedRoleGrant,
    ResolvedUserOverride, Role, RoleId, UserId,
};
use tokio::sync::{Mutex, watch};

use crate::{
    PermissionDataStore, PermissionEngineConfig, PermissionResolver, PermissionSession,
    RoleGrantFilter, TtlCache, UserOverrideFilter,
};

pub(crate) const ROLES: &str = "roles";
pub(crate) const ROLE_GRANTS: &str = "role_grants";
pub(crate) const USER_OVERRIDES: &str = "user_overrides";
pub(crate) const MODULES: &str = "modules";

pub(crate) struct FakePermissionDataStore {
    pub(crate) roles: Mutex<HashMap<UserId, Vec<Role>>>,
    pub(crate) role_grants: Mutex<Vec<ResolvedRoleGrant>>,
    pub(crate) user_overrides: Mutex<HashMap<UserId, Vec<ResolvedUserOverride>>>,
    pub(crate) modules: Mutex<Vec<Module>>,
    pub(crate) failures: Mutex<HashMap<&'static str, AppError>>,
    pub(crate) role_grant_filters: Mutex<Vec<RoleGrantFilter>>,
    pub(crate) role_calls: AtomicUsize,
    pub(crate) module_calls: AtomicUsize,
    hang: AtomicBool,
    gate: watch::Sender<bool>,
}

impl FakePermissionDataStore {
    pub(crate) fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            roles: Mutex::new(HashMap::new()),
            role_grants: Mutex::new(Vec::new()),
            user_overrides: Mutex::new(HashMap::new()),
            modules: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            role_grant_filters: Mutex::new(Vec::new()),
            role_calls: AtomicUsize::new(0),
            module_calls: AtomicUsize::new(0),
            hang: AtomicBool::new(false),
            gate,
        }
    }

    pub(crate) fn role_calls(&self) -> usize {
        self.role_calls.load(Ordering::SeqCst)
    }

    /// Holds every resolution at its first query until `open_gate`.
    pub(crate) fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub(crate) fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub(crate) fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub(crate) async fn fail(&self, source: &'static str, error: AppError) {
        self.failures.lock().await.insert(source, error);
    }

    pub(crate) async fn recover(&self, source: &'static str) {
        self.failures.lock().await.remove(source);
    }

    async fn failure(&self, source: &'static str) -> AppResult<()> {
        match self.failures.lock().await.get(source) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PermissionDataStore for FakePermissionDataStore {
    async fn fetch_active_roles_for_user(&self, user_id: &UserId) -> AppResult<Vec<Role>> {
        self.role_calls.fetch_add(1, Ordering::SeqCst);

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(AppError::Internal("gate dropped".to_owned()));
        }

        self.failure(ROLES).await?;
        Ok(self
            .roles
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_role_grants(
        &self,
        filter: &RoleGrantFilter,
    ) -> AppResult<Vec<ResolvedRoleGrant>> {
        self.role_grant_filters.lock().await.push(filter.clone());
        self.failure(ROLE_GRANTS).await?;
        Ok(self.role_grants.lock().await.clone())
    }

    async fn fetch_user_overrides(
        &self,
        filter: &UserOverrideFilter,
    ) -> AppResult<Vec<ResolvedUserOverride>> {
        self.failure(USER_OVERRIDES).await?;
        Ok(self
            .user_overrides
            .lock()
            .await
            .get(filter.user_id())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_all_modules(&self) -> AppResult<Vec<Module>> {
        self.module_calls.fetch_add(1, Ordering::SeqCst);
        self.failure(MODULES).await?;
        Ok(self.modules.lock().await.clone())
    }
}

pub(crate) fn user(value: &str) -> UserId {
    UserId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn module(name: &str, path: &str, sort_order: i32) -> Module {
    Module::new(ModuleId::new(), name)
        .unwrap_or_else(|_| unreachable!())
        .with_path(path)
        .with_sort_order(sort_order)
}

pub(crate) fn permission(name: &str, action: PermissionAction, module: &Module) -> Permission {
    Permission::new(PermissionId::new(), name, action)
        .unwrap_or_else(|_| unreachable!())
        .with_module(Some(module.id()))
}

pub(crate) fn role(name: &str) -> Role {
    Role::new(RoleId::new(), name).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn grant(role: &Role, permission: &Permission, module: &Module) -> ResolvedRoleGrant {
    ResolvedRoleGrant {
        role_id: role.id(),
        permission: permission.clone(),
        module: Some(module.clone()),
        granted: true,
    }
}

pub(crate) fn user_override(
    permission: &Permission,
    module: &Module,
    granted: bool,
) -> ResolvedUserOverride {
    ResolvedUserOverride {
        permission: permission.clone(),
        module: Some(module.clone()),
        granted,
        expires_at: None,
    }
}

/// User `u1` with role `editor` granting `docs_read` and `docs_update`,
/// a user revocation of `docs_update` and a user grant of `reports_read`.
pub(crate) struct EditorScenario {
    pub(crate) store: Arc<FakePermissionDataStore>,
    pub(crate) user_id: UserId,
    pub(crate) editor: Role,
    pub(crate) docs: Module,
    pub(crate) reports: Module,
}

pub(crate) async fn editor_scenario() -> EditorScenario {
    let store = Arc::new(FakePermissionDataStore::new());
    let user_id = user("u1");
    let editor = role("editor");
    let docs = module("Docs", "/docs", 2);
    let reports = module("Reports", "/reports", 1);

    let docs_read = permission("docs_read", PermissionAction::Read, &docs);
    let docs_update = permission("docs_update", PermissionAction::Update, &docs);
    let reports_read = permission("reports_read", PermissionAction::Read, &reports);

    store
        .roles
        .lock()
        .await
        .insert(user_id.clone(), vec![editor.clone()]);
    store.role_grants.lock().await.extend([
        grant(&editor, &docs_read, &docs),
        grant(&editor, &docs_update, &docs),
    ]);
    store.user_overrides.lock().await.insert(
        user_id.clone(),
        vec![
            user_override(&docs_update, &docs, false),
            user_override(&reports_read, &reports, true),
        ],
    );
    store
        .modules
        .lock()
        .await
        .extend([docs.clone(), reports.clone()]);

    EditorScenario {
        store,
        user_id,
        editor,
        docs,
        reports,
    }
}

pub(crate) fn fast_config() -> PermissionEngineConfig {
    PermissionEngineConfig {
        session_ttl: Duration::from_secs(60),
        resolve_timeout: Duration::from_secs(5),
        check_cache_ttl: Duration::from_secs(60),
    }
}

pub(crate) fn resolver_for(
    store: Arc<FakePermissionDataStore>,
    config: &PermissionEngineConfig,
) -> PermissionResolver {
    PermissionResolver::new(store, Arc::new(TtlCache::new()), config)
}

pub(crate) fn session_for(
    store: Arc<FakePermissionDataStore>,
    config: &PermissionEngineConfig,
) -> PermissionSession {
    PermissionSession::new(resolver_for(store, config), config)
}
