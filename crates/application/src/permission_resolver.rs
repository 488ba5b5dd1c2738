//! Resolution of a user's effective permission set from the data store.

mod checks;
mod hierarchy;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tessera_core::{AppError, AppResult};
use tessera_domain::{
    EffectivePermissionSet, ResolvedRoleGrant, ResolvedUserOverride, Role, UserId,
};
use tracing::{debug, warn};

use crate::{
    PermissionDataStore, PermissionEngineConfig, PermissionSnapshot, RoleGrantFilter, TtlCache,
    UserOverrideFilter,
};

/// Resolves effective permissions for users.
#[derive(Clone)]
pub struct PermissionResolver {
    data_store: Arc<dyn PermissionDataStore>,
    check_cache: Arc<TtlCache>,
    check_cache_ttl: Duration,
    resolve_timeout: Duration,
    memo_flights: Arc<Mutex<checks::MemoFlights>>,
}

impl PermissionResolver {
    /// Creates a resolver over a data store and a shared check cache.
    #[must_use]
    pub fn new(
        data_store: Arc<dyn PermissionDataStore>,
        check_cache: Arc<TtlCache>,
        config: &PermissionEngineConfig,
    ) -> Self {
        Self {
            data_store,
            check_cache,
            check_cache_ttl: config.check_cache_ttl,
            resolve_timeout: config.resolve_timeout,
            memo_flights: Arc::new(Mutex::new(checks::MemoFlights::default())),
        }
    }

    /// Returns the cache used for memoized checks.
    #[must_use]
    pub fn check_cache(&self) -> &Arc<TtlCache> {
        &self.check_cache
    }

    /// Resolves roles and the effective permission set of a user.
    ///
    /// Sub-queries that fail with `DataSourceUnavailable` degrade to empty
    /// results; any other failure aborts the resolution.
    pub async fn resolve(&self, user_id: &UserId) -> AppResult<PermissionSnapshot> {
        let now = Utc::now();

        let roles = self.active_roles(user_id).await?;
        let role_grants = self.role_grants(user_id, &roles).await?;
        let user_overrides = self.user_overrides(user_id, now).await?;

        let effective = EffectivePermissionSet::merge(&role_grants, &user_overrides, now);
        debug!(
            user_id = %user_id,
            roles = roles.len(),
            role_grants = role_grants.len(),
            user_overrides = user_overrides.len(),
            permissions = effective.permission_names().len(),
            "resolved effective permissions"
        );

        Ok(PermissionSnapshot::new(user_id.clone(), roles, effective, now))
    }

    /// Resolves like [`Self::resolve`], giving up after the configured timeout.
    pub(crate) async fn resolve_with_timeout(
        &self,
        user_id: &UserId,
    ) -> AppResult<Arc<PermissionSnapshot>> {
        match tokio::time::timeout(self.resolve_timeout, self.resolve(user_id)).await {
            Ok(result) => result.map(Arc::new),
            Err(_) => {
                warn!(
                    user_id = %user_id,
                    timeout_ms = self.resolve_timeout.as_millis(),
                    "permission resolution timed out"
                );
                Err(AppError::Timeout(format!(
                    "permission resolution for user '{user_id}' exceeded {}ms",
                    self.resolve_timeout.as_millis()
                )))
            }
        }
    }

    async fn active_roles(&self, user_id: &UserId) -> AppResult<Vec<Role>> {
        let roles = degrade_unavailable(
            self.data_store.fetch_active_roles_for_user(user_id).await,
            user_id,
            "roles",
        )?;

        Ok(roles.into_iter().filter(Role::is_active).collect())
    }

    async fn role_grants(
        &self,
        user_id: &UserId,
        roles: &[Role],
    ) -> AppResult<Vec<ResolvedRoleGrant>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let filter = RoleGrantFilter::for_roles(roles.iter().map(Role::id))?;
        let grants = degrade_unavailable(
            self.data_store.fetch_role_grants(&filter).await,
            user_id,
            "role_grants",
        )?;

        Ok(grants
            .into_iter()
            .filter(|grant| filter.matches(grant.role_id, grant.granted))
            .collect())
    }

    async fn user_overrides(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ResolvedUserOverride>> {
        let filter = UserOverrideFilter::in_effect_for(user_id.clone(), now);
        let overrides = degrade_unavailable(
            self.data_store.fetch_user_overrides(&filter).await,
            user_id,
            "user_overrides",
        )?;

        Ok(overrides
            .into_iter()
            .filter(|user_override| filter.matches(user_override.expires_at))
            .collect())
    }
}

fn degrade_unavailable<T>(
    result: AppResult<Vec<T>>,
    user_id: &UserId,
    source: &'static str,
) -> AppResult<Vec<T>> {
    match result {
        Err(AppError::DataSourceUnavailable(detail)) => {
            warn!(
                user_id = %user_id,
                source,
                detail = %detail,
                "permission source unavailable, continuing without it"
            );
            Ok(Vec::new())
        }
        other => other,
    }
}
