use std::collections::{BTreeSet, HashMap};

use tessera_domain::Module;
use tokio::sync::watch;

use crate::ttl_cache::{
    module_access_key, permission_check_key, user_modules_key, user_permissions_key,
};

use super::*;

type MemoOutcome = AppResult<MemoizedAccess>;

#[derive(Clone)]
struct MemoizedAccess {
    names: Arc<BTreeSet<String>>,
    modules: Arc<Vec<Module>>,
}

impl MemoizedAccess {
    fn from_snapshot(snapshot: &PermissionSnapshot) -> Self {
        Self {
            names: Arc::new(snapshot.effective().permission_names().clone()),
            modules: Arc::new(snapshot.accessible_modules().to_vec()),
        }
    }
}

/// Resolutions started by memo misses, one per user.
///
/// `generation` moves on every invalidation; results resolved under an older
/// generation are handed to their waiters but never written to the cache.
#[derive(Default)]
pub(super) struct MemoFlights {
    generation: u64,
    next_id: u64,
    loads: HashMap<UserId, MemoFlight>,
}

struct MemoFlight {
    id: u64,
    outcome: watch::Receiver<Option<MemoOutcome>>,
}

impl PermissionResolver {
    /// Returns the user's permission names, memoized in the check cache.
    pub async fn user_permission_names(
        &self,
        user_id: &UserId,
    ) -> AppResult<Arc<BTreeSet<String>>> {
        let key = user_permissions_key(user_id);
        if let Some(names) = self.check_cache.get::<Arc<BTreeSet<String>>>(&key) {
            return Ok(names);
        }

        Ok(self.memoized_access(user_id).await?.names)
    }

    /// Returns the user's readable modules, memoized in the check cache.
    pub async fn user_accessible_modules(
        &self,
        user_id: &UserId,
    ) -> AppResult<Arc<Vec<Module>>> {
        let key = user_modules_key(user_id);
        if let Some(modules) = self.check_cache.get::<Arc<Vec<Module>>>(&key) {
            return Ok(modules);
        }

        Ok(self.memoized_access(user_id).await?.modules)
    }

    /// Returns whether the user holds a permission, memoizing the answer.
    pub async fn check_permission(
        &self,
        user_id: &UserId,
        permission_name: &str,
    ) -> AppResult<bool> {
        let key = permission_check_key(user_id, permission_name);
        if let Some(granted) = self.check_cache.get::<bool>(&key) {
            return Ok(granted);
        }

        let generation = self.memo_flights.lock().generation;
        let granted = self
            .user_permission_names(user_id)
            .await?
            .contains(permission_name);
        self.remember(generation, key, granted);
        Ok(granted)
    }

    /// Returns whether the user may open the module path, memoizing the answer.
    pub async fn check_module_access(&self, user_id: &UserId, path: &str) -> AppResult<bool> {
        let key = module_access_key(user_id, path);
        if let Some(granted) = self.check_cache.get::<bool>(&key) {
            return Ok(granted);
        }

        let generation = self.memo_flights.lock().generation;
        let granted = self
            .user_accessible_modules(user_id)
            .await?
            .iter()
            .any(|module| module.path() == Some(path));
        self.remember(generation, key, granted);
        Ok(granted)
    }

    /// Drops every memoized entry for the user.
    ///
    /// Call after any role or permission mutation affecting the user. A
    /// resolution still running for the user is detached: its waiters get
    /// the result, the cache does not.
    pub fn invalidate_user(&self, user_id: &UserId) -> AppResult<usize> {
        let mut flights = self.memo_flights.lock();
        flights.generation = flights.generation.wrapping_add(1);
        if flights.loads.remove(user_id).is_some() {
            debug!(user_id = %user_id, "detached in-flight permission resolution");
        }

        self.check_cache.invalidate_user_cache(user_id)
    }

    async fn memoized_access(&self, user_id: &UserId) -> MemoOutcome {
        let mut outcome = {
            let mut flights = self.memo_flights.lock();
            match flights.loads.get(user_id) {
                Some(flight) => {
                    debug!(user_id = %user_id, "joining in-flight permission resolution");
                    flight.outcome.clone()
                }
                None => self.start_memo_flight(&mut flights, user_id.clone()),
            }
        };

        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .map(|value| (*value).clone());

        match finished {
            Ok(Some(result)) => result,
            _ => Err(AppError::Internal(
                "permission resolution ended without producing an outcome".to_owned(),
            )),
        }
    }

    fn start_memo_flight(
        &self,
        flights: &mut MemoFlights,
        user_id: UserId,
    ) -> watch::Receiver<Option<MemoOutcome>> {
        let id = flights.next_id;
        flights.next_id = flights.next_id.wrapping_add(1);
        let generation = flights.generation;

        let (sender, receiver) = watch::channel(None);
        flights.loads.insert(
            user_id.clone(),
            MemoFlight {
                id,
                outcome: receiver.clone(),
            },
        );

        let resolver = self.clone();
        tokio::spawn(async move {
            let outcome = resolver
                .resolve_with_timeout(&user_id)
                .await
                .map(|snapshot| MemoizedAccess::from_snapshot(&snapshot));
            resolver.finish_memo_flight(id, generation, &user_id, &outcome);
            sender.send_replace(Some(outcome));
        });

        receiver
    }

    fn finish_memo_flight(
        &self,
        id: u64,
        generation: u64,
        user_id: &UserId,
        outcome: &MemoOutcome,
    ) {
        let mut flights = self.memo_flights.lock();
        if flights.loads.get(user_id).is_some_and(|flight| flight.id == id) {
            flights.loads.remove(user_id);
        }

        if flights.generation != generation {
            debug!(user_id = %user_id, "not memoizing permissions resolved before invalidation");
            return;
        }

        if let Ok(access) = outcome {
            self.check_cache.set(
                user_permissions_key(user_id),
                Arc::clone(&access.names),
                self.check_cache_ttl,
            );
            self.check_cache.set(
                user_modules_key(user_id),
                Arc::clone(&access.modules),
                self.check_cache_ttl,
            );
        }
    }

    fn remember(&self, generation: u64, key: String, granted: bool) {
        let flights = self.memo_flights.lock();
        if flights.generation == generation {
            self.check_cache.set(key, granted, self.check_cache_ttl);
        }
    }
}
