//! Session-scoped cache of one user's resolved permissions.
//!
//! One session belongs to one authenticated principal. Loads go through a
//! single-flight slot: while a resolution is outstanding every caller joins
//! it instead of starting another. Completed snapshots are published whole
//! through a watch channel, so readers observe either the previous snapshot
//! or the new one. Clearing the session invalidates any outstanding load;
//! its result is then discarded. Clearing, and every successful load, also
//! drops the user's memoized checks from the resolver's cache.

mod access;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tessera_core::{AppError, AppResult};
use tessera_domain::UserId;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{PermissionEngineConfig, PermissionResolver, PermissionSnapshot};

type LoadOutcome = Result<Arc<PermissionSnapshot>, AppError>;

/// Observable lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing loaded, or cleared.
    Unloaded,
    /// A resolution is outstanding.
    Loading,
    /// A snapshot is being served.
    Loaded {
        /// Snapshot is older than the session ttl.
        stale: bool,
    },
}

/// Per-principal permission cache with single-flight loading.
#[derive(Clone)]
pub struct PermissionSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    resolver: PermissionResolver,
    session_ttl: Duration,
    state: Mutex<SessionState>,
    published: watch::Sender<Option<Arc<PermissionSnapshot>>>,
}

#[derive(Default)]
struct SessionState {
    user_id: Option<UserId>,
    loaded_at: Option<Instant>,
    in_flight: Option<InFlightLoad>,
    next_flight_id: u64,
    last_error: Option<AppError>,
}

struct InFlightLoad {
    id: u64,
    outcome: watch::Receiver<Option<LoadOutcome>>,
}

impl PermissionSession {
    /// Creates an unloaded session.
    #[must_use]
    pub fn new(resolver: PermissionResolver, config: &PermissionEngineConfig) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                resolver,
                session_ttl: config.session_ttl,
                state: Mutex::new(SessionState::default()),
                published,
            }),
        }
    }

    /// Loads permissions for the user.
    ///
    /// Returns the current snapshot without I/O when it is fresh and
    /// `force_reload` is false. Joins an outstanding load instead of starting
    /// a second one. Loading a different user than the one held resets the
    /// session first. On failure the previous snapshot, if any, keeps being
    /// served and the error is recorded.
    pub async fn load_user_permissions(
        &self,
        user_id: &UserId,
        force_reload: bool,
    ) -> AppResult<Arc<PermissionSnapshot>> {
        let (flight_id, outcome) = {
            let mut state = self.inner.state.lock();

            if state
                .user_id
                .as_ref()
                .is_some_and(|current| current != user_id)
            {
                debug!(user_id = %user_id, "switching permission session principal");
                self.inner.reset(&mut state);
            }

            if !force_reload && let Some(snapshot) = self.inner.fresh_snapshot(&state, user_id) {
                return Ok(snapshot);
            }

            match &state.in_flight {
                Some(in_flight) => {
                    debug!(user_id = %user_id, "joining in-flight permission load");
                    (in_flight.id, in_flight.outcome.clone())
                }
                None => self.inner.start_load(&mut state, user_id.clone()),
            }
        };

        self.inner.await_outcome(flight_id, outcome).await
    }

    /// Reloads when nothing is loaded for the user or the snapshot is stale.
    pub async fn refresh_if_needed(
        &self,
        user_id: &UserId,
    ) -> AppResult<Arc<PermissionSnapshot>> {
        let fresh = {
            let state = self.inner.state.lock();
            self.inner.fresh_snapshot(&state, user_id)
        };

        match fresh {
            Some(snapshot) => Ok(snapshot),
            None => self.load_user_permissions(user_id, true).await,
        }
    }

    /// Drops all loaded data and invalidates any outstanding load.
    pub fn clear_permissions(&self) {
        let mut state = self.inner.state.lock();
        self.inner.reset(&mut state);
    }

    /// Returns whether no snapshot exists or it is older than the session ttl.
    #[must_use]
    pub fn is_permission_expired(&self) -> bool {
        let state = self.inner.state.lock();
        self.inner.is_expired(&state)
    }

    /// Returns the current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        let state = self.inner.state.lock();
        if state.in_flight.is_some() {
            return SessionPhase::Loading;
        }

        if self.inner.published.borrow().is_some() {
            SessionPhase::Loaded {
                stale: self.inner.is_expired(&state),
            }
        } else {
            SessionPhase::Unloaded
        }
    }

    /// Returns whether a load is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().in_flight.is_some()
    }

    /// Returns whether a snapshot is being served.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.published.borrow().is_some()
    }

    /// Returns the error of the latest failed load not yet followed by a success.
    #[must_use]
    pub fn last_error(&self) -> Option<AppError> {
        self.inner.state.lock().last_error.clone()
    }

    /// Returns when the served snapshot was resolved.
    #[must_use]
    pub fn last_load_time(&self) -> Option<DateTime<Utc>> {
        self.snapshot().map(|snapshot| snapshot.resolved_at())
    }

    /// Returns the snapshot currently served.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<PermissionSnapshot>> {
        self.inner.published.borrow().clone()
    }

    /// Subscribes to snapshot publications; `None` marks a cleared session.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PermissionSnapshot>>> {
        self.inner.published.subscribe()
    }
}

impl SessionInner {
    fn is_expired(&self, state: &SessionState) -> bool {
        state
            .loaded_at
            .is_none_or(|loaded_at| loaded_at.elapsed() > self.session_ttl)
    }

    fn fresh_snapshot(
        &self,
        state: &SessionState,
        user_id: &UserId,
    ) -> Option<Arc<PermissionSnapshot>> {
        if state.user_id.as_ref() != Some(user_id) || self.is_expired(state) {
            return None;
        }

        self.published.borrow().clone()
    }

    fn reset(&self, state: &mut SessionState) {
        if let Some(in_flight) = state.in_flight.take() {
            debug!(flight_id = in_flight.id, "invalidated in-flight permission load");
        }
        if let Some(user_id) = state.user_id.take() {
            self.forget_checks(&user_id);
        }
        state.loaded_at = None;
        state.last_error = None;
        self.published.send_replace(None);
    }

    fn forget_checks(&self, user_id: &UserId) {
        match self.resolver.invalidate_user(user_id) {
            Ok(removed) => debug!(user_id = %user_id, removed, "dropped memoized permission checks"),
            Err(error) => warn!(
                user_id = %user_id,
                error = %error,
                "failed to drop memoized permission checks"
            ),
        }
    }

    fn start_load(
        self: &Arc<Self>,
        state: &mut SessionState,
        user_id: UserId,
    ) -> (u64, watch::Receiver<Option<LoadOutcome>>) {
        let flight_id = state.next_flight_id;
        state.next_flight_id = state.next_flight_id.wrapping_add(1);

        let (sender, receiver) = watch::channel(None);
        state.user_id = Some(user_id.clone());
        state.in_flight = Some(InFlightLoad {
            id: flight_id,
            outcome: receiver.clone(),
        });

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = inner.resolver.resolve_with_timeout(&user_id).await;
            let outcome = inner.complete(flight_id, &user_id, outcome);
            if sender.send(Some(outcome)).is_err() {
                debug!(user_id = %user_id, "permission load finished without waiters");
            }
        });

        (flight_id, receiver)
    }

    fn complete(&self, flight_id: u64, user_id: &UserId, outcome: LoadOutcome) -> LoadOutcome {
        let mut state = self.state.lock();
        if state.in_flight.as_ref().map(|in_flight| in_flight.id) != Some(flight_id) {
            debug!(user_id = %user_id, "discarding permission load completed after invalidation");
            return Err(AppError::Conflict(format!(
                "permission load for user '{user_id}' was invalidated before it completed"
            )));
        }

        state.in_flight = None;
        match outcome {
            Ok(snapshot) => {
                self.forget_checks(user_id);
                state.loaded_at = Some(Instant::now());
                state.last_error = None;
                self.published.send_replace(Some(Arc::clone(&snapshot)));
                info!(
                    user_id = %user_id,
                    permissions = snapshot.effective().permission_names().len(),
                    accessible_modules = snapshot.accessible_modules().len(),
                    "loaded user permissions"
                );
                Ok(snapshot)
            }
            Err(error) => {
                warn!(
                    user_id = %user_id,
                    error = %error,
                    serving_stale = self.published.borrow().is_some(),
                    "failed to load user permissions"
                );
                state.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    async fn await_outcome(
        &self,
        flight_id: u64,
        mut outcome: watch::Receiver<Option<LoadOutcome>>,
    ) -> LoadOutcome {
        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .map(|value| (*value).clone());

        match finished {
            Ok(Some(result)) => result,
            _ => {
                let mut state = self.state.lock();
                if state.in_flight.as_ref().map(|in_flight| in_flight.id) == Some(flight_id) {
                    state.in_flight = None;
                }
                Err(AppError::Internal(
                    "permission load ended without producing an outcome".to_owned(),
                ))
            }
        }
    }
}
