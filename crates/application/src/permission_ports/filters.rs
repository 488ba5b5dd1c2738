use chrono::{DateTime, Utc};
use tessera_core::{AppError, AppResult};
use tessera_domain::{RoleId, UserId};

/// Validated filter for role grant queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrantFilter {
    role_ids: Vec<RoleId>,
    include_revoked: bool,
}

impl RoleGrantFilter {
    /// Creates a filter for grants with `granted = true` on the roles.
    ///
    /// Duplicate ids are removed; an empty role list is rejected.
    pub fn for_roles(role_ids: impl IntoIterator<Item = RoleId>) -> AppResult<Self> {
        let mut role_ids: Vec<RoleId> = role_ids.into_iter().collect();
        role_ids.sort();
        role_ids.dedup();

        if role_ids.is_empty() {
            return Err(AppError::Validation(
                "role grant filter requires at least one role id".to_owned(),
            ));
        }

        Ok(Self {
            role_ids,
            include_revoked: false,
        })
    }

    /// Also returns rows with `granted = false`.
    #[must_use]
    pub fn including_revoked(mut self) -> Self {
        self.include_revoked = true;
        self
    }

    /// Returns the distinct role ids, sorted.
    #[must_use]
    pub fn role_ids(&self) -> &[RoleId] {
        &self.role_ids
    }

    /// Returns whether revoked rows are requested.
    #[must_use]
    pub fn include_revoked(&self) -> bool {
        self.include_revoked
    }

    /// Returns whether a row passes this filter.
    #[must_use]
    pub fn matches(&self, role_id: RoleId, granted: bool) -> bool {
        (granted || self.include_revoked) && self.role_ids.binary_search(&role_id).is_ok()
    }
}

/// Validated filter for user override queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOverrideFilter {
    user_id: UserId,
    as_of: DateTime<Utc>,
    include_expired: bool,
}

impl UserOverrideFilter {
    /// Creates a filter for overrides of the user still in effect at `as_of`.
    #[must_use]
    pub fn in_effect_for(user_id: UserId, as_of: DateTime<Utc>) -> Self {
        Self {
            user_id,
            as_of,
            include_expired: false,
        }
    }

    /// Also returns expired overrides.
    #[must_use]
    pub fn including_expired(mut self) -> Self {
        self.include_expired = true;
        self
    }

    /// Returns the user the overrides belong to.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the reference time used for expiry.
    #[must_use]
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    /// Returns whether expired rows are requested.
    #[must_use]
    pub fn include_expired(&self) -> bool {
        self.include_expired
    }

    /// Returns whether an override with the expiry passes this filter.
    #[must_use]
    pub fn matches(&self, expires_at: Option<DateTime<Utc>>) -> bool {
        self.include_expired || expires_at.is_none_or(|expires_at| expires_at > self.as_of)
    }
}
