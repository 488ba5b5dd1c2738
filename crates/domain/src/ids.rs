use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tessera_core::{AppError, AppResult, NonEmptyString};
use uuid::Uuid;

/// Authenticated principal identifier as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(NonEmptyString);

impl UserId {
    /// Creates a validated user identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        Ok(Self(NonEmptyString::new(value.trim())?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for UserId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0.into()
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for a role.
    RoleId
);
uuid_identifier!(
    /// Unique identifier for a navigable module.
    ModuleId
);
uuid_identifier!(
    /// Unique identifier for a permission.
    PermissionId
);

#[cfg(test)]
mod tests {
    use super::{ModuleId, UserId};

    #[test]
    fn user_id_is_trimmed() {
        let user_id = UserId::new("  u1 ");
        assert!(user_id.is_ok());
        assert_eq!(user_id.unwrap_or_else(|_| unreachable!()).as_str(), "u1");
    }

    #[test]
    fn user_id_rejects_blank_value() {
        assert!(UserId::new(" ").is_err());
    }

    #[test]
    fn deserialized_user_id_matches_constructed_one() {
        let parsed: Result<UserId, _> = serde_json::from_str(r#"" u1 ""#);
        assert!(parsed.is_ok());
        assert_eq!(parsed.ok(), UserId::new("u1").ok());

        let blank: Result<UserId, _> = serde_json::from_str(r#""   ""#);
        assert!(blank.is_err());

        let rendered = serde_json::to_string(&UserId::new("u1").unwrap_or_else(|_| unreachable!()));
        assert_eq!(rendered.ok().as_deref(), Some(r#""u1""#));
    }

    #[test]
    fn uuid_identifiers_format_as_uuid() {
        assert_eq!(ModuleId::new().to_string().len(), 36);
    }
}
