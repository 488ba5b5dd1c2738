use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tessera_application::{
    DEFAULT_CHECK_CACHE_TTL, DEFAULT_RESOLVE_TIMEOUT, DEFAULT_SESSION_TTL, PermissionEngineConfig,
};
use tessera_core::{AppError, AppResult};
use tessera_domain::UserId;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DataSource {
    Fixture(PathBuf),
    Database {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct InspectorConfig {
    pub(crate) source: DataSource,
    pub(crate) engine: PermissionEngineConfig,
}

impl InspectorConfig {
    pub(crate) fn load() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let session_ttl = parse_u64(
            &lookup,
            "TESSERA_SESSION_TTL_SECONDS",
            DEFAULT_SESSION_TTL.as_secs(),
        )?;
        let resolve_timeout_ms = parse_u64(
            &lookup,
            "TESSERA_RESOLVE_TIMEOUT_MS",
            u64::try_from(DEFAULT_RESOLVE_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
        )?;
        let check_cache_ttl = parse_u64(
            &lookup,
            "TESSERA_CHECK_CACHE_TTL_SECONDS",
            DEFAULT_CHECK_CACHE_TTL.as_secs(),
        )?;

        let engine = PermissionEngineConfig::new(
            Duration::from_secs(session_ttl),
            Duration::from_millis(resolve_timeout_ms),
            Duration::from_secs(check_cache_ttl),
        )?;

        let fixture_path = non_blank(&lookup, "TESSERA_FIXTURE_PATH");
        let database_url = non_blank(&lookup, "DATABASE_URL");
        let source = match (fixture_path, database_url) {
            (Some(path), _) => DataSource::Fixture(PathBuf::from(path)),
            (None, Some(database_url)) => {
                let max_connections = parse_u32(
                    &lookup,
                    "TESSERA_DB_MAX_CONNECTIONS",
                    DEFAULT_DB_MAX_CONNECTIONS,
                )?;
                if max_connections == 0 {
                    return Err(AppError::Validation(
                        "TESSERA_DB_MAX_CONNECTIONS must be greater than zero".to_owned(),
                    ));
                }

                DataSource::Database {
                    database_url,
                    max_connections,
                }
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "TESSERA_FIXTURE_PATH or DATABASE_URL is required".to_owned(),
                ));
            }
        };

        Ok(Self { source, engine })
    }
}

/// Resolve one user's effective permissions and print them as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "tessera-inspector", version)]
pub(crate) struct InspectorArgs {
    /// User whose permissions are resolved.
    #[arg(value_name = "USER_ID", value_parser = parse_user_id)]
    pub(crate) user_id: UserId,

    /// Also print the full module hierarchy.
    #[arg(long = "tree")]
    pub(crate) print_hierarchy: bool,
}

fn parse_user_id(value: &str) -> Result<UserId, String> {
    UserId::new(value).map_err(|error| error.to_string())
}

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> AppResult<u64> {
    match lookup(name) {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u32) -> AppResult<u32> {
    match lookup(name) {
        Some(value) => value.trim().parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use clap::Parser;
    use clap::error::ErrorKind;
    use tessera_core::AppError;

    use super::{DataSource, InspectorArgs, InspectorConfig};

    fn config_from(pairs: &[(&str, &str)]) -> Result<InspectorConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        InspectorConfig::from_lookup(|name| values.get(name).cloned())
    }

    fn args(values: &[&str]) -> Result<InspectorArgs, clap::Error> {
        let argv = std::iter::once("tessera-inspector").chain(values.iter().copied());
        InspectorArgs::try_parse_from(argv)
    }

    #[test]
    fn defaults_apply_when_only_a_source_is_set() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/tessera")]);
        assert!(config.is_ok());

        let config = config.unwrap_or_else(|_| unreachable!());
        assert_eq!(config.engine.session_ttl, Duration::from_secs(30 * 60));
        assert_eq!(config.engine.resolve_timeout, Duration::from_secs(10));
        assert_eq!(config.engine.check_cache_ttl, Duration::from_secs(5 * 60));
        assert_eq!(
            config.source,
            DataSource::Database {
                database_url: "postgres://localhost/tessera".to_owned(),
                max_connections: 5,
            }
        );
    }

    #[test]
    fn fixture_path_takes_precedence_over_database() {
        let config = config_from(&[
            ("TESSERA_FIXTURE_PATH", "fixtures/permissions.json"),
            ("DATABASE_URL", "postgres://localhost/tessera"),
            ("TESSERA_RESOLVE_TIMEOUT_MS", "250"),
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(
            config.source,
            DataSource::Fixture(PathBuf::from("fixtures/permissions.json"))
        );
        assert_eq!(config.engine.resolve_timeout, Duration::from_millis(250));
    }

    #[test]
    fn missing_source_and_bad_values_are_rejected() {
        assert!(matches!(config_from(&[]), Err(AppError::Validation(_))));
        assert!(matches!(
            config_from(&[
                ("DATABASE_URL", "postgres://localhost/tessera"),
                ("TESSERA_SESSION_TTL_SECONDS", "soon"),
            ]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            config_from(&[
                ("DATABASE_URL", "postgres://localhost/tessera"),
                ("TESSERA_RESOLVE_TIMEOUT_MS", "0"),
            ]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            config_from(&[
                ("DATABASE_URL", "postgres://localhost/tessera"),
                ("TESSERA_DB_MAX_CONNECTIONS", "0"),
            ]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn args_take_a_user_and_optional_tree_flag() {
        let parsed = args(&["--tree", " u1 "]).unwrap_or_else(|_| unreachable!());
        assert_eq!(parsed.user_id.as_str(), "u1");
        assert!(parsed.print_hierarchy);

        let plain = args(&["u1"]).unwrap_or_else(|_| unreachable!());
        assert!(!plain.print_hierarchy);

        let separated = args(&["--", "--tree"]).unwrap_or_else(|_| unreachable!());
        assert_eq!(separated.user_id.as_str(), "--tree");
        assert!(!separated.print_hierarchy);

        let kind = |values: &[&str]| args(values).err().map(|error| error.kind());
        assert_eq!(kind(&[]), Some(ErrorKind::MissingRequiredArgument));
        assert_eq!(kind(&["u1", "u2"]), Some(ErrorKind::UnknownArgument));
        assert_eq!(kind(&["u1", "--verbose"]), Some(ErrorKind::UnknownArgument));
        assert_eq!(kind(&["   "]), Some(ErrorKind::ValueValidation));
        assert_eq!(kind(&["--help"]), Some(ErrorKind::DisplayHelp));
    }
}
