//! Tessera permission inspector.
//!
//! Resolves one user's effective permissions against a fixture file or a
//! PostgreSQL database and prints the snapshot as JSON.

#![forbid(unsafe_code)]

mod config;

use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tessera_application::{
    PermissionDataStore, PermissionResolver, PermissionSession, PermissionSnapshot, TtlCache,
};
use tessera_core::{AppError, AppResult};
use tessera_domain::ModuleNode;
use tessera_infrastructure::{
    InMemoryPermissionDataStore, PermissionFixture, PostgresPermissionDataStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{DataSource, InspectorArgs, InspectorConfig};

#[derive(Debug, Serialize)]
struct InspectionReport<'a> {
    snapshot: &'a PermissionSnapshot,
    navigation: Vec<ModuleNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hierarchy: Option<Vec<ModuleNode>>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = InspectorArgs::parse();
    let config = InspectorConfig::load()?;
    let data_store = build_data_store(&config.source).await?;

    let resolver = PermissionResolver::new(data_store, Arc::new(TtlCache::new()), &config.engine);
    let session = PermissionSession::new(resolver.clone(), &config.engine);

    let snapshot = session
        .load_user_permissions(&args.user_id, false)
        .await?;
    let hierarchy = if args.print_hierarchy {
        Some(resolver.module_hierarchy().await?)
    } else {
        None
    };

    let report = InspectionReport {
        snapshot: snapshot.as_ref(),
        navigation: session.accessible_module_tree(),
        hierarchy,
    };
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|error| AppError::Internal(format!("failed to render report: {error}")))?;
    println!("{rendered}");

    Ok(())
}

async fn build_data_store(source: &DataSource) -> AppResult<Arc<dyn PermissionDataStore>> {
    match source {
        DataSource::Fixture(path) => {
            let document = std::fs::read_to_string(path).map_err(|error| {
                AppError::Validation(format!(
                    "failed to read fixture '{}': {error}",
                    path.display()
                ))
            })?;
            let fixture = PermissionFixture::from_json(document.as_str())?;
            info!(
                fixture = %path.display(),
                roles = fixture.roles.len(),
                modules = fixture.modules.len(),
                permissions = fixture.permissions.len(),
                "loaded permission fixture"
            );

            Ok(Arc::new(InMemoryPermissionDataStore::from_fixture(fixture)))
        }
        DataSource::Database {
            database_url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(database_url.as_str())
                .await
                .map_err(|error| {
                    AppError::DataSource(format!("failed to connect to database: {error}"))
                })?;
            info!(max_connections, "connected to permission database");

            Ok(Arc::new(PostgresPermissionDataStore::new(pool)))
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
