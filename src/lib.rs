//! BookStore application: the books module and the bootstrap that wires the
//! gateway, service, modules and HTTP server together.

pub mod modules;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;

use bookstore_authz::{AuthModule, RoleGuard, TokenVerifier, ADMIN_ROLE};
use bookstore_db::{Database, DatabaseModule};
use bookstore_http::error::expose_internal_details;
use bookstore_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use modules::books::{
    repository::{BookRepository, InMemoryBookRepository, SqliteBookRepository},
    service::BookService,
};

pub use modules::*;

/// Assemble the module registry. The database core module is only registered
/// when a database backs the repository.
pub fn build_registry(
    settings: &Settings,
    database: Option<Database>,
    repo: Arc<dyn BookRepository>,
) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();

    if let Some(database) = database {
        registry.register_core(Arc::new(DatabaseModule::new(database)))?;
    }
    registry.register_core(Arc::new(AuthModule::from_settings(&settings.auth)))?;

    let guard = RoleGuard::new(TokenVerifier::from_settings(&settings.auth), ADMIN_ROLE);
    modules::register_all(&mut registry, BookService::new(repo), guard)?;

    tracing::debug!(
        core = registry.core_module_count(),
        custom = registry.custom_module_count(),
        "module registry assembled"
    );
    Ok(registry)
}

/// The fully layered HTTP application over `repo`, without a database module.
pub fn router(settings: &Settings, repo: Arc<dyn BookRepository>) -> anyhow::Result<Router> {
    expose_internal_details(settings.exposes_internal_errors());
    let registry = build_registry(settings, None, repo)?;
    Ok(bookstore_http::build_router(&registry, settings))
}

/// Apply pending migrations to the configured database and return how many ran.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let database = Database::connect(&settings.database).await?;
    let repo = Arc::new(SqliteBookRepository::new(database.pool().clone()));
    let registry = build_registry(settings, Some(database.clone()), repo)?;

    let applied = database
        .migrate(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    database.close().await;

    tracing::info!(applied, "migrations complete");
    Ok(applied)
}

/// Run the server until Ctrl-C, then stop every module.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookstore bootstrap starting"
    );
    expose_internal_details(settings.exposes_internal_errors());

    let database = Database::connect(&settings.database).await?;
    let repo = Arc::new(SqliteBookRepository::new(database.pool().clone()));
    let registry = build_registry(&settings, Some(database.clone()), repo)?;

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_all(&ctx).await?;
    let applied = database
        .migrate(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations complete");
    registry.start_all(&ctx).await?;

    let served = bookstore_http::start_server(&registry, &settings, shutdown_signal()).await;

    registry.stop_all().await?;
    served
}

/// Merged OpenAPI document. Uses an in-memory repository, so no database is
/// touched.
pub fn openapi(settings: &Settings) -> anyhow::Result<serde_json::Value> {
    let registry = build_registry(settings, None, Arc::new(InMemoryBookRepository::new()))?;
    Ok(bookstore_http::router::merged_openapi(&registry))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
