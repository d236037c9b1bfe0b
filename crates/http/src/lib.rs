//! HTTP server facade for the BookStore API with Axum, error handling, rate
//! limiting and OpenAPI support.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{routing::get, Router};

use bookstore_kernel::{settings::Settings, ModuleRegistry};

pub mod error;
pub mod extract;
pub mod rate_limit;
pub mod router;

pub use error::AppError;
pub use extract::{ApiJson, ApiQuery, ValidatedJson};

use rate_limit::RateLimiter;
use router::RouterBuilder;

/// Start the HTTP server and serve until `shutdown` resolves
pub async fn start_server<F>(
    registry: &ModuleRegistry,
    settings: &Settings,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(registry, settings);

    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {}", address))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> Router {
    let mut router_builder = RouterBuilder::new().route("/healthz", get(health_check));

    for module in registry.modules() {
        for &version in module.api_versions() {
            tracing::info!(
                module = module.name(),
                %version,
                "mounting module routes under {}",
                version.mount_path(module.name())
            );
            router_builder =
                router_builder.mount_module(module.name(), version, module.routes(version));
        }
    }

    router_builder = router_builder.with_openapi(registry);

    if settings.rate_limit.enabled {
        router_builder =
            router_builder.with_rate_limit(RateLimiter::from_settings(&settings.rate_limit));
    }

    // Layers wrap everything added before them, so tracing ends up outermost.
    router_builder
        .with_timeout(settings.server.request_timeout_ms)
        .with_cors(&settings.server.cors_allowed_origins)
        .with_request_id()
        .with_tracing()
        .build()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
