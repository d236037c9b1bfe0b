//! Router builder for the BookStore HTTP server

use axum::{http::HeaderValue, middleware, routing::get, Router};
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use bookstore_kernel::{ApiVersion, ModuleRegistry};

use crate::rate_limit::{self, RateLimiter};

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router for `version` under `/api/{version}/{module_name}`.
    /// The default version is additionally mounted under `/api/{module_name}`.
    pub fn mount_module(
        mut self,
        module_name: &str,
        version: ApiVersion,
        module_router: Router,
    ) -> Self {
        if version == ApiVersion::DEFAULT {
            self.router = self
                .router
                .nest(&format!("/api/{}", module_name), module_router.clone());
        }
        self.router = self
            .router
            .nest(&version.mount_path(module_name), module_router);
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Add CORS middleware; an empty origin list allows any origin
    pub fn with_cors(mut self, allowed_origins: &[String]) -> Self {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        let allow_origin = if allowed_origins.is_empty() {
            AllowOrigin::from(Any)
        } else {
            AllowOrigin::list(origins)
        };

        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        );
        self
    }

    /// Add request ID middleware; the id is echoed back in `x-request-id`
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));
        self
    }

    /// Add timeout middleware
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Add per-client rate limiting
    pub fn with_rate_limit(mut self, limiter: RateLimiter) -> Self {
        self.router = self
            .router
            .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce));
        self
    }

    /// Add OpenAPI documentation by collecting specs from all modules
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = merged_openapi(registry);

        // Deserialize our JSON spec into a proper utoipa OpenApi object
        // so SwaggerUI can serve it.
        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_spec.clone())
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "merged OpenAPI document is invalid; serving a stub");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("BookStore API")
                            .version("2.0.0")
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        // Also serve the raw JSON spec for external consumers
        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(openapi_spec.clone()) }),
        );

        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge the OpenAPI fragments of every module and version into one document.
pub fn merged_openapi(registry: &ModuleRegistry) -> serde_json::Value {
    let mut openapi_spec = serde_json::json!({
        "openapi": "3.1.0",
        "info": {
            "title": "BookStore API",
            "version": "2.0.0",
            "description": "CRUD, search and paging over books, with JWT bearer auth"
        },
        "paths": {},
        "components": {
            "schemas": {},
            "securitySchemes": {
                "bearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT"
                }
            }
        }
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
        "type": "object",
        "properties": {
            "error": {
                "type": "object",
                "properties": {
                    "code": { "type": "string" },
                    "message": { "type": "string" },
                    "details": { "type": "array", "items": { "type": "object" } },
                    "trace_id": { "type": "string" },
                    "timestamp": { "type": "string" }
                },
                "required": ["code", "message", "trace_id", "timestamp"]
            }
        },
        "required": ["error"]
    });

    openapi_spec["paths"]["/healthz"] = serde_json::json!({
        "get": {
            "summary": "Health check",
            "responses": {
                "200": {
                    "description": "OK",
                    "content": { "text/plain": { "schema": { "type": "string" } } }
                }
            }
        }
    });

    for module in registry.modules() {
        for &version in module.api_versions() {
            let Some(module_spec) = module.openapi(version) else {
                continue;
            };

            if let Some(paths) = module_spec.get("paths").and_then(|p| p.as_object()) {
                for (path, path_item) in paths {
                    // "/" is the module root, which is mounted without a trailing slash
                    let suffix = if path == "/" { "" } else { path.as_str() };
                    let prefixed_path = format!("{}{}", version.mount_path(module.name()), suffix);
                    openapi_spec["paths"][prefixed_path] = path_item.clone();
                }
            }

            if let Some(schemas) = module_spec
                .get("components")
                .and_then(|c| c.get("schemas"))
                .and_then(|s| s.as_object())
            {
                for (schema_name, schema_def) in schemas {
                    openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
                }
            }
        }
    }

    openapi_spec
}
