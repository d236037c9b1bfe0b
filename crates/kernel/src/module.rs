use std::fmt;

use async_trait::async_trait;
use axum::Router;

/// Context provided to modules during initialization
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// Migration definition for modules
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Route-level API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    /// Version served when a request path carries no version segment.
    pub const DEFAULT: ApiVersion = ApiVersion::V1;

    /// All versions known to the server, oldest first.
    pub const ALL: &'static [ApiVersion] = &[ApiVersion::V1, ApiVersion::V2];

    /// Path segment for this version, e.g. `v1`.
    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }

    /// Path prefix under which a module is mounted for this version.
    pub fn mount_path(self, module_name: &str) -> String {
        format!("/api/{}/{}", self.as_str(), module_name)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core module trait that all BookStore modules must implement
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// API versions this module serves routes for
    fn api_versions(&self) -> &'static [ApiVersion] {
        &[ApiVersion::V1]
    }

    /// Initialize the module with the provided context
    /// Called during application startup before migrations
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the Axum router for this module's routes at `version`
    /// Routes will be mounted under `/api/{version}/{module_name}`, and the
    /// default version is also reachable under `/api/{module_name}`
    fn routes(&self, _version: ApiVersion) -> Router {
        Router::new()
    }

    /// Return OpenAPI specification fragment for this module as JSON
    /// Paths are relative to the module mount point
    fn openapi(&self, _version: ApiVersion) -> Option<serde_json::Value> {
        None
    }

    /// Return migrations contributed by this module
    /// Migrations are executed in the order returned
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Start background tasks for this module
    /// Called after migrations are complete
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stop the module and release its resources
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
