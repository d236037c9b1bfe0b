//! Login endpoint exchanging the administrator credentials for a token.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use utoipa::{PartialSchema, ToSchema};
use validator::Validate;

use bookstore_http::{AppError, ValidatedJson};
use bookstore_kernel::{settings::AuthSettings, ApiVersion, InitCtx, Module};

use crate::token::{TokenIssuer, ADMIN_ROLE};

/// Login request body
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    /// Lifetime of the token in seconds
    pub expires_in: i64,
}

/// The single credential pair accepted by the login endpoint.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings.admin_username.clone(),
            settings.admin_password.clone(),
        )
    }

    /// Compare both fields in constant time; both are always compared.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(password.as_bytes());
        bool::from(user_ok & pass_ok)
    }
}

#[derive(Clone)]
struct LoginState {
    credentials: Arc<Credentials>,
    issuer: TokenIssuer,
}

/// Core module serving `POST /api/{version}/auth/login`.
pub struct AuthModule {
    state: LoginState,
}

impl AuthModule {
    pub fn new(credentials: Credentials, issuer: TokenIssuer) -> Self {
        Self {
            state: LoginState {
                credentials: Arc::new(credentials),
                issuer,
            },
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            Credentials::from_settings(settings),
            TokenIssuer::from_settings(settings),
        )
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn api_versions(&self) -> &'static [ApiVersion] {
        ApiVersion::ALL
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            issuer = %ctx.settings.auth.issuer,
            ttl_minutes = ctx.settings.auth.token_ttl_minutes,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self, _version: ApiVersion) -> Router {
        Router::new()
            .route("/login", post(login))
            .with_state(self.state.clone())
    }

    fn openapi(&self, _version: ApiVersion) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/login": {
                    "post": {
                        "summary": "Exchange administrator credentials for a bearer token",
                        "tags": ["Auth"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/LoginRequest" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Token issued",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/TokenResponse" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Malformed request body",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            },
                            "401": { "description": "Invalid credentials" }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "LoginRequest": serde_json::to_value(LoginRequest::schema()).ok(),
                    "TokenResponse": serde_json::to_value(TokenResponse::schema()).ok(),
                }
            }
        }))
    }
}

async fn login(
    State(state): State<LoginState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    if !state.credentials.matches(&request.username, &request.password) {
        tracing::warn!(username = %request.username, "login rejected");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = state
        .issuer
        .issue(&request.username, ADMIN_ROLE)
        .map_err(|err| AppError::Internal(err.into()))?;

    tracing::info!(username = %request.username, "token issued");
    Ok(Json(TokenResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.issuer.ttl().whole_seconds(),
    }))
}
