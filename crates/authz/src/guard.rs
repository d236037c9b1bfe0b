//! Bearer-token guard for protected routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use bookstore_http::AppError;

use crate::token::{TokenError, TokenVerifier};

/// Identity established by [`require_role`], available to handlers as an
/// extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub role: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("request is not authenticated"))
    }
}

/// State for [`require_role`]: the verifier and the role a route demands.
#[derive(Clone)]
pub struct RoleGuard {
    verifier: TokenVerifier,
    role: &'static str,
}

impl RoleGuard {
    pub fn new(verifier: TokenVerifier, role: &'static str) -> Self {
        Self { verifier, role }
    }

    /// Resolve the caller behind `headers`, enforcing the required role.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AppError> {
        let token = bearer_token(headers)?;

        let claims = self.verifier.verify(token).map_err(|err| {
            match &err {
                TokenError::Expired => tracing::debug!("rejecting expired token"),
                TokenError::Invalid(e) => tracing::debug!(error = %e, "rejecting invalid token"),
            }
            AppError::unauthorized(err.to_string())
        })?;

        if claims.role != self.role {
            tracing::warn!(
                user = %claims.sub,
                role = %claims.role,
                required = self.role,
                "insufficient role"
            );
            return Err(AppError::forbidden(format!("role '{}' required", self.role)));
        }

        Ok(AuthenticatedUser {
            username: claims.sub,
            role: claims.role,
        })
    }
}

/// Middleware rejecting requests without a valid token for the guard's role;
/// install with `axum::middleware::from_fn_with_state`.
pub async fn require_role(
    State(guard): State<RoleGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = guard.authorize(req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("malformed Authorization header"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("malformed Authorization header"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized("unsupported authorization scheme"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("empty bearer token"));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{TokenIssuer, ADMIN_ROLE};
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use time::Duration;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"guard-secret";
    const ISSUER: &str = "bookstore-api";

    fn app() -> Router {
        let guard = RoleGuard::new(TokenVerifier::new(SECRET, ISSUER), ADMIN_ROLE);
        Router::new()
            .route(
                "/whoami",
                get(|user: AuthenticatedUser| async move { user.username }),
            )
            .route_layer(middleware::from_fn_with_state(guard, require_role))
    }

    async fn call(authorization: Option<String>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn token(role: &str, ttl: Duration) -> String {
        TokenIssuer::new(SECRET, ISSUER, ttl)
            .issue("alice", role)
            .unwrap()
    }

    #[tokio::test]
    async fn admin_token_is_accepted() {
        let value = format!("Bearer {}", token(ADMIN_ROLE, Duration::hours(1)));
        let (status, body) = call(Some(value)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        assert_eq!(call(None).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_scheme_is_unauthorized() {
        let value = format!("Basic {}", token(ADMIN_ROLE, Duration::hours(1)));
        assert_eq!(call(Some(value)).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let value = format!("Bearer {}", token(ADMIN_ROLE, Duration::minutes(-1)));
        assert_eq!(call(Some(value)).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn other_role_is_forbidden() {
        let value = format!("Bearer {}", token("User", Duration::hours(1)));
        assert_eq!(call(Some(value)).await.0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn bearer_prefix_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }
}
