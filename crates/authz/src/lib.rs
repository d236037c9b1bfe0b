//! Authentication and authorization: JWT issuance and verification, the
//! role guard applied to protected routes, and the login endpoint.

pub mod guard;
pub mod login;
pub mod token;

pub use guard::{require_role, AuthenticatedUser, RoleGuard};
pub use login::{AuthModule, Credentials};
pub use token::{Claims, TokenError, TokenIssuer, TokenVerifier, ADMIN_ROLE};
