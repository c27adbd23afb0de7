// Identity collaborator: validates bearer tokens and hands the caller to the core.
// Token issuance (register/login) lives outside this service.

// Public API - what other modules can use
pub use middleware::jwt_auth;
pub use token::TokenConfig;
pub use types::{AuthClaims, Caller};

// Internal modules
mod middleware;
mod token;
mod types;
