//! Authentication module
//!
//! Credential hashing, RS256 token issuance and verification, request
//! authentication and the rate-limit gates in front of it all.

pub mod handlers;
pub mod keys;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod session;
mod service;
pub mod token;

pub use keys::KeyStore;
pub use password::{HashFailure, HashResult, PasswordService};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use service::{AuthService, Session};
pub use session::AuthenticatedUser;
pub use token::{Claims, Identity, TokenKind, TokenPair, TokenService};
