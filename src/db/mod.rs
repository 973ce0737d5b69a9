//! User persistence.
//!
//! [`UserStore`] is the seam the auth service talks to; Postgres backs it in
//! production and [`InMemoryUserStore`] backs it in tests and local runs.

pub mod memory;
pub mod models;
pub mod operations;

pub use memory::InMemoryUserStore;
pub use models::Credential;
pub use operations::{DbOperations, UserStore};
