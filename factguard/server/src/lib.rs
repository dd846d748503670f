#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! HTTP surface of the fact-verification pipeline.

/// Bearer-token authentication.
#[path = "../auth.rs"]
pub mod auth;

/// Handler error responses.
#[path = "../error.rs"]
pub mod error;

/// Routes, tracing setup, and the serve loop.
#[path = "../router.rs"]
pub mod router;

pub use auth::{bearer_token, Authenticator, StaticTokenAuthenticator};
pub use error::AppError;
pub use router::{init_tracing, router, run, AppState};
