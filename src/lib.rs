//! # Session Agent Library
//!
//! Authenticated request pipeline for a REST api client: attaches bearer
//! credentials to outbound calls, refreshes them transparently on a 401 and
//! retries the failed call exactly once, keeping the access and refresh tokens
//! consistent across concurrent callers.
//!
//! Modules:
//! - `auth` — request executor, refresher, login/logout api, state notifier
//! - `store` — session types, credential store and its backends
//! - `resilience` — single-flight refresh coordination
//! - `config` — service configuration loading and validation
//! - `observability` — prometheus metrics

pub mod auth;
pub mod config;
pub mod helpers;
pub mod observability;
pub mod resilience;
pub mod store;
pub mod utils;
pub mod tests;


pub use crate::auth::api::AuthApi;
pub use crate::auth::error::AuthError;
pub use crate::auth::executor::RequestExecutor;
pub use crate::auth::notifier::{AuthEvent, AuthStateNotifier, BroadcastNotifier, NoopNotifier};
pub use crate::auth::request::{ApiResponse, AuthenticatedRequest};
pub use crate::config::settings::ServiceConfig;
pub use crate::store::credential_store::CredentialStore;
pub use crate::store::session::{AccessToken, RefreshToken, Session, SessionState};
