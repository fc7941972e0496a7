//! Authenticated request pipeline.
//!
//! - `executor` — bearer injection, refresh on 401, retry once
//! - `refresher` — refresh token exchange
//! - `api` — login / register / logout / current user
//! - `notifier` — session established / cleared hooks

pub mod api;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod refresher;
pub mod request;
