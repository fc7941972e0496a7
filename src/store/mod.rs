//! Session ownership and persistence.

pub mod backend;
pub mod cookie;
pub mod credential_store;
pub mod session;
