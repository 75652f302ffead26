//! Application state stores.
//!
//! Each submodule owns one concern. Cross-store reactions (auth to user,
//! user preferences to theme) are wired in `runtime`, not here.

pub mod app;
pub mod auth;
pub mod notifications;
pub mod theme;
pub mod user;
