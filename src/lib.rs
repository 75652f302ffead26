//! Client-side state and networking layer for a web application.
//!
//! SYSTEM CONTEXT
//! ==============
//! Embedded by a Rust web client (WASM or native). The host supplies a
//! `Transport`, a `KeyValueStore` and optionally a `ThemeApplier`, calls
//! `runtime::initialize` once, and renders from the stores on the returned
//! `AppHandle`.
//!
//! DESIGN
//! ======
//! State lives in observable stores (`store`). Stores notify synchronously,
//! so by the time a mutation returns, every dependent store has reacted.
//! The only suspension points are HTTP requests and timers (notification
//! auto-dismiss, retry backoff).

pub mod config;
pub mod error;
pub mod error_handler;
pub mod net;
pub mod persist;
pub mod retry;
pub mod runtime;
pub mod state;
pub mod store;

pub use config::ClientConfig;
pub use error::{ApiError, NormalizedError};
pub use error_handler::ErrorHandler;
pub use net::client::ApiClient;
pub use runtime::{AppHandle, Dependencies, initialize};
pub use store::{Derived, Readable, Store, Subscription};
