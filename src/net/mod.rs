//! Networking: the HTTP transport seam, the JSON client and wire types.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` performs raw exchanges, `client` layers auth, envelopes,
//! error normalization and retry on top, `api` names the endpoints, and
//! `types` defines the shared wire schema.

pub mod api;
pub mod client;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod test_helpers;
