//! Transport layer for vigil-bridge. HTTP via axum.

pub mod http;

pub use http::{BridgeState, routes, serve};
