pub mod models;
pub mod routes;
pub mod server;

pub use routes::{BridgeState, routes};
pub use server::serve;
