mod protocol;
mod routes;
mod server;

pub use protocol::*;
pub use routes::build_routes;
pub use server::{AppState, GatewayServer};
