//! Transport (§6 External Interfaces): axum WebSocket surface translating
//! wire messages to `EngineHandle` calls and engine events back to the wire.

pub mod routes;
pub mod ws;

pub use routes::build_router;
