//! HTTP control API for the city traffic simulator.
//!
//! Exposes the [`CityDirectory`](citysim_core::CityDirectory) over REST:
//! cities can be created, inspected, and deleted, and cars (leaders or
//! followers) started in them. Detection telemetry does not flow through
//! this API; it goes straight to the message broker.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
