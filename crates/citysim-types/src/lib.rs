//! Shared type definitions for the city traffic simulation.
//!
//! This crate is the leaf of the workspace: it holds the identifier
//! newtypes, the grid [`Position`], and the [`CarDetectedEvent`] wire
//! record that downstream consumers read off the message bus. It has no
//! runtime dependencies beyond serialization and time.

pub mod event;
pub mod ids;
pub mod position;

pub use event::CarDetectedEvent;
pub use ids::{CarId, CityId};
pub use position::Position;
