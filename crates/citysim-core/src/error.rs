//! Errors surfaced by city operations.

use citysim_types::{CarId, CityId};

use crate::broker::BrokerError;

/// Failure of a city or directory operation.
#[derive(Debug, thiserror::Error)]
pub enum CityError {
    /// No city with this id.
    #[error("city not found: {0}")]
    CityNotFound(CityId),

    /// No car with this VIN in the city.
    #[error("car not found: {0}")]
    CarNotFound(CarId),

    /// The city was asked for something its settings make impossible.
    #[error("invalid city settings: {0}")]
    InvalidSettings(String),

    /// The city is not (or no longer) accepting cars.
    #[error("city {0} is not active")]
    NotActive(CityId),

    /// Topic provisioning failed.
    #[error("broker unavailable: {source}")]
    Broker {
        /// The underlying broker error.
        #[from]
        source: BrokerError,
    },
}
