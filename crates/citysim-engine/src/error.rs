//! Error types for the engine binary.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: citysim_core::ConfigError,
    },

    /// Connecting to the message broker failed.
    #[error("broker error: {source}")]
    Broker {
        /// The underlying broker error.
        #[from]
        source: citysim_core::BrokerError,
    },

    /// The HTTP server failed to start or crashed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: citysim_api::ServerError,
    },
}
