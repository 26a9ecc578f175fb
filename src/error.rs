//! Error types for extension negotiation and message processing.
//!
//! Two runtime error kinds exist: [`Error::Parse`] for malformed
//! negotiation headers and [`Error::Extension`] for negotiation or
//! pipeline failures. Registration mistakes are not runtime errors at
//! all: they are caller bugs, and
//! [`ExtensionManager::add`](crate::ExtensionManager::add) panics on
//! them.

use thiserror::Error;

/// Result type alias for extension operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during extension negotiation and processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed extension header. Raised only by the parser and never
    /// wrapped, so callers can reject the handshake outright.
    #[error("Invalid extension header: {0}")]
    Parse(String),

    /// Negotiation, reservation, or pipeline failure.
    #[error("Extension error: {0}")]
    Extension(String),
}
