//! Device error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeviceError>;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device has not been initialized; call setup() first")]
    NotInitialized,

    #[error("device is already set up")]
    AlreadySetUp,

    #[error("topology error: {0}")]
    Topology(#[from] homie_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] homie_transport::TransportError),
}

impl DeviceError {
    /// The topology error behind this one, if any
    pub fn topology(&self) -> Option<&homie_core::Error> {
        match self {
            DeviceError::Topology(e) => Some(e),
            _ => None,
        }
    }
}
