//! Error taxonomy shared by every generation stage.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerrainError {
    /// An operation ran before the setup it depends on (e.g. generating
    /// before the map was allocated).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Malformed configuration: wrong-length tables, empty biome lists,
    /// non-positive dimensions.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, TerrainError>;

impl TerrainError {
    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
