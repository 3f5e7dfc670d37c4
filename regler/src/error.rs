use std::io;

use regler_core::fields::RegistryError;
use thiserror::Error;

/// Error type for regler
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ReglerError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Config(#[from] envy::Error),

    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Database(#[from] rorm::Error),
}
