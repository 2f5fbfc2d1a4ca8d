//! # Parameter loading module
//!
//! Parameters are stored in TOML files and deserialised into plain structs
//! with serde. Each executable keeps its parameter files under a `params/`
//! directory relative to the working directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur during parameter loading
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load the parameter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot deserialise the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter struct from the given TOML file path.
pub fn load<P: DeserializeOwned, Q: AsRef<Path>>(path: Q) -> Result<P, LoadError> {
    let content = std::fs::read_to_string(path).map_err(LoadError::FileLoadError)?;

    toml::from_str(&content).map_err(LoadError::DeserialiseError)
}
