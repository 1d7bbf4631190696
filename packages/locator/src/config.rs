//! Loading [`HouseLocatorConfig`] from TOML.

use std::path::Path;

use house_locator_models::HouseLocatorConfig;

use crate::HouseLocatorError;

/// Parses a configuration document. Missing keys take their defaults.
///
/// # Errors
///
/// Returns [`HouseLocatorError::Config`] if the document is not valid
/// TOML or a value has the wrong type.
pub fn parse_config(toml_str: &str) -> Result<HouseLocatorConfig, HouseLocatorError> {
    Ok(toml::de::from_str(toml_str)?)
}

/// Reads and parses a configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<HouseLocatorConfig, HouseLocatorError> {
    let data = std::fs::read_to_string(path)?;
    let config = parse_config(&data)?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}
