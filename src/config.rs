use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{debug, info};
use serde_derive::{Deserialize, Serialize};

use crate::error::NowcastError;
use crate::parameters::ParameterGrid;

/// Civic population of the reference dataset, to two significant figures.
pub const DEFAULT_POPULATION: u64 = 10_000_000;

/// Model inputs that are not part of the observation feed. Every field is optional in the JSON
/// file:
///
/// ```json
/// {
///   "population": 5400000,
///   "grid": { "ifr": [0.005, 0.0075], "death_delay": [24, 28] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Denominator for cumulative seroprevalence.
    pub population: u64,
    pub grid: ParameterGrid,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            population: DEFAULT_POPULATION,
            grid: ParameterGrid::default(),
        }
    }
}

impl ModelConfig {
    /// Loads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// `NowcastError::IoError` / `NowcastError::JsonError` if the file cannot be read or parsed,
    /// `NowcastError::InvalidConfig` if the values cannot be run.
    pub fn load_from_json(path: &Path) -> Result<Self, NowcastError> {
        info!("Loading model config from: {}", path.display());
        let reader = BufReader::new(File::open(path)?);
        let config: ModelConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        debug!("{:?}", config);
        Ok(config)
    }

    /// # Errors
    ///
    /// `NowcastError::InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<(), NowcastError> {
        if self.population == 0 {
            return Err(NowcastError::InvalidConfig(
                "population must be positive".to_string(),
            ));
        }
        self.grid.validate().map_err(NowcastError::InvalidConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_fields_take_defaults() {
        let file = write_config(r#"{ "grid": { "ifr": [0.005] } }"#);
        let config = ModelConfig::load_from_json(file.path()).unwrap();
        assert_eq!(config.population, DEFAULT_POPULATION);
        assert_eq!(config.grid.ifr, vec![0.005]);
        assert_eq!(config.grid.death_delay, vec![26, 30, 34]);
    }

    #[test]
    fn empty_object_is_default_config() {
        let file = write_config("{}");
        let config = ModelConfig::load_from_json(file.path()).unwrap();
        assert_eq!(config, ModelConfig::default());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let file = write_config(r#"{ "populaton": 10 }"#);
        match ModelConfig::load_from_json(file.path()) {
            Err(NowcastError::JsonError(_)) => {}
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn zero_population_is_invalid() {
        let file = write_config(r#"{ "population": 0 }"#);
        match ModelConfig::load_from_json(file.path()) {
            Err(NowcastError::InvalidConfig(msg)) => assert!(msg.contains("population")),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        match ModelConfig::load_from_json(Path::new("does/not/exist.json")) {
            Err(NowcastError::IoError(_)) => {}
            other => panic!("Unexpected result: {other:?}"),
        }
    }
}
