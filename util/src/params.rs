//! Generic parameter file loading
//!
//! Each module owns a plain `Deserialize` parameter struct and loads it from
//! a TOML file at initialisation. Parameter structs are treated as immutable
//! snapshots once loaded.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read the parameter file: {0}")]
    FileLoadError(#[from] std::io::Error),

    #[error("Could not deserialise the parameter file: {0}")]
    DeserialiseError(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file.
///
/// The target type determines which keys are expected in the file, missing or
/// mistyped keys produce a `LoadError::DeserialiseError`.
pub fn load<P, Q>(param_file_path: Q) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    Q: AsRef<Path>,
{
    let params_str = read_to_string(param_file_path)?;

    Ok(toml::from_str(params_str.as_str())?)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct TestParams {
        rate_hz: f64,
        name: String,
    }

    #[test]
    fn test_load() {
        let dir = std::env::temp_dir().join("util_params_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(&path, "rate_hz = 50.0\nname = \"tracker\"\n").unwrap();

        let params: TestParams = load(&path).unwrap();
        assert_eq!(params.rate_hz, 50.0);
        assert_eq!(params.name, "tracker");
    }

    #[test]
    fn test_load_missing_key() {
        let dir = std::env::temp_dir().join("util_params_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("missing.toml");
        std::fs::write(&path, "rate_hz = 50.0\n").unwrap();

        let result: Result<TestParams, LoadError> = load(&path);
        assert!(matches!(result, Err(LoadError::DeserialiseError(_))));
    }
}
