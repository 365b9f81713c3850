use std::path::{Path, PathBuf};

use crate::config::types::PyletConfig;
use crate::error::{PyletError, Result};

/// Get the default configuration file path
pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "pylet", "pylet") {
        proj_dirs.config_dir().join("config.toml")
    } else {
        // Fallback to home directory
        dirs_fallback().join(".pylet").join("config.toml")
    }
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(config_path: Option<&Path>) -> Result<PyletConfig> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    if !path.exists() {
        // Return defaults if no config file exists
        return Ok(PyletConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: PyletConfig =
        toml::from_str(&content).map_err(|e| PyletError::TomlParse(e.to_string()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/pylet.toml"))).unwrap();
        assert_eq!(config.server.port, 6400);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[execution]\ncode_timeout_seconds = 5").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.execution.code_timeout_seconds, 5);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = notanumber").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, PyletError::TomlParse(_)));
    }
}
