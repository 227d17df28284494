//! CLI utilities for binaries
//!
//! Configuration path resolution: explicit argument first, then the
//! CONFIG_PATH environment variable, then the default file.

use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "config/quoter.yaml";
const CONFIG_ENV_VAR: &str = "CONFIG_PATH";

/// Resolve the configuration file path
pub fn config_path(arg: Option<&str>) -> PathBuf {
    if let Some(path) = arg {
        return path.into();
    }
    std::env::var(CONFIG_ENV_VAR)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Command line arguments, excluding the program name
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_argument_wins() {
        assert_eq!(
            config_path(Some("custom/quoter.yaml")),
            PathBuf::from("custom/quoter.yaml")
        );
    }

    #[test]
    fn falls_back_to_default() {
        // CONFIG_PATH unset in the test environment
        if std::env::var(CONFIG_ENV_VAR).is_err() {
            assert_eq!(config_path(None), PathBuf::from(DEFAULT_CONFIG_PATH));
        }
    }
}
