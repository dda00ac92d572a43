//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI arguments → environment variables → XDG paths → defaults.

use std::path::{Path, PathBuf};

/// Discovered configuration file paths.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to the model parameter file (or None if not found).
    pub params: Option<PathBuf>,

    /// Path to the run configuration (or None if not found).
    pub run: Option<PathBuf>,

    /// Source of the parameter file (for diagnostics).
    pub params_source: ConfigSource,

    /// Source of the run configuration (for diagnostics).
    pub run_source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_PARAMS_PATH: &str = "PPM_PARAMS";
pub const ENV_RUN_CONFIG_PATH: &str = "PPM_RUN_CONFIG";
pub const ENV_CONFIG_DIR: &str = "PPM_CONFIG_DIR";

/// Standard config file names, in lookup order.
const PARAMS_FILENAMES: &[&str] = &["params.json"];
const RUN_FILENAMES: &[&str] = &["run.toml", "run.yaml", "run.yml", "run.json"];

/// Application name for XDG directories.
const APP_NAME: &str = "ppm";

/// Resolve configuration paths using the standard resolution order.
///
/// Resolution order for each config file:
/// 1. Explicit CLI path (used even if it does not exist, so the load
///    reports the missing file)
/// 2. Environment variable (PPM_PARAMS, PPM_RUN_CONFIG)
/// 3. PPM_CONFIG_DIR environment variable + filename
/// 4. XDG config directory (~/.config/ppm/)
/// 5. Built-in defaults (None)
pub fn resolve_config(cli_params: Option<&Path>, cli_run: Option<&Path>) -> ConfigPaths {
    let (params, params_source) =
        resolve_single_config(cli_params, ENV_PARAMS_PATH, PARAMS_FILENAMES);
    let (run, run_source) = resolve_single_config(cli_run, ENV_RUN_CONFIG_PATH, RUN_FILENAMES);
    ConfigPaths {
        params,
        run,
        params_source,
        run_source,
    }
}

fn resolve_single_config(
    cli_path: Option<&Path>,
    env_var: &str,
    filenames: &[&str],
) -> (Option<PathBuf>, ConfigSource) {
    // 1. CLI argument
    if let Some(path) = cli_path {
        return (Some(path.to_path_buf()), ConfigSource::CliArgument);
    }

    // 2. Environment variable (direct path)
    if let Ok(env_path) = std::env::var(env_var) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    // 3. Environment variable (config dir)
    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        if let Some(path) = first_existing(Path::new(&config_dir), filenames) {
            return (Some(path), ConfigSource::Environment);
        }
    }

    // 4. XDG config directory
    if let Some(dir) = xdg_config_dir() {
        if let Some(path) = first_existing(&dir, filenames) {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    // 5. Built-in default (None)
    (None, ConfigSource::BuiltinDefault)
}

fn first_existing(dir: &Path, filenames: &[&str]) -> Option<PathBuf> {
    filenames
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Get the XDG config directory for ppm.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(format!("{}", ConfigSource::BuiltinDefault), "builtin default");
    }

    #[test]
    fn test_cli_path_wins() {
        let paths = resolve_config(
            Some(Path::new("/nonexistent/params.json")),
            Some(Path::new("/nonexistent/run.toml")),
        );
        assert_eq!(paths.params_source, ConfigSource::CliArgument);
        assert_eq!(paths.run_source, ConfigSource::CliArgument);
        assert_eq!(
            paths.params.as_deref(),
            Some(Path::new("/nonexistent/params.json"))
        );
    }

    #[test]
    fn test_first_existing_respects_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run.json"), "{}").unwrap();
        std::fs::write(dir.path().join("run.yaml"), "{}").unwrap();
        let found = first_existing(dir.path(), RUN_FILENAMES).unwrap();
        assert_eq!(found, dir.path().join("run.yaml"));
        assert!(first_existing(dir.path(), PARAMS_FILENAMES).is_none());
    }
}
