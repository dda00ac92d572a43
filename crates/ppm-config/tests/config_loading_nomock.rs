//! No-mock configuration loading + resolution tests.
//!
//! Covers:
//! - Parameter and run config parsing against real fixture files
//! - Combined validation and conversion to the unified error type
//! - Resolution order (CLI > env > config dir)

use ppm_config::resolve::{resolve_config, ConfigSource, ENV_CONFIG_DIR, ENV_PARAMS_PATH, ENV_RUN_CONFIG_PATH};
use ppm_config::{
    Config, DecodeVariant, FailurePolicy, ModelParameters, PrefixSource, RunConfig,
    ValidationError, VectorizerKind,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn fixture(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let saved = keys.iter().map(|k| env::var(k).ok()).collect();
        for key in keys {
            env::remove_var(key);
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, saved) in self.keys.iter().zip(&self.saved) {
            match saved {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

#[test]
fn single_timestamp_params_fixture_loads() {
    let params = ModelParameters::from_file(&fixture("params_single.json")).unwrap();
    assert_eq!(params.time_dim(), 5);
    assert_eq!(params.max_predictions(), 4);
    assert_eq!(params.file_name.as_deref(), Some("purchasing.csv"));
    ppm_config::validate::validate_params(&params).unwrap();
}

#[test]
fn dual_timestamp_params_fixture_loads() {
    let params = ModelParameters::from_file(&fixture("params_dual.json")).unwrap();
    assert!(!params.one_timestamp);
    assert_eq!(params.vectorizer, VectorizerKind::Inter);
    assert_eq!(params.scale_args.wait().and_then(|w| w.max_value), Some(86400.0));
    ppm_config::validate::validate_params(&params).unwrap();
}

#[test]
fn full_config_loads_with_snapshot() {
    let paths = resolve_config(
        Some(&fixture("params_single.json")),
        Some(&fixture("run_multi.toml")),
    );
    let config = Config::load(&paths).unwrap();
    assert_eq!(config.run.variant, DecodeVariant::MultiPred);
    assert_eq!(config.run.on_case_error, FailurePolicy::SkipCase);
    assert_eq!(config.run.read_options.timeformat, "%Y-%m-%d %H:%M:%S");
    assert_eq!(config.snapshot.summary.prediction_count, 3);
    assert_eq!(config.snapshot.summary.seed, Some(42));
    assert!(!config.snapshot.run_is_default());
    assert_eq!(config.snapshot.params_hash.len(), 64);
}

#[test]
fn dual_config_loads_from_json_run_file() {
    let paths = resolve_config(
        Some(&fixture("params_dual.json")),
        Some(&fixture("run_dual.json")),
    );
    let config = Config::load(&paths).unwrap();
    assert_eq!(config.run.prefix_source, PrefixSource::Prediction { start_prefix: 1 });
}

#[test]
fn too_many_predictions_rejected() {
    let paths = resolve_config(
        Some(&fixture("params_single.json")),
        Some(&fixture("run_too_many.yaml")),
    );
    let err = Config::load(&paths).unwrap_err();
    assert_eq!(
        err,
        ValidationError::PredictionCount {
            requested: 10,
            max: 4
        }
    );
    let unified: ppm_common::Error = err.into();
    assert_eq!(unified.code(), 32);
}

#[test]
fn bogus_norm_method_rejected() {
    let paths = resolve_config(Some(&fixture("params_bad_method.json")), None);
    let err = Config::load(&paths).unwrap_err();
    assert_eq!(err, ValidationError::UnknownNormMethod("bogus".to_string()));
}

#[test]
fn missing_params_file_is_io_error() {
    let paths = resolve_config(Some(Path::new("/nonexistent/params.json")), None);
    assert!(matches!(
        Config::load(&paths),
        Err(ValidationError::IoError(_))
    ));
}

#[test]
fn unsupported_run_config_extension_rejected() {
    let dir = TempDir::new().unwrap();
    let run = dir.path().join("run.ini");
    fs::write(&run, "variant=arg_max").unwrap();
    assert!(matches!(
        RunConfig::from_file(&run),
        Err(ValidationError::ParseError(_))
    ));
}

#[test]
fn env_vars_resolve_when_no_cli_paths() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_PARAMS_PATH, ENV_RUN_CONFIG_PATH, ENV_CONFIG_DIR]);
        env::set_var(ENV_PARAMS_PATH, fixture("params_single.json"));

        let paths = resolve_config(None, None);
        assert_eq!(paths.params_source, ConfigSource::Environment);
        assert_eq!(paths.params.as_deref(), Some(fixture("params_single.json").as_path()));

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.run, RunConfig::default());
    });
}

#[test]
fn config_dir_env_var_finds_both_files() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_PARAMS_PATH, ENV_RUN_CONFIG_PATH, ENV_CONFIG_DIR]);
        let dir = TempDir::new().unwrap();
        fs::copy(fixture("params_single.json"), dir.path().join("params.json")).unwrap();
        fs::copy(fixture("run_multi.toml"), dir.path().join("run.toml")).unwrap();
        env::set_var(ENV_CONFIG_DIR, dir.path());

        let paths = resolve_config(None, None);
        assert_eq!(paths.params_source, ConfigSource::Environment);
        assert_eq!(paths.run_source, ConfigSource::Environment);
        assert_eq!(paths.run.as_deref(), Some(dir.path().join("run.toml").as_path()));
    });
}

#[test]
fn cli_path_beats_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_PARAMS_PATH, ENV_RUN_CONFIG_PATH, ENV_CONFIG_DIR]);
        env::set_var(ENV_PARAMS_PATH, fixture("params_dual.json"));

        let paths = resolve_config(Some(&fixture("params_single.json")), None);
        assert_eq!(paths.params_source, ConfigSource::CliArgument);
        assert_eq!(paths.params.as_deref(), Some(fixture("params_single.json").as_path()));
    });
}
