use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory holding the configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Environment variable that overrides the configuration directory.
const CONFIGURATION_DIR_ENV_NAME: &str = "APP_CONFIG_DIR";

const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Implemented by top-level configuration structures.
pub trait Config {
    /// Keys whose environment variable values are split on commas.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Which of the two configuration files is being resolved.
#[derive(Debug, Clone, Copy)]
enum ConfigFile {
    Base,
    Environment(Environment),
}

impl ConfigFile {
    fn stem(&self) -> Cow<'static, str> {
        match self {
            ConfigFile::Base => Cow::Borrowed("base"),
            ConfigFile::Environment(env) => Cow::Borrowed(env.as_str()),
        }
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFile::Base => f.write_str("base configuration"),
            ConfigFile::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors raised while assembling a configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate {description} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        description: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load {description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        description: String,
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to build configuration: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),
}

/// Loads `T` from the configuration directory of the current process.
///
/// The directory is `$APP_CONFIG_DIR` when set, otherwise `./configuration`. The runtime
/// environment comes from `APP_ENVIRONMENT`.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let directory = match std::env::var_os(CONFIGURATION_DIR_ENV_NAME) {
        Some(directory) => PathBuf::from(directory),
        None => std::env::current_dir()
            .map_err(LoadConfigError::CurrentDir)?
            .join(CONFIGURATION_DIR),
    };
    let environment = Environment::load()?;

    load_config_from(&directory, environment)
}

/// Loads `T` from `directory` for the given environment.
///
/// Reads `base.(yaml|yml|json)`, then `{environment}.(yaml|yml|json)`, then applies
/// `APP_`-prefixed environment variables. Nested keys use `__` (`APP_LOADER__START_KEY`) and
/// the keys listed in [`Config::LIST_PARSE_KEYS`] accept comma-separated values.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base_file = find_configuration_file(directory, ConfigFile::Base)?;
    let environment_file =
        find_configuration_file(directory, ConfigFile::Environment(environment))?;

    let mut env_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);
    if !T::LIST_PARSE_KEYS.is_empty() {
        env_source = env_source.try_parsing(true).list_separator(LIST_SEPARATOR);
        for key in T::LIST_PARSE_KEYS {
            env_source = env_source.with_list_parse_key(key);
        }
    }

    let builder = rust_cli_config::Config::builder()
        .add_source(rust_cli_config::File::from(base_file.clone()));
    check_source(&builder, ConfigFile::Base, &base_file)?;

    let builder = builder.add_source(rust_cli_config::File::from(environment_file.clone()));
    check_source(
        &builder,
        ConfigFile::Environment(environment),
        &environment_file,
    )?;

    builder
        .add_source(env_source)
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn find_configuration_file(directory: &Path, file: ConfigFile) -> Result<PathBuf, LoadConfigError> {
    let stem = file.stem();
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .collect();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let attempted = candidates
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        description: file.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
}

/// Builds the sources added so far so that a broken file is reported by name.
fn check_source(
    builder: &ConfigBuilder<DefaultState>,
    file: ConfigFile,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map(|_| ())
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            description: file.to_string(),
            path: path.to_path_buf(),
            source,
        })
}
