//! Layered configuration for stacks.
//!
//! Settings are merged from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. a configuration file (an explicit path, or `stacks/config.toml` in the
//!    platform's configuration directory when it exists),
//! 3. environment variables prefixed `STACKS_`, with `__` separating nested
//!    keys (`STACKS_REGISTRY__REDIRECT_LIMIT=8`).
//!
//! Files are read as TOML, YAML or JSON depending on their extension.

pub mod error;

use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};

const ENV_PREFIX: &str = "STACKS_";
const ENV_SEPARATOR: &str = "__";
const FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Redirect chains of this many hops fail to resolve.
    pub redirect_limit: usize,
    pub identifier: IdentifierSource,
    /// Reader samples a random-page request draws before enumerating entries.
    pub random_attempts: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { redirect_limit: 16, identifier: IdentifierSource::default(), random_attempts: 32 }
    }
}

/// Where archive identifiers come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierSource {
    /// The archive's own identifier, when well-formed.
    #[default]
    Declared,
    /// Always derived from the file location.
    Location,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl Config {
    /// Load and validate configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if there is a file there.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::Missing(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.is_file()),
        };
        match &file {
            Some(file) => tracing::debug!(file = %file.display(), "loading configuration"),
            None => tracing::debug!("no configuration file, using defaults and environment"),
        }
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// `stacks/config.toml` in the platform configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "stacks").map(|dirs| dirs.config_dir().join(FILE_NAME))
    }

    /// Every configuration layer, unmerged into a `Config` yet.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Toml::file(file)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.redirect_limit == 0 {
            exn::bail!(ErrorKind::Invalid { field: "registry.redirect_limit", reason: "must be at least 1".to_string() });
        }
        if self.registry.random_attempts == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "registry.random_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let config = Config::from_figment(Figment::from(Serialized::defaults(Config::default()))).unwrap();
        assert_eq!(config.registry.redirect_limit, 16);
        assert_eq!(config.registry.random_attempts, 32);
        assert_eq!(config.registry.identifier, IdentifierSource::Declared);
        assert_eq!(config.log.level, LogLevel::Warn);
    }

    #[rstest]
    #[case("config.toml", "[registry]\nredirect_limit = 4\nidentifier = \"location\"\n")]
    #[case("config.yaml", "registry:\n  redirect_limit: 4\n  identifier: location\n")]
    #[case("config.json", r#"{"registry": {"redirect_limit": 4, "identifier": "location"}}"#)]
    fn reads_file_formats(#[case] name: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let config = Config::load(Some(Path::new(name))).unwrap();
            assert_eq!(config.registry.redirect_limit, 4);
            assert_eq!(config.registry.identifier, IdentifierSource::Location);
            // Unset keys keep their defaults.
            assert_eq!(config.registry.random_attempts, 32);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("stacks.toml", "[registry]\nredirect_limit = 4\n\n[log]\nlevel = \"info\"\n")?;
            jail.set_env("STACKS_REGISTRY__REDIRECT_LIMIT", "8");
            jail.set_env("STACKS_LOG__LEVEL", "debug");
            let config = Config::load(Some(Path::new("stacks.toml"))).unwrap();
            assert_eq!(config.registry.redirect_limit, 8);
            assert_eq!(config.log.level, LogLevel::Debug);
            assert_eq!(tracing::Level::from(config.log.level), tracing::Level::DEBUG);
            Ok(())
        });
    }

    #[test]
    fn explicit_file_must_exist() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert_eq!(*err, ErrorKind::Missing(PathBuf::from("/definitely/not/here.toml")));
    }

    #[rstest]
    #[case("[registry]\nredirect_limit = 0\n", "registry.redirect_limit")]
    #[case("[registry]\nrandom_attempts = 0\n", "registry.random_attempts")]
    fn rejects_zero_bounds(#[case] contents: &str, #[case] expected: &str) {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", contents)?;
            let err = Config::load(Some(Path::new("config.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid { field, .. } if *field == expected));
            Ok(())
        });
    }

    #[rstest]
    #[case("[registry]\nidentifier = \"random\"\n")]
    #[case("[log]\nlevel = \"loud\"\n")]
    #[case("[registry]\nredirect_limit = \"many\"\n")]
    fn rejects_malformed_values(#[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", contents)?;
            let err = Config::load(Some(Path::new("config.toml"))).unwrap_err();
            assert_eq!(*err, ErrorKind::Load);
            Ok(())
        });
    }
}
