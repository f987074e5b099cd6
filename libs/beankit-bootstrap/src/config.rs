use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use beankit::types::{ClassModel, ClassTable, ResolverConfig};

/// Prefix of environment overrides, e.g. `BEANKIT__RESOLVER__MAX_DEPTH=64`.
pub const ENV_PREFIX: &str = "BEANKIT__";

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Logging configuration (optional, minimal console logging if None).
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    /// Type-closure resolver settings.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// YAML class model; relative paths resolve against the config file's directory.
    #[serde(default)]
    pub model: Option<String>,
}

/// Logging configuration - maps targets to their logging settings.
/// Key "default" is the catch-all for targets without their own section.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Section {
    /// "trace" .. "error", or "off".
    pub console_level: String,
    /// JSON log file; only honored on the "default" section. Empty disables it.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Section {
    pub fn console(level: &str) -> Self {
        Self {
            console_level: level.to_owned(),
            file: String::new(),
            file_level: String::new(),
            max_age_days: None,
            max_backups: None,
            max_size_mb: None,
        }
    }
}

/// Console-only logging at `info`.
pub fn default_logging_config() -> LoggingConfig {
    HashMap::from([("default".to_owned(), Section::console("info"))])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: Some(default_logging_config()),
            resolver: ResolverConfig::default(),
            model: None,
        }
    }
}

impl AppConfig {
    /// Defaults, then the YAML file, then `BEANKIT__*` environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let path = config_path.as_ref();
        if !path.is_file() {
            anyhow::bail!("config file '{}' not found", path.display());
        }

        // Optional sections stay None unless YAML or ENV provide them.
        let base = AppConfig {
            logging: None,
            resolver: ResolverConfig::default(),
            model: None,
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to extract config from '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// [`AppConfig::load_layered`] when a path is given, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => Ok(Self::default()),
        }
    }

    /// Effective configuration as YAML, for `--print-config`.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Layer CLI overrides on top of file and environment values.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(max_depth) = args.max_depth {
            self.resolver.max_depth = max_depth;
        }
        if let Some(model) = &args.model {
            self.model = Some(model.clone());
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        let default_section = logging
            .entry("default".to_owned())
            .or_insert_with(|| Section::console("info"));
        match args.verbose {
            0 => {}
            1 => default_section.console_level = "debug".to_owned(),
            _ => default_section.console_level = "trace".to_owned(),
        }
    }

    /// Absolute location of the class model, if one is configured.
    pub fn model_path(&self, base_dir: &Path) -> Option<PathBuf> {
        let model = self.model.as_deref()?.trim();
        if model.is_empty() {
            return None;
        }
        let p = Path::new(model);
        Some(if p.is_absolute() {
            p.to_path_buf()
        } else {
            base_dir.join(p)
        })
    }

    /// Builtin classes plus the configured class model.
    pub fn load_class_table(&self, base_dir: &Path) -> Result<ClassTable> {
        let Some(path) = self.model_path(base_dir) else {
            return Ok(ClassTable::new());
        };
        let yaml = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read class model '{}'", path.display()))?;
        let table = ClassModel::from_yaml_str(&yaml)
            .and_then(|model| model.build_table())
            .with_context(|| format!("Invalid class model '{}'", path.display()))?;
        tracing::info!(path = %path.display(), classes = table.len(), "class model loaded");
        Ok(table)
    }
}

/// Overrides collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub model: Option<String>,
    pub max_depth: Option<usize>,
    pub verbose: u8,
}

/// Directory that relative paths in the config resolve against.
pub fn config_base_dir(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path.and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir.to_path_buf()),
        _ => std::env::current_dir().context("Failed to resolve current directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beankit::types::{RawClass, TypeIntrospector, DEFAULT_MAX_DEPTH};
    use std::{env, fs};
    use tempfile::tempdir;

    #[test]
    fn test_defaults_use_console_logging_and_builtin_depth() {
        let config = AppConfig::default();
        assert_eq!(config.resolver.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.model.is_none());
        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].console_level, "info");
        assert!(logging["default"].file.is_empty());
    }

    #[test]
    fn test_layered_loading_yaml_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beankit.yaml");
        fs::write(
            &path,
            r#"
logging:
  default:
    console_level: warn
    file: logs/beankit.log
    file_level: debug
    max_backups: 2
  beankit::types:
    console_level: trace
resolver:
  max_depth: 64
"#,
        )
        .unwrap();

        let config = AppConfig::load_layered(&path).unwrap();
        assert_eq!(config.resolver.max_depth, 64);
        let logging = config.logging.unwrap();
        assert_eq!(logging["default"].console_level, "warn");
        assert_eq!(logging["default"].max_backups, Some(2));
        assert_eq!(logging["beankit::types"].console_level, "trace");
    }

    #[test]
    fn test_env_overrides_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beankit.yaml");
        fs::write(&path, "model: from-yaml.yaml\n").unwrap();

        env::set_var("BEANKIT__MODEL", "from-env.yaml");
        let config = AppConfig::load_layered(&path);
        env::remove_var("BEANKIT__MODEL");

        let config = config.unwrap();
        assert_eq!(config.model.as_deref(), Some("from-env.yaml"));
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beankit.yaml");
        fs::write(&path, "resolver:\n  depth: 3\n").unwrap();
        assert!(AppConfig::load_layered(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = AppConfig::load_layered(dir.path().join("absent.yaml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        config.apply_cli_overrides(&CliArgs {
            max_depth: Some(12),
            model: Some("model.yaml".to_owned()),
            verbose: 2,
            ..CliArgs::default()
        });
        assert_eq!(config.resolver.max_depth, 12);
        assert_eq!(config.model.as_deref(), Some("model.yaml"));
        assert_eq!(config.logging.unwrap()["default"].console_level, "trace");
    }

    #[test]
    fn test_class_model_resolves_relative_to_base_dir() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("classes.yaml"),
            "classes:\n  - name: Token\n    final: true\n    implements: [Serializable]\n",
        )
        .unwrap();

        let config = AppConfig {
            model: Some("classes.yaml".to_owned()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.model_path(dir.path()),
            Some(dir.path().join("classes.yaml"))
        );
        let table = config.load_class_table(dir.path()).unwrap();
        assert!(table.is_serializable(&RawClass::named("Token")));

        let table = AppConfig::default().load_class_table(dir.path()).unwrap();
        assert!(!table.contains("Token"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let yaml = AppConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("resolver:"));
        assert!(yaml.contains("max_depth: 256"));
    }
}
