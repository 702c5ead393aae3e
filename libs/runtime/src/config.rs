use anyhow::{bail, Context, Result};
use odata_core::ODataSettings;
use odata_db::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Everything `envelope-server` reads at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Backing store of the demo collections.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// `None` falls back to [`default_logging_config`] at init time.
    pub logging: Option<LoggingConfig>,
    /// Link generation and page-size bounds.
    #[serde(default)]
    pub odata: ODataSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request handler timeout; 0 disables it.
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default)]
    pub cors_enabled: bool,
}

fn default_timeout_sec() -> u64 {
    30
}

/// Target prefix (crate name such as `odata_db`, or `default`) → sink settings.
pub type LoggingConfig = HashMap<String, Section>;

/// Sinks for one subsystem. Levels are `trace|debug|info|warn|error|off`;
/// an empty `file` disables file output.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String,
    pub file: String,
    /// Empty or unrecognised means `info`.
    #[serde(default)]
    pub file_level: String,
    /// Rotated files kept next to the live one.
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8087,
            timeout_sec: default_timeout_sec(),
            cors_enabled: false,
        }
    }
}

/// `info` on the console, `debug` into a rotated `logs/envelope-server.log`.
pub fn default_logging_config() -> LoggingConfig {
    let catch_all = Section {
        console_level: "info".into(),
        file: "logs/envelope-server.log".into(),
        file_level: "debug".into(),
        max_backups: Some(3),
        max_size_mb: Some(100),
    };
    HashMap::from([(DEFAULT_SECTION.to_owned(), catch_all)])
}

const DEFAULT_SECTION: &str = "default";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: Some(default_logging_config()),
            odata: ODataSettings::default(),
        }
    }
}

const ENV_PREFIX: &str = "APP__";

/// `odata` keys as the HTTP API spells them, with the field each one fills.
const ODATA_KEY_ALIASES: [(&str, &str); 4] = [
    ("hostName", "host_name"),
    ("isHttps", "is_https"),
    ("maxPageSize", "max_page_size"),
    ("defaultPageSize", "default_page_size"),
];

/// Read the YAML file and rename camelCase `odata` keys to their field names.
///
/// The serialized defaults underneath always carry the snake_case keys, so a
/// camelCase key left in place would reach serde as a duplicate field.
fn canonical_yaml(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)?;
    let mut doc: serde_yaml::Value = serde_yaml::from_str(&raw)?;
    if doc.is_null() {
        doc = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }

    if let Some(odata) = doc.get_mut("odata").and_then(serde_yaml::Value::as_mapping_mut) {
        for (api_name, field) in ODATA_KEY_ALIASES {
            if odata.contains_key(field) {
                continue;
            }
            if let Some(value) = odata.remove(api_name) {
                odata.insert(field.into(), value);
            }
        }
    }
    Ok(serde_yaml::to_string(&doc)?)
}

impl AppConfig {
    /// Built-in defaults, then the YAML file, then `APP__*` environment variables.
    ///
    /// `APP__ODATA__MAX_PAGE_SIZE=100` maps to `odata.max_page_size`. The result is
    /// validated before it is returned.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::load_with_env_prefix(config_path.as_ref(), ENV_PREFIX)
    }

    fn load_with_env_prefix(config_path: &Path, env_prefix: &str) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        if !config_path.is_file() {
            bail!("Config file not found: {}", config_path.display());
        }

        // Logging stays None unless YAML/ENV provide it.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let yaml = canonical_yaml(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::string(&yaml))
            .merge(Env::prefixed(env_prefix).split("__"));

        let config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// [`Self::load_layered`] when a path is given, the built-in defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        let Some(path) = config_path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        Self::load_layered(path)
    }

    /// Reject settings the envelope pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        let o = &self.odata;
        if o.host_name.trim().is_empty() {
            bail!("odata.host_name must not be empty");
        }
        if o.max_page_size == 0 {
            bail!("odata.max_page_size must be positive");
        }
        if o.default_page_size == 0 {
            bail!("odata.default_page_size must be positive");
        }
        if o.default_page_size > o.max_page_size {
            bail!(
                "odata.default_page_size ({}) exceeds odata.max_page_size ({})",
                o.default_page_size,
                o.max_page_size
            );
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Command-line flags win over file and environment.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        self.server.port = args.port.unwrap_or(self.server.port);

        if args.mock {
            self.database = DatabaseConfig::in_memory();
        }

        let level = match args.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        };
        let sections = self.logging.get_or_insert_with(default_logging_config);
        if let (Some(level), Some(catch_all)) = (level, sections.get_mut(DEFAULT_SECTION)) {
            catch_all.console_level = level.to_owned();
        }
    }
}

/// Flags of the `envelope-server` binary that feed [`AppConfig::apply_cli_overrides`].
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
    pub mock: bool,
}
