//! Centralized configuration for Vidserve.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase. The configuration
//! is an explicit value handed to the resolver and streaming engine at
//! construction, so several configurations can coexist in one process.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default size of a single streamed chunk (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Content type served for every category unless configured otherwise.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Central configuration for all Vidserve components.
#[derive(Debug, Clone, Default)]
pub struct VidserveConfig {
    pub server: ServerConfig,
    pub streaming: StreamingConfig,
    pub media: MediaConfig,
    pub records: RecordsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind to
    pub host: String,
    /// TCP port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// Parses host and port into a socket address.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidBindAddress` - Host is not a valid IP address
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress {
                host: self.host.clone(),
                port: self.port,
            })
    }
}

/// Chunked body streaming configuration.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Upper bound for a single chunk read from disk
    pub chunk_size: usize,
    /// Abort a stream when one read stalls longer than this (None = wait forever)
    pub idle_read_timeout: Option<Duration>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            idle_read_timeout: None,
        }
    }
}

/// A single named media category and the directory backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    pub name: String,
    pub root: PathBuf,
    pub content_type: String,
}

impl CategoryConfig {
    /// Creates a category serving the default video content type.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    /// Overrides the content type served for files in this category.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Parses a `name=dir` pair as accepted on the command line and in
    /// `VIDSERVE_CATEGORIES`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidCategorySpec` - Missing `=`, empty name or empty directory
    pub fn parse_spec(spec: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidCategorySpec {
            spec: spec.to_string(),
        };

        let (name, dir) = spec.split_once('=').ok_or_else(invalid)?;
        let (name, dir) = (name.trim(), dir.trim());
        if name.is_empty() || dir.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(name, dir))
    }
}

/// Media category registry configuration.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Base directory the default categories live under
    pub assets_dir: PathBuf,
    /// Category name to directory mapping
    pub categories: Vec<CategoryConfig>,
    /// Require resolved files to stay inside their category directory
    pub enforce_containment: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self::with_assets_dir("assets")
    }
}

impl MediaConfig {
    /// Builds the default `housing` and `shaft` categories under `assets_dir`.
    pub fn with_assets_dir(assets_dir: impl Into<PathBuf>) -> Self {
        let assets_dir = assets_dir.into();
        let categories = ["housing", "shaft"]
            .into_iter()
            .map(|name| CategoryConfig::new(name, assets_dir.join(name)))
            .collect();

        Self {
            assets_dir,
            categories,
            enforce_containment: true,
        }
    }

    /// Looks up a configured category by name.
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Points every default category at `<assets_dir>/<name>`.
    fn rebase(&mut self, assets_dir: &Path) {
        *self = Self {
            enforce_containment: self.enforce_containment,
            ..Self::with_assets_dir(assets_dir)
        };
    }
}

/// Default freshness window for a user's calibration (24 hours).
pub const DEFAULT_CALIBRATION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Location and policy of the CSV record files.
#[derive(Debug, Clone)]
pub struct RecordsConfig {
    /// Directory holding `user_entry.csv` and the measurement files
    pub data_dir: PathBuf,
    /// Users whose last login is older than this must recalibrate
    pub calibration_window: Duration,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("logs"),
            calibration_window: DEFAULT_CALIBRATION_WINDOW,
        }
    }
}

/// Parses a boolean switch such as `1`, `true`, `yes` or `off`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl VidserveConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`VidserveConfig::from_env`] with variables read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("VIDSERVE_HOST") {
            config.server.host = host;
        }

        if let Some(port) = lookup("VIDSERVE_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.server.port = port;
        }

        if let Some(size) = lookup("VIDSERVE_CHUNK_SIZE")
            && let Ok(size) = size.parse::<usize>()
        {
            config.streaming.chunk_size = size;
        }

        if let Some(secs) = lookup("VIDSERVE_IDLE_READ_TIMEOUT_SECS")
            && let Ok(secs) = secs.parse::<u64>()
        {
            config.streaming.idle_read_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(dir) = lookup("VIDSERVE_ASSETS_DIR") {
            config.media.rebase(Path::new(&dir));
        }

        if let Some(dir) = lookup("VIDSERVE_DATA_DIR") {
            config.records.data_dir = PathBuf::from(dir);
        }

        if let Some(hours) = lookup("VIDSERVE_CALIBRATION_WINDOW_HOURS")
            && let Ok(hours) = hours.parse::<u64>()
        {
            config.records.calibration_window = Duration::from_secs(hours * 60 * 60);
        }

        if let Some(specs) = lookup("VIDSERVE_CATEGORIES") {
            let parsed: Result<Vec<_>, _> = specs
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(CategoryConfig::parse_spec)
                .collect();
            if let Ok(categories) = parsed
                && !categories.is_empty()
            {
                config.media.categories = categories;
            }
        }

        if let Some(allow) = lookup("VIDSERVE_ALLOW_OUTSIDE_ROOT")
            && let Some(allow) = parse_flag(&allow)
        {
            config.media.enforce_containment = !allow;
        }

        config
    }

    /// Checks the configuration for values the server cannot run with.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroChunkSize` - Chunk size of zero
    /// - `ConfigError::InvalidCategoryName` - Empty name or name containing `/`
    /// - `ConfigError::DuplicateCategory` - Same name configured twice
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.streaming.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }

        let mut seen = HashSet::new();
        for category in &self.media.categories {
            if category.name.is_empty() || category.name.contains('/') {
                return Err(ConfigError::InvalidCategoryName {
                    name: category.name.clone(),
                });
            }
            if !seen.insert(category.name.as_str()) {
                return Err(ConfigError::DuplicateCategory {
                    name: category.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Errors raised while building or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("invalid category name '{name}'")]
    InvalidCategoryName { name: String },

    #[error("category '{name}' configured more than once")]
    DuplicateCategory { name: String },

    #[error("invalid category spec '{spec}', expected name=dir")]
    InvalidCategorySpec { spec: String },

    #[error("invalid bind address {host}:{port}")]
    InvalidBindAddress { host: String, port: u16 },
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_categories_live_under_assets_dir() {
        let media = MediaConfig::with_assets_dir("/srv/assets");

        let names: Vec<_> = media.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["housing", "shaft"]);
        assert_eq!(
            media.category("shaft").unwrap().root,
            PathBuf::from("/srv/assets/shaft")
        );
        assert_eq!(
            media.category("housing").unwrap().content_type,
            DEFAULT_CONTENT_TYPE
        );
        assert!(media.enforce_containment);
    }

    #[test]
    fn test_default_chunk_size_is_one_mebibyte() {
        let config = VidserveConfig::default();
        assert_eq!(config.streaming.chunk_size, 1_048_576);
        assert!(config.streaming.idle_read_timeout.is_none());
    }

    #[test]
    fn test_parse_category_spec() {
        let category = CategoryConfig::parse_spec("engine = /data/engine").unwrap();
        assert_eq!(category.name, "engine");
        assert_eq!(category.root, PathBuf::from("/data/engine"));

        assert!(CategoryConfig::parse_spec("engine").is_err());
        assert!(CategoryConfig::parse_spec("=/data").is_err());
        assert!(CategoryConfig::parse_spec("engine=").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = VidserveConfig::default();
        assert!(config.validate().is_ok());

        config.streaming.chunk_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroChunkSize)));
        config.streaming.chunk_size = 16;

        config
            .media
            .categories
            .push(CategoryConfig::new("housing", "/elsewhere"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateCategory { .. })
        ));

        config.media.categories = vec![CategoryConfig::new("a/b", "/x")];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCategoryName { .. })
        ));
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_allow_outside_root_accepts_common_switches() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            let config =
                VidserveConfig::from_lookup(lookup_from(&[("VIDSERVE_ALLOW_OUTSIDE_ROOT", value)]));
            assert!(!config.media.enforce_containment, "{value}");
        }

        for value in ["0", "false", "no", "off", "maybe"] {
            let config =
                VidserveConfig::from_lookup(lookup_from(&[("VIDSERVE_ALLOW_OUTSIDE_ROOT", value)]));
            assert!(config.media.enforce_containment, "{value}");
        }
    }

    #[test]
    fn test_from_env_reads_allow_outside_root() {
        // Only this test touches the variable in this binary.
        unsafe { std::env::set_var("VIDSERVE_ALLOW_OUTSIDE_ROOT", "1") };
        let config = VidserveConfig::from_env();
        unsafe { std::env::remove_var("VIDSERVE_ALLOW_OUTSIDE_ROOT") };

        assert!(!config.media.enforce_containment);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = VidserveConfig::from_lookup(lookup_from(&[
            ("VIDSERVE_HOST", "0.0.0.0"),
            ("VIDSERVE_PORT", "9000"),
            ("VIDSERVE_CHUNK_SIZE", "4096"),
            ("VIDSERVE_IDLE_READ_TIMEOUT_SECS", "30"),
            ("VIDSERVE_ASSETS_DIR", "/srv/media"),
            ("VIDSERVE_DATA_DIR", "/srv/records"),
            ("VIDSERVE_CALIBRATION_WINDOW_HOURS", "12"),
        ]));

        assert_eq!(config.server.bind_address().unwrap().to_string(), "0.0.0.0:9000");
        assert_eq!(config.streaming.chunk_size, 4096);
        assert_eq!(config.streaming.idle_read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            config.media.category("shaft").unwrap().root,
            PathBuf::from("/srv/media/shaft")
        );
        assert_eq!(config.records.data_dir, PathBuf::from("/srv/records"));
        assert_eq!(config.records.calibration_window, Duration::from_secs(12 * 3600));
    }

    #[test]
    fn test_lookup_ignores_garbage() {
        let config = VidserveConfig::from_lookup(lookup_from(&[
            ("VIDSERVE_PORT", "eighty"),
            ("VIDSERVE_CATEGORIES", "engine"),
        ]));

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.media.categories.len(), 2);
        assert_eq!(config.records.calibration_window, DEFAULT_CALIBRATION_WINDOW);
    }

    #[test]
    fn test_bind_address() {
        let server = ServerConfig::default();
        assert_eq!(
            server.bind_address().unwrap(),
            "127.0.0.1:8000".parse().unwrap()
        );

        let server = ServerConfig {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(server.bind_address().is_err());
    }
}
