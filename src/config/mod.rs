use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub hierarchy: HierarchyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

/// Bounds for tree reads and nested creates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    pub max_depth: usize,
    pub max_nodes: usize,
    pub fetch_page_size: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Invalid config file {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}

impl AppConfig {
    /// Presets for APP_ENV, then env var overrides, then the YAML file.
    ///
    /// A file named by PORTAL_CONFIG must load; a failure is returned. The
    /// implicit ./config.yml is skipped with a warning when it is broken.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var("PORTAL_CONFIG").ok().map(PathBuf::from);
        Self::from_env_vars().with_config_file(explicit, Path::new("config.yml"))
    }

    /// Lenient variant of `load` for callers that never ran `init`
    pub fn from_env() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Ignoring config file: {}", e);
            Self::from_env_vars()
        })
    }

    fn from_env_vars() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_config_file(self, explicit: Option<PathBuf>, fallback: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return self.with_file_overrides(&path);
        }
        if !fallback.exists() {
            return Ok(self);
        }
        match self.clone().with_file_overrides(fallback) {
            Ok(merged) => Ok(merged),
            Err(e) => {
                tracing::warn!("Ignoring config file: {}", e);
                Ok(self)
            }
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Ok(v) = env::var("PORTAL_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Hierarchy overrides
        if let Ok(v) = env::var("HIERARCHY_MAX_DEPTH") {
            self.hierarchy.max_depth = v.parse().unwrap_or(self.hierarchy.max_depth);
        }
        if let Ok(v) = env::var("HIERARCHY_MAX_NODES") {
            self.hierarchy.max_nodes = v.parse().unwrap_or(self.hierarchy.max_nodes);
        }
        if let Ok(v) = env::var("HIERARCHY_FETCH_PAGE_SIZE") {
            self.hierarchy.fetch_page_size = v.parse().unwrap_or(self.hierarchy.fetch_page_size);
        }

        self
    }

    /// Overlay a YAML file onto this config. Keys absent from the file keep
    /// their current values.
    pub fn with_file_overrides(self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        self.with_yaml_overrides(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    fn with_yaml_overrides(self, text: &str) -> Result<Self, serde_yaml::Error> {
        let mut base = serde_yaml::to_value(&self)?;
        let overlay: serde_yaml::Value = serde_yaml::from_str(text)?;
        merge_yaml(&mut base, overlay);
        serde_yaml::from_value(base)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 50 * 1024 * 1024, // 50MB
            },
            security: SecurityConfig {
                jwt_secret: "portal-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            hierarchy: HierarchyConfig {
                max_depth: 16,
                max_nodes: 1000,
                fetch_page_size: 10_000,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 50 * 1024 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            hierarchy: HierarchyConfig {
                max_depth: 16,
                max_nodes: 1000,
                fetch_page_size: 10_000,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                enable_cors: true,
                cors_origins: vec!["https://portal.example.com".to_string()],
            },
            hierarchy: HierarchyConfig {
                max_depth: 8,
                max_nodes: 500,
                fetch_page_size: 5_000,
            },
        }
    }
}

/// Recursively merge `overlay` mappings into `base`; non-mapping values replace
fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// Global singleton config - initialized once at startup
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// Load the global config, failing on an unusable PORTAL_CONFIG file
pub fn init() -> Result<&'static AppConfig, ConfigError> {
    CONFIG.get_or_try_init(AppConfig::load)
}

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::from_env)
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::config().environment, $crate::config::Environment::Production)
    };
}
