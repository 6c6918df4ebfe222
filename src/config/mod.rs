use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub items: ItemsConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. When absent the in-memory store is used.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub max_request_size_bytes: usize,
    pub default_page_limit: u32,
    pub max_page_limit: Option<u32>,
    pub search_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
    pub cors_origins: Vec<String>,
    pub secure_cookies: bool,
    /// Callers allowed to verify items. Empty means any authenticated caller.
    pub verifier_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsConfig {
    pub allow_self_claim: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaProvider {
    Cloudinary,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub provider: MediaProvider,
    pub cloud_name: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    pub items_folder: String,
    pub profiles_folder: String,
    pub covers_folder: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingJwtSecret,

    #[error("Cloudinary media provider requires {0}")]
    MissingMediaCredential(&'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

const DEVELOPMENT_JWT_SECRET: &str = "foundit-development-secret";

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests can inject values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Some(v) = lookup("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = lookup("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Some(v) = lookup("API_DEFAULT_PAGE_LIMIT") {
            self.api.default_page_limit = v.parse().unwrap_or(self.api.default_page_limit);
        }
        if let Some(v) = lookup("API_MAX_PAGE_LIMIT") {
            self.api.max_page_limit = v.parse().ok();
        }
        if let Some(v) = lookup("API_SEARCH_LIMIT") {
            self.api.search_limit = v.parse().unwrap_or(self.api.search_limit);
        }

        // Security overrides
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = lookup("SECURITY_SESSION_TTL_MINUTES") {
            self.security.session_ttl_minutes = v.parse().unwrap_or(self.security.session_ttl_minutes);
        }
        if let Some(v) = lookup("SECURITY_RESET_TTL_MINUTES") {
            self.security.reset_ttl_minutes = v.parse().unwrap_or(self.security.reset_ttl_minutes);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Some(v) = lookup("FRONTEND_URL") {
            if !self.security.cors_origins.contains(&v) {
                self.security.cors_origins.insert(0, v);
            }
        }
        if let Some(v) = lookup("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }
        if let Some(v) = lookup("SECURITY_VERIFIER_IDS") {
            self.security.verifier_ids = split_list(&v)
                .iter()
                .filter_map(|id| match Uuid::parse_str(id) {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::warn!("Ignoring malformed verifier id '{}'", id);
                        None
                    }
                })
                .collect();
        }

        // Item workflow overrides
        if let Some(v) = lookup("ITEMS_ALLOW_SELF_CLAIM") {
            self.items.allow_self_claim = v.parse().unwrap_or(self.items.allow_self_claim);
        }

        // Media overrides
        if let Some(v) = lookup("MEDIA_PROVIDER") {
            match v.to_ascii_lowercase().as_str() {
                "cloudinary" => self.media.provider = MediaProvider::Cloudinary,
                "memory" => self.media.provider = MediaProvider::Memory,
                other => tracing::warn!("Unknown MEDIA_PROVIDER '{}', keeping {:?}", other, self.media.provider),
            }
        }
        if let Some(v) = lookup("CLOUDINARY_CLOUD_NAME") {
            self.media.cloud_name = v;
        }
        if let Some(v) = lookup("CLOUDINARY_API_KEY") {
            self.media.api_key = v;
        }
        if let Some(v) = lookup("CLOUDINARY_API_SECRET") {
            self.media.api_secret = v;
        }
        if let Some(v) = lookup("MEDIA_ITEMS_FOLDER") {
            self.media.items_folder = v;
        }
        if let Some(v) = lookup("MEDIA_PROFILES_FOLDER") {
            self.media.profiles_folder = v;
        }
        if let Some(v) = lookup("MEDIA_COVERS_FOLDER") {
            self.media.covers_folder = v;
        }

        self
    }

    /// Checks the settings that cannot be defaulted safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.security.jwt_secret == DEVELOPMENT_JWT_SECRET && !self.is_development() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.security.session_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "SECURITY_SESSION_TTL_MINUTES",
                value: self.security.session_ttl_minutes.to_string(),
            });
        }
        if self.security.reset_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "SECURITY_RESET_TTL_MINUTES",
                value: self.security.reset_ttl_minutes.to_string(),
            });
        }
        if self.api.default_page_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "API_DEFAULT_PAGE_LIMIT",
                value: "0".to_string(),
            });
        }
        if self.media.provider == MediaProvider::Cloudinary {
            if self.media.cloud_name.is_empty() {
                return Err(ConfigError::MissingMediaCredential("CLOUDINARY_CLOUD_NAME"));
            }
            if self.media.api_key.is_empty() {
                return Err(ConfigError::MissingMediaCredential("CLOUDINARY_API_KEY"));
            }
            if self.media.api_secret.is_empty() {
                return Err(ConfigError::MissingMediaCredential("CLOUDINARY_API_SECRET"));
            }
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        matches!(self.environment, Environment::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                max_request_size_bytes: 30 * 1024 * 1024, // 5 images of 5MB plus form fields
                default_page_limit: 20,
                max_page_limit: Some(1000),
                search_limit: 50,
            },
            security: SecurityConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                session_ttl_minutes: 60,
                reset_ttl_minutes: 60,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                secure_cookies: false,
                verifier_ids: Vec::new(),
            },
            items: ItemsConfig {
                allow_self_claim: true,
            },
            media: MediaConfig {
                provider: MediaProvider::Memory,
                ..MediaConfig::default_folders()
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                max_request_size_bytes: 30 * 1024 * 1024,
                default_page_limit: 20,
                max_page_limit: Some(500),
                search_limit: 50,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_ttl_minutes: 60,
                reset_ttl_minutes: 60,
                cors_origins: vec!["https://staging.foundit.example.com".to_string()],
                secure_cookies: true,
                verifier_ids: Vec::new(),
            },
            items: ItemsConfig {
                allow_self_claim: true,
            },
            media: MediaConfig {
                provider: MediaProvider::Cloudinary,
                ..MediaConfig::default_folders()
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                max_request_size_bytes: 30 * 1024 * 1024,
                default_page_limit: 20,
                max_page_limit: Some(100),
                search_limit: 50,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_ttl_minutes: 60,
                reset_ttl_minutes: 60,
                cors_origins: vec!["https://foundit-again.vercel.app".to_string()],
                secure_cookies: true,
                verifier_ids: Vec::new(),
            },
            items: ItemsConfig {
                allow_self_claim: true,
            },
            media: MediaConfig {
                provider: MediaProvider::Cloudinary,
                ..MediaConfig::default_folders()
            },
        }
    }
}

impl MediaConfig {
    fn default_folders() -> Self {
        Self {
            provider: MediaProvider::Memory,
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            items_folder: "findit/items".to_string(),
            profiles_folder: "findit/profiles".to_string(),
            covers_folder: "findit/covers".to_string(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
