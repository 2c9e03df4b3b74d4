use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_media_root")]
    pub media_root: String,

    #[serde(default = "default_media_url")]
    pub media_url: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    jwt_secret: Option<String>,
    database_url: Option<String>,
    listen_addr: Option<String>,
    media_root: Option<String>,
    media_url: Option<String>,
    log_dir: Option<String>,
    max_upload_bytes: Option<usize>,
}

fn default_database_url() -> String {
    "sqlite://recipes.db?mode=rwc".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_media_root() -> String {
    "media".to_string()
}

fn default_media_url() -> String {
    "/media".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) => read_file_config(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn merge(env_config: PartialServerConfig, file_config: PartialServerConfig) -> Result<Self, String> {
        let final_config = ServerConfig {
            jwt_secret: env_config
                .jwt_secret
                .or(file_config.jwt_secret)
                .filter(|secret| !secret.is_empty())
                .ok_or("JWT_SECRET is required")?,
            database_url: env_config
                .database_url
                .or(file_config.database_url)
                .unwrap_or_else(default_database_url),
            listen_addr: env_config
                .listen_addr
                .or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            media_root: env_config
                .media_root
                .or(file_config.media_root)
                .unwrap_or_else(default_media_root),
            media_url: env_config
                .media_url
                .or(file_config.media_url)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(default_media_url),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            max_upload_bytes: env_config
                .max_upload_bytes
                .or(file_config.max_upload_bytes)
                .unwrap_or_else(default_max_upload_bytes),
        };

        Ok(final_config)
    }

    /// Config with defaults everywhere except the secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        ServerConfig {
            jwt_secret: jwt_secret.into(),
            database_url: default_database_url(),
            listen_addr: default_listen_addr(),
            media_root: default_media_root(),
            media_url: default_media_url(),
            log_dir: default_log_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn read_file_config(path: &Path) -> Result<PartialServerConfig, String> {
    if !path.exists() {
        return Ok(PartialServerConfig::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
    toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_values_fill_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "jwt_secret = \"from-file\"\nmedia_url = \"/static/media/\"\nmax_upload_bytes = 2048"
        )
        .unwrap();

        let file_config = read_file_config(file.path()).unwrap();
        let config = ServerConfig::merge(PartialServerConfig::default(), file_config).unwrap();

        assert_eq!(config.jwt_secret, "from-file");
        assert_eq!(config.media_url, "/static/media");
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.media_root, "media");
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
    }

    #[test]
    fn test_env_overrides_file() {
        let file_config = PartialServerConfig {
            jwt_secret: Some("file-secret".to_string()),
            database_url: Some("sqlite://file.db".to_string()),
            ..Default::default()
        };
        let env_config = PartialServerConfig {
            jwt_secret: Some("env-secret".to_string()),
            ..Default::default()
        };

        let config = ServerConfig::merge(env_config, file_config).unwrap();
        assert_eq!(config.jwt_secret, "env-secret");
        assert_eq!(config.database_url, "sqlite://file.db");
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let result = ServerConfig::merge(PartialServerConfig::default(), PartialServerConfig::default());
        assert_eq!(result.unwrap_err(), "JWT_SECRET is required");
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let config = read_file_config(Path::new("/nonexistent/recipe-server.toml")).unwrap();
        assert!(config.jwt_secret.is_none());
    }
}
