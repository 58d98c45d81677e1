use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use dmmdiff_codec::MapLayout;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Check-run name shown on pull requests.
    pub name: String,
    pub bind_addr: SocketAddr,
    /// Public base URL used to build download links.
    pub host: String,
    /// Route prefix under which stored diff maps are served.
    pub dmm_url: String,
    pub dmm_save_path: PathBuf,
    pub webhook_path: String,
    /// HMAC secret shared with the forge. Empty disables verification.
    pub webhook_secret: String,
    pub banned_repos: Vec<String>,
    pub banned_users: Vec<String>,
    pub fetch_concurrency: usize,
    pub diff_concurrency: usize,
    pub use_gzip: bool,
    pub host_dmms: bool,
    pub fastdmm_host: Option<String>,
    pub layout: MapLayout,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "dmmdiff".into(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            host: "http://127.0.0.1:5000".into(),
            dmm_url: "/dmm".into(),
            dmm_save_path: PathBuf::from("./diffs"),
            webhook_path: "/webhook".into(),
            webhook_secret: String::new(),
            banned_repos: Vec::new(),
            banned_users: Vec::new(),
            fetch_concurrency: 4,
            diff_concurrency: 2,
            use_gzip: false,
            host_dmms: true,
            fastdmm_host: None,
            layout: MapLayout::Tgm,
        }
    }
}

impl ServerConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validated()
    }

    /// Check invariants and normalise URL-ish fields (trailing slashes
    /// removed, empty viewer host dropped).
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }

        self.host = self.host.trim_end_matches('/').to_string();
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }

        self.dmm_url = route_prefix("dmm_url", &self.dmm_url)?;
        self.webhook_path = route_prefix("webhook_path", &self.webhook_path)?;
        if self.host_dmms && self.dmm_url == self.webhook_path {
            return Err(ConfigError::Invalid(
                "dmm_url and webhook_path must differ".into(),
            ));
        }

        if self.dmm_save_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("dmm_save_path must not be empty".into()));
        }
        if self.fetch_concurrency == 0 || self.diff_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "fetch_concurrency and diff_concurrency must be at least 1".into(),
            ));
        }

        self.fastdmm_host = self
            .fastdmm_host
            .map(|h| h.trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty());
        Ok(self)
    }

    /// Create the save directory if it does not exist yet.
    pub fn prepare_save_dir(&self) -> Result<(), ConfigError> {
        if !self.dmm_save_path.exists() {
            info!(path = %self.dmm_save_path.display(), "creating diff save directory");
        }
        std::fs::create_dir_all(&self.dmm_save_path).map_err(|source| ConfigError::SaveDir {
            path: self.dmm_save_path.clone(),
            source,
        })
    }

    /// Public URL of a stored diff map.
    pub fn download_url(&self, file_name: &str) -> String {
        format!("{}{}/{}", self.host, self.dmm_url, file_name)
    }

    pub fn is_banned_repo(&self, full_name: &str) -> bool {
        self.banned_repos.iter().any(|r| r == full_name)
    }

    pub fn is_banned_user(&self, login: &str) -> bool {
        self.banned_users.iter().any(|u| u == login)
    }
}

fn route_prefix(field: &str, value: &str) -> Result<String, ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must start with a slash")));
    }
    let trimmed = value.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be the root path")));
    }
    Ok(trimmed.to_string())
}
