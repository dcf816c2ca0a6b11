use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}
fn default_user_agent() -> String {
    concat!("zonemap/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_country_codes() -> String {
    "us".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_zone_base() -> String {
    "data/geojson".to_string()
}
fn default_tier() -> String {
    "balanced".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub zones: ZoneDataConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_country_codes")]
    pub country_codes: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            url: default_geocoder_url(),
            user_agent: default_user_agent(),
            country_codes: default_country_codes(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Location of the per-zone GeoJSON files: `<base>/<tier>/zone_<id>.geojson`.
#[derive(Debug, Deserialize, Clone)]
pub struct ZoneDataConfig {
    /// Directory path or `http(s)://` URL
    #[serde(default = "default_zone_base")]
    pub base: String,
    /// Simplification tier, e.g. "balanced" or "original"
    #[serde(default = "default_tier")]
    pub tier: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ZoneDataConfig {
    fn default() -> Self {
        Self {
            base: default_zone_base(),
            tier: default_tier(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FileConfig {
    /// Load from an explicit path; a missing or malformed file is an error.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Search the usual locations and return the first config that parses.
    pub fn load() -> Option<Self> {
        for path in get_config_paths() {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    }
                }
            }
        }
        None
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("zonemap.toml"));
    paths.push(PathBuf::from(".zonemap.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("zonemap").join("config.toml"));
        paths.push(config_dir.join("zonemap.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".zonemap.toml"));
        paths.push(home.join(".config").join("zonemap").join("config.toml"));
    }

    paths
}
