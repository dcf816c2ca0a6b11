use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::ZoneDataConfig;
use crate::domain::{ZoneFeature, ZoneId};
use crate::error::ZoneError;
use crate::geojson::parse_zone_collection;

const USER_AGENT: &str = concat!("zonemap/", env!("CARGO_PKG_VERSION"));

/// Where per-zone geometry comes from.
///
/// Implementations block until the zone is retrieved; the layer cache runs
/// them off the owning thread, so they must be shareable across threads.
pub trait GeometrySource: Send + Sync {
    fn fetch_zone(&self, zone: ZoneId) -> Result<Vec<ZoneFeature>, ZoneError>;
}

fn zone_file_name(zone: ZoneId) -> String {
    format!("zone_{}.geojson", zone)
}

/// Fetches `<base_url>/<tier>/zone_<id>.geojson` over HTTP.
pub struct HttpGeometrySource {
    client: reqwest::blocking::Client,
    base_url: String,
    tier: String,
}

impl HttpGeometrySource {
    pub fn new(base_url: &str, tier: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tier: tier.to_string(),
        })
    }

    pub fn zone_url(&self, zone: ZoneId) -> String {
        format!("{}/{}/{}", self.base_url, self.tier, zone_file_name(zone))
    }
}

impl GeometrySource for HttpGeometrySource {
    fn fetch_zone(&self, zone: ZoneId) -> Result<Vec<ZoneFeature>, ZoneError> {
        let url = self.zone_url(zone);
        debug!(zone = %zone, url = %url, "Fetching zone geometry");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ZoneError::fetch(zone, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ZoneError::fetch(
                zone,
                format!("HTTP {}: Failed to load zone {}", status.as_u16(), zone),
            ));
        }

        let body = response
            .text()
            .map_err(|e| ZoneError::fetch(zone, format!("Failed to read response: {}", e)))?;

        parse_zone_collection(zone, &body)
    }
}

/// Reads the same `<tier>/zone_<id>.geojson` layout from a local directory.
pub struct DirGeometrySource {
    root: PathBuf,
    tier: String,
}

impl DirGeometrySource {
    pub fn new(root: impl Into<PathBuf>, tier: &str) -> Self {
        Self {
            root: root.into(),
            tier: tier.to_string(),
        }
    }

    pub fn zone_path(&self, zone: ZoneId) -> PathBuf {
        self.root.join(&self.tier).join(zone_file_name(zone))
    }
}

impl GeometrySource for DirGeometrySource {
    fn fetch_zone(&self, zone: ZoneId) -> Result<Vec<ZoneFeature>, ZoneError> {
        let path = self.zone_path(zone);
        debug!(zone = %zone, path = %path.display(), "Reading zone geometry");

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| ZoneError::fetch(zone, format!("{}: {}", path.display(), e)))?;

        parse_zone_collection(zone, &contents)
    }
}

/// Build the source named by the config: an `http(s)://` base is fetched
/// remotely, anything else is treated as a directory.
pub fn source_for(config: &ZoneDataConfig) -> Result<Box<dyn GeometrySource>, reqwest::Error> {
    if config.base.starts_with("http://") || config.base.starts_with("https://") {
        let source = HttpGeometrySource::new(
            &config.base,
            &config.tier,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Box::new(source))
    } else {
        Ok(Box::new(DirGeometrySource::new(&config.base, &config.tier)))
    }
}
