use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// USDA plant hardiness half-step band.
///
/// Variants are declared coldest to warmest; the declaration order is the
/// search order used by the resolver and the tie-break when zone data overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ZoneId {
    Z3a,
    Z3b,
    Z4a,
    Z4b,
    Z5a,
    Z5b,
    Z6a,
    Z6b,
    Z7a,
    Z7b,
    Z8a,
    Z8b,
    Z9a,
    Z9b,
    Z10a,
    Z10b,
    Z11a,
    Z11b,
    Z12a,
}

impl ZoneId {
    pub const COUNT: usize = 19;

    /// All zones, coldest first.
    pub const ALL: [ZoneId; ZoneId::COUNT] = [
        ZoneId::Z3a,
        ZoneId::Z3b,
        ZoneId::Z4a,
        ZoneId::Z4b,
        ZoneId::Z5a,
        ZoneId::Z5b,
        ZoneId::Z6a,
        ZoneId::Z6b,
        ZoneId::Z7a,
        ZoneId::Z7b,
        ZoneId::Z8a,
        ZoneId::Z8b,
        ZoneId::Z9a,
        ZoneId::Z9b,
        ZoneId::Z10a,
        ZoneId::Z10b,
        ZoneId::Z11a,
        ZoneId::Z11b,
        ZoneId::Z12a,
    ];

    /// Dense index in `0..COUNT`, following `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Token used in file names and GeoJSON properties, e.g. `"10b"`.
    pub fn as_str(self) -> &'static str {
        self.info().token
    }

    pub fn info(self) -> &'static ZoneInfo {
        &ZONE_TABLE[self.index()]
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownZone(pub String);

impl fmt::Display for UnknownZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown hardiness zone: {:?}", self.0)
    }
}

impl std::error::Error for UnknownZone {}

impl FromStr for ZoneId {
    type Err = UnknownZone;

    /// Accepts `"6a"`, `"6A"` and `"zone_6a"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let token = trimmed
            .strip_prefix("zone_")
            .unwrap_or(trimmed)
            .to_ascii_lowercase();
        ZoneId::ALL
            .into_iter()
            .find(|zone| zone.as_str() == token)
            .ok_or_else(|| UnknownZone(s.to_string()))
    }
}

impl TryFrom<String> for ZoneId {
    type Error = UnknownZone;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ZoneId> for String {
    fn from(zone: ZoneId) -> Self {
        zone.as_str().to_string()
    }
}

/// Display metadata for a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneInfo {
    pub token: &'static str,
    /// Minimum winter temperature band in °F, e.g. `"-10 to -5"`.
    pub temperature_range: &'static str,
    /// Fill color as a hex string.
    pub color: &'static str,
}

impl ZoneInfo {
    /// Legend title, e.g. `"6a: -10 to -5°F"`.
    pub fn title(&self) -> String {
        format!("{}: {}°F", self.token, self.temperature_range)
    }
}

const fn info(token: &'static str, temperature_range: &'static str, color: &'static str) -> ZoneInfo {
    ZoneInfo {
        token,
        temperature_range,
        color,
    }
}

// Blue for the coldest bands through green to red for the warmest.
static ZONE_TABLE: [ZoneInfo; ZoneId::COUNT] = [
    info("3a", "-40 to -35", "#0D47A1"),
    info("3b", "-35 to -30", "#1565C0"),
    info("4a", "-30 to -25", "#1976D2"),
    info("4b", "-25 to -20", "#1E88E5"),
    info("5a", "-20 to -15", "#2196F3"),
    info("5b", "-15 to -10", "#42A5F5"),
    info("6a", "-10 to -5", "#64B5F6"),
    info("6b", "-5 to 0", "#81C784"),
    info("7a", "0 to 5", "#66BB6A"),
    info("7b", "5 to 10", "#4CAF50"),
    info("8a", "10 to 15", "#8BC34A"),
    info("8b", "15 to 20", "#CDDC39"),
    info("9a", "20 to 25", "#FFEB3B"),
    info("9b", "25 to 30", "#FFC107"),
    info("10a", "30 to 35", "#FF9800"),
    info("10b", "35 to 40", "#FF7043"),
    info("11a", "40 to 45", "#F44336"),
    info("11b", "45 to 50", "#E53935"),
    info("12a", "50 to 60", "#D32F2F"),
];
