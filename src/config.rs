//! Report configuration loaded from an optional TOML file.
//!
//! Every section has defaults, so an empty or missing file yields the
//! settings the ombudsman spreadsheet uses out of the box.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;
use crate::types::Coordinate;

/// Default coordinate for locations the geocoder cannot resolve (Jakarta).
pub const FALLBACK_COORDINATE: Coordinate = Coordinate {
    lat: -6.2088,
    lon: 106.8456,
};

/// Default number of days after which an open case counts as overdue.
pub const DEFAULT_OVERDUE_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub columns: ColumnConfig,
    pub status: StatusConfig,
    pub geocoder: GeocoderConfig,
    pub export: ExportConfig,
}

impl ReportConfig {
    /// Load config from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Header names recognised for each known field, matched case-insensitively.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub id: Vec<String>,
    pub entity: Vec<String>,
    pub category: Vec<String>,
    pub status: Vec<String>,
    pub location: Vec<String>,
    pub handler: Vec<String>,
    /// Exact report-date headers, checked before `date_tokens`.
    pub report_date: Vec<String>,
    /// Otherwise any header containing one of these tokens is taken as the report date.
    pub date_tokens: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            id: strings(&["No", "ID", "Nomor Laporan"]),
            entity: strings(&["Terlapor"]),
            category: strings(&["Maladministrasi"]),
            status: strings(&["Status"]),
            location: strings(&["Lokasi", "Lokasi Kejadian"]),
            handler: strings(&["PVL", "Asisten", "Pemeriksa"]),
            report_date: strings(&["Tanggal Laporan", "Tanggal Pelaporan", "Tanggal Masuk"]),
            date_tokens: strings(&["tanggal", "tgl", "date"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Substrings (case-insensitive) marking a status as closed.
    pub closed_markers: Vec<String>,
    pub overdue_threshold_days: i64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            closed_markers: strings(&["selesai", "tutup"]),
            overdue_threshold_days: DEFAULT_OVERDUE_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub country_suffix: String,
    pub min_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub fallback_lat: f64,
    pub fallback_lon: f64,
}

impl GeocoderConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fallback(&self) -> Coordinate {
        Coordinate {
            lat: self.fallback_lat,
            lon: self.fallback_lon,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            country_suffix: ", Indonesia".to_string(),
            min_delay_ms: 1000,
            timeout_secs: 10,
            user_agent: "land_dispute_report/0.1 (ombudsman dashboard)".to_string(),
            fallback_lat: FALLBACK_COORDINATE.lat,
            fallback_lon: FALLBACK_COORDINATE.lon,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Preferred leading columns of the CSV export, when present.
    pub column_order: Vec<String>,
    pub file_name: String,
    pub top_n: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            column_order: strings(&[
                "No",
                "Tanggal Laporan",
                "Terlapor",
                "Maladministrasi",
                "Status",
                "Lokasi",
                "PVL",
            ]),
            file_name: "rekap_laporan_pertanahan_filtered.csv".to_string(),
            top_n: 5,
        }
    }
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}
