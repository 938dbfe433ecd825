//! Land-dispute complaint reporting.
//!
//! Loads an ombudsman unit's complaint spreadsheet (exported as CSV),
//! geocodes reported locations, applies viewer filters and derives the
//! dashboard metrics: completion rate, overdue ("mangkrak") cases,
//! monthly trend and the most reported institutions.

pub mod config;
pub mod error;
pub mod filter;
pub mod geocode;
pub mod loader;
pub mod output;
pub mod reports;
pub mod session;
pub mod types;
pub mod util;

pub use config::ReportConfig;
pub use error::{ConfigError, ExportError, LoadError, LookupError};
pub use filter::Filters;
pub use geocode::{Geocoder, LocationCache, LocationResolver};
pub use session::Session;
pub use types::{Coordinate, DerivedMetrics, Record, Schema};
