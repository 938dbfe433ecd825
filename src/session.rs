//! One viewer's working state: the loaded file, its location cache and the
//! active filters.
//!
//! The file is read once and kept until its modification time changes.
//! Each session owns its own `LocationCache`; nothing is shared globally.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDate;
use tracing::info;

use crate::config::ReportConfig;
use crate::error::{ExportError, LoadResult};
use crate::filter::Filters;
use crate::geocode::{distinct_locations, LocationCache, LocationResolver, Progress};
use crate::loader::{load_and_clean, Dataset};
use crate::output::export_records_to_path;
use crate::reports::{derive_metrics, generate_summary, StatusRules};
use crate::types::{DerivedMetrics, Record, Schema, SummaryStats};

pub struct Session {
    path: PathBuf,
    config: ReportConfig,
    modified: Option<SystemTime>,
    dataset: Dataset,
    locations: LocationCache,
    resolver: LocationResolver,
    rules: StatusRules,
    filters: Filters,
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl Session {
    /// Load `path` and resolve every distinct location in it.
    pub fn open<F>(
        path: impl Into<PathBuf>,
        config: ReportConfig,
        mut resolver: LocationResolver,
        progress: F,
    ) -> LoadResult<Self>
    where
        F: FnMut(Progress),
    {
        let path = path.into();
        let modified = modified_at(&path);
        let dataset = load_and_clean(&path, &config.columns)?;
        let locations = resolver.resolve_all(&distinct_locations(&dataset.records), progress);
        let rules = StatusRules::new(&config.status);
        Ok(Self {
            path,
            config,
            modified,
            dataset,
            locations,
            resolver,
            rules,
            filters: Filters::default(),
        })
    }

    /// Reload when the file changed on disk since it was last read.
    ///
    /// Returns `true` if the dataset and location cache were rebuilt.
    /// Filters are kept across reloads.
    pub fn refresh<F>(&mut self, progress: F) -> LoadResult<bool>
    where
        F: FnMut(Progress),
    {
        let modified = modified_at(&self.path);
        if modified.is_some() && modified == self.modified {
            return Ok(false);
        }
        let dataset = load_and_clean(&self.path, &self.config.columns)?;
        self.locations = self
            .resolver
            .resolve_all(&distinct_locations(&dataset.records), progress);
        self.dataset = dataset;
        self.modified = modified;
        info!(path = %self.path.display(), "Reloaded changed file");
        Ok(true)
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn schema(&self) -> &Schema {
        &self.dataset.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.dataset.records
    }

    pub fn locations(&self) -> &LocationCache {
        &self.locations
    }

    pub fn rules(&self) -> &StatusRules {
        &self.rules
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
    }

    /// Records passing the active filters.
    pub fn view(&self) -> Vec<&Record> {
        self.filters.apply(&self.dataset.schema, &self.dataset.records)
    }

    pub fn metrics(&self, today: NaiveDate) -> DerivedMetrics {
        derive_metrics(&self.dataset.schema, &self.view(), today, &self.rules)
    }

    pub fn summary(&self, today: NaiveDate) -> SummaryStats {
        generate_summary(self.metrics(today), &self.rules, today)
    }

    /// Export the filtered view as CSV; returns the number of rows written.
    pub fn export_view(&self, path: &Path) -> Result<usize, ExportError> {
        export_records_to_path(
            path,
            &self.dataset.schema,
            &self.view(),
            &self.config.export.column_order,
        )
    }
}
