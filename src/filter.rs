//! Viewer filters over the loaded records.
//!
//! Filtering never mutates the dataset; it yields borrowed views. All
//! active filters combine with logical AND.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::warn;

use crate::types::{Field, Record, Schema};

/// "All" sentinel of the entity selector.
pub const ALL_ENTITIES: &str = "Semua Instansi";
/// "All" sentinel of the status selector.
pub const ALL_STATUSES: &str = "Semua Status";
/// "All" sentinel of the handler selector.
pub const ALL_HANDLERS: &str = "Semua PVL";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub entity: Option<String>,
    pub statuses: Vec<String>,
    pub handler: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl Filters {
    /// Set the entity selection; the "all" sentinel clears it.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = selection(entity.into(), ALL_ENTITIES);
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = selection(handler.into(), ALL_HANDLERS);
        self
    }

    pub fn with_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        let q = query.into();
        self.search = if q.trim().is_empty() {
            None
        } else {
            Some(q.trim().to_string())
        };
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entity.is_none()
            && self.status_selection().is_none()
            && self.handler.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.search.is_none()
    }

    /// Active status selection, or `None` when every status passes.
    fn status_selection(&self) -> Option<&[String]> {
        if self.statuses.is_empty() || self.statuses.iter().any(|s| s == ALL_STATUSES) {
            None
        } else {
            Some(&self.statuses)
        }
    }

    /// Filters that target columns the file does not have.
    pub fn ignored_fields(&self, schema: &Schema) -> Vec<Field> {
        let mut ignored = Vec::new();
        if self.entity.is_some() && !schema.has_entity() {
            ignored.push(Field::Entity);
        }
        if self.status_selection().is_some() && !schema.has_status() {
            ignored.push(Field::Status);
        }
        if self.handler.is_some() && !schema.has(Field::Handler) {
            ignored.push(Field::Handler);
        }
        if (self.date_from.is_some() || self.date_to.is_some()) && !schema.has_dates() {
            ignored.push(Field::ReportDate);
        }
        ignored
    }

    pub fn matches(&self, schema: &Schema, record: &Record) -> bool {
        if let Some(entity) = &self.entity {
            if schema.has_entity() && record.entity.as_deref() != Some(entity.as_str()) {
                return false;
            }
        }
        if let Some(statuses) = self.status_selection() {
            if schema.has_status() {
                let status = record.status.as_deref().unwrap_or("");
                if !statuses.iter().any(|s| s == status) {
                    return false;
                }
            }
        }
        if let Some(handler) = &self.handler {
            if schema.has(Field::Handler) && record.handler.as_deref() != Some(handler.as_str()) {
                return false;
            }
        }
        if schema.has_dates() && (self.date_from.is_some() || self.date_to.is_some()) {
            let Some(date) = record.report_date else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }
        if let Some(query) = &self.search {
            let query = query.to_lowercase();
            if !record
                .values
                .iter()
                .any(|v| v.to_lowercase().contains(&query))
            {
                return false;
            }
        }
        true
    }

    /// Records passing every active filter, in source order.
    pub fn apply<'a>(&self, schema: &Schema, records: &'a [Record]) -> Vec<&'a Record> {
        let ignored = self.ignored_fields(schema);
        if !ignored.is_empty() {
            warn!(
                "Ignoring filters on missing columns: {}",
                ignored
                    .iter()
                    .map(|f| f.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        records.iter().filter(|r| self.matches(schema, r)).collect()
    }
}

fn selection(value: String, all: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v == all {
        None
    } else {
        Some(v.to_string())
    }
}

/// Sorted distinct non-empty values of `field`, for selector menus.
pub fn options_for(records: &[Record], field: Field) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.text(field))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
