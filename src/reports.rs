use crate::config::StatusConfig;
use crate::geocode::{LocationCache, Resolution};
use crate::types::{
    Assessment, CategoryShareRow, DerivedMetrics, EntityCountRow, MapPoint, Record, Schema,
    StatusCountRow, SummaryStats, TrendRow,
};
use crate::util::{contains_any_ci, days_diff, format_int, format_number, percentage};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Placeholder for the top entity when there is nothing to rank.
pub const NO_ENTITY: &str = "-";

/// Decides whether a status string means the case is closed.
#[derive(Debug, Clone)]
pub struct StatusRules {
    closed_markers: Vec<String>,
    overdue_threshold_days: i64,
}

impl StatusRules {
    pub fn new(config: &StatusConfig) -> Self {
        Self {
            closed_markers: config
                .closed_markers
                .iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            overdue_threshold_days: config.overdue_threshold_days,
        }
    }

    pub fn is_closed(&self, record: &Record) -> bool {
        record
            .status
            .as_deref()
            .is_some_and(|s| contains_any_ci(s, &self.closed_markers))
    }

    /// Open and reported more than the threshold number of days before `today`.
    pub fn is_overdue(&self, record: &Record, today: NaiveDate) -> bool {
        match record.report_date {
            Some(date) => {
                days_diff(date, today) > self.overdue_threshold_days && !self.is_closed(record)
            }
            None => false,
        }
    }

    pub fn overdue_threshold_days(&self) -> i64 {
        self.overdue_threshold_days
    }
}

impl Default for StatusRules {
    fn default() -> Self {
        Self::new(&StatusConfig::default())
    }
}

/// Counts of each value in first-encounter order.
fn count_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for v in values {
        match index.get(v) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(v, counts.len());
                counts.push((v, 1));
            }
        }
    }
    counts
}

/// Counts sorted by descending count; ties keep first-encounter order.
fn ranked<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts = count_in_order(values);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn derive_metrics(
    schema: &Schema,
    records: &[&Record],
    today: NaiveDate,
    rules: &StatusRules,
) -> DerivedMetrics {
    let total = records.len();
    let closed = if schema.has_status() {
        records.iter().filter(|r| rules.is_closed(r)).count()
    } else {
        0
    };
    let open = total - closed;

    let distinct_categories = if schema.has_category() {
        records
            .iter()
            .filter_map(|r| r.category.as_deref())
            .collect::<HashSet<_>>()
            .len()
    } else {
        0
    };

    let overdue = if schema.has_status() && schema.has_dates() {
        records
            .iter()
            .filter(|r| rules.is_overdue(r, today))
            .count()
    } else {
        0
    };

    let trend = if schema.has_dates() {
        generate_trend(records)
    } else {
        Vec::new()
    };

    let top_reported_entity = if schema.has_entity() {
        ranked(records.iter().filter_map(|r| r.entity.as_deref()))
            .first()
            .map(|(e, _)| e.to_string())
            .unwrap_or_else(|| NO_ENTITY.to_string())
    } else {
        NO_ENTITY.to_string()
    };

    DerivedMetrics {
        total,
        closed,
        open,
        completion_rate: percentage(closed, total),
        distinct_categories,
        overdue,
        trend,
        top_reported_entity,
    }
}

/// Monthly case counts, oldest month first. Undated records are skipped.
pub fn generate_trend(records: &[&Record]) -> Vec<TrendRow> {
    let mut buckets: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for d in records.iter().filter_map(|r| r.report_date) {
        *buckets.entry((d.year(), d.month())).or_insert(0) += 1;
    }
    buckets
        .into_iter()
        .map(|((y, m), count)| TrendRow {
            month: format!("{:04}-{:02}", y, m),
            count,
        })
        .collect()
}

pub fn assess(completion_rate: f64) -> Assessment {
    if completion_rate > 80.0 {
        Assessment::VeryGood
    } else if completion_rate > 50.0 {
        Assessment::Adequate
    } else {
        Assessment::NeedsAttention
    }
}

/// One-paragraph reading of the metrics for the dashboard header.
pub fn narrative(metrics: &DerivedMetrics, rules: &StatusRules) -> String {
    if metrics.total == 0 {
        return "No reports match the current filters.".to_string();
    }
    let mut text = format!(
        "Of {} reports, {} ({}%) are resolved; completion is {}.",
        format_int(metrics.total),
        format_int(metrics.closed),
        format_number(metrics.completion_rate, 1),
        assess(metrics.completion_rate).label()
    );
    if metrics.overdue > 0 {
        let cases = if metrics.overdue == 1 {
            "open case has"
        } else {
            "open cases have"
        };
        text.push_str(&format!(
            " {} {} been pending for more than {} days.",
            format_int(metrics.overdue),
            cases,
            rules.overdue_threshold_days()
        ));
    }
    if metrics.top_reported_entity != NO_ENTITY {
        text.push_str(&format!(
            " Most reported: {}.",
            metrics.top_reported_entity
        ));
    }
    text
}

pub fn generate_summary(
    metrics: DerivedMetrics,
    rules: &StatusRules,
    today: NaiveDate,
) -> SummaryStats {
    SummaryStats {
        assessment: assess(metrics.completion_rate),
        narrative: narrative(&metrics, rules),
        as_of: today,
        metrics,
    }
}

pub fn generate_top_entities(records: &[&Record], n: usize) -> Vec<EntityCountRow> {
    ranked(records.iter().filter_map(|r| r.entity.as_deref()))
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(idx, (entity, count))| EntityCountRow {
            rank: idx + 1,
            entity: entity.to_string(),
            count,
        })
        .collect()
}

/// Share of each category within the view, largest first.
///
/// Percentages are of records with a category, matching a pie chart.
pub fn generate_category_distribution(records: &[&Record]) -> Vec<CategoryShareRow> {
    let counts = ranked(records.iter().filter_map(|r| r.category.as_deref()));
    let categorized: usize = counts.iter().map(|(_, c)| c).sum();
    counts
        .into_iter()
        .map(|(category, count)| CategoryShareRow {
            category: category.to_string(),
            count,
            share_pct: format_number(percentage(count, categorized), 1),
        })
        .collect()
}

pub fn generate_status_breakdown(records: &[&Record], rules: &StatusRules) -> Vec<StatusCountRow> {
    ranked(records.iter().filter_map(|r| r.status.as_deref()))
        .into_iter()
        .map(|(status, count)| StatusCountRow {
            status: status.to_string(),
            count,
            closed: contains_any_ci(status, &rules.closed_markers),
        })
        .collect()
}

/// Case counts per location with the coordinate resolved for it.
pub fn generate_map_points(
    records: &[&Record],
    cache: &LocationCache,
    rules: &StatusRules,
) -> Vec<MapPoint> {
    let mut open: HashMap<&str, usize> = HashMap::new();
    for r in records {
        if let Some(loc) = r.location.as_deref() {
            if !rules.is_closed(r) {
                *open.entry(loc).or_insert(0) += 1;
            }
        }
    }
    ranked(records.iter().filter_map(|r| r.location.as_deref()))
        .into_iter()
        .map(|(location, cases)| {
            let coord = cache.get(location);
            let fallback = cache
                .entry(location)
                .map_or(true, |e| e.resolution == Resolution::Fallback);
            MapPoint {
                location: location.to_string(),
                lat: coord.lat,
                lon: coord.lon,
                cases,
                open: open.get(location).copied().unwrap_or(0),
                fallback,
            }
        })
        .collect()
}
