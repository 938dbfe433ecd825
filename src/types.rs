use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// The known fields of a complaint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Entity,
    Category,
    Status,
    ReportDate,
    Location,
    Handler,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Id,
        Field::Entity,
        Field::Category,
        Field::Status,
        Field::ReportDate,
        Field::Location,
        Field::Handler,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Entity => "Terlapor",
            Field::Category => "Maladministrasi",
            Field::Status => "Status",
            Field::ReportDate => "Tanggal Laporan",
            Field::Location => "Lokasi",
            Field::Handler => "PVL",
        }
    }
}

/// Column layout of a loaded file, detected once from the header row.
///
/// Each known field maps to the index of its column, or `None` when the
/// file has no such column. Features depending on an absent column are
/// disabled rather than failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub headers: Vec<String>,
    pub id: Option<usize>,
    pub entity: Option<usize>,
    pub category: Option<usize>,
    pub status: Option<usize>,
    pub report_date: Option<usize>,
    pub location: Option<usize>,
    pub handler: Option<usize>,
}

impl Schema {
    pub fn index(&self, field: Field) -> Option<usize> {
        match field {
            Field::Id => self.id,
            Field::Entity => self.entity,
            Field::Category => self.category,
            Field::Status => self.status,
            Field::ReportDate => self.report_date,
            Field::Location => self.location,
            Field::Handler => self.handler,
        }
    }

    pub fn has(&self, field: Field) -> bool {
        self.index(field).is_some()
    }

    pub fn has_status(&self) -> bool {
        self.status.is_some()
    }

    pub fn has_dates(&self) -> bool {
        self.report_date.is_some()
    }

    pub fn has_entity(&self) -> bool {
        self.entity.is_some()
    }

    pub fn has_category(&self) -> bool {
        self.category.is_some()
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// Fields whose column is missing from the file.
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL.into_iter().filter(|f| !self.has(*f)).collect()
    }
}

/// One complaint case. Empty cells are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub id: Option<String>,
    pub entity: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub report_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub handler: Option<String>,
    /// Raw cells of the source row, aligned with `Schema::headers`.
    pub values: Vec<String>,
}

impl Record {
    /// Text value of a string field. `ReportDate` has no text form here.
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Id => self.id.as_deref(),
            Field::Entity => self.entity.as_deref(),
            Field::Category => self.category.as_deref(),
            Field::Status => self.status.as_deref(),
            Field::Location => self.location.as_deref(),
            Field::Handler => self.handler.as_deref(),
            Field::ReportDate => None,
        }
    }
}

/// Aggregate view over a (filtered) record set. Recomputed, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub total: usize,
    pub closed: usize,
    pub open: usize,
    pub completion_rate: f64,
    pub distinct_categories: usize,
    pub overdue: usize,
    pub trend: Vec<TrendRow>,
    pub top_reported_entity: String,
}

/// Qualitative reading of the completion rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    VeryGood,
    Adequate,
    NeedsAttention,
}

impl Assessment {
    pub fn label(self) -> &'static str {
        match self {
            Assessment::VeryGood => "very good",
            Assessment::Adequate => "adequate",
            Assessment::NeedsAttention => "needs attention",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    #[serde(flatten)]
    pub metrics: DerivedMetrics,
    pub assessment: Assessment,
    pub narrative: String,
    pub as_of: NaiveDate,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TrendRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct EntityCountRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Terlapor")]
    #[tabled(rename = "Terlapor")]
    pub entity: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CategoryShareRow {
    #[serde(rename = "Maladministrasi")]
    #[tabled(rename = "Maladministrasi")]
    pub category: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Share")]
    #[tabled(rename = "Share")]
    pub share_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct StatusCountRow {
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Closed")]
    #[tabled(rename = "Closed")]
    pub closed: bool,
}

/// Case count at one resolved location, for the map.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct MapPoint {
    #[serde(rename = "Location")]
    #[tabled(rename = "Location")]
    pub location: String,
    #[serde(rename = "Lat")]
    #[tabled(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Lon")]
    #[tabled(rename = "Lon")]
    pub lon: f64,
    #[serde(rename = "Cases")]
    #[tabled(rename = "Cases")]
    pub cases: usize,
    #[serde(rename = "Open")]
    #[tabled(rename = "Open")]
    pub open: usize,
    #[serde(rename = "Fallback")]
    #[tabled(rename = "Fallback")]
    pub fallback: bool,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}
