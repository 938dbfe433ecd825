//! End-to-end tests: load a complaint file, resolve locations with a stub
//! geocoder, filter, derive metrics and export.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use chrono::NaiveDate;
use land_dispute_report::config::FALLBACK_COORDINATE;
use land_dispute_report::error::LookupResult;
use land_dispute_report::reports::assess;
use land_dispute_report::types::Assessment;
use land_dispute_report::{
    Coordinate, Filters, Geocoder, LoadError, LocationResolver, LookupError, ReportConfig,
    Session,
};
use tempfile::TempDir;

const DATA: &str = "\
No,Tanggal Laporan,Terlapor,Maladministrasi,Status,Lokasi,PVL
1,2024-04-02,BPN Kota Bogor,Penundaan Berlarut,Proses,Kota Bogor,Andi
2,2024-04-20,BPN Kota Bogor,Penyimpangan Prosedur,Selesai,Kota Bogor,Budi
3,2024-05-11,BPN Kota Depok,Penundaan Berlarut,Tutup,Kantor A,Andi
4,2024-06-25,BPN Kota Bekasi,Tidak Memberikan Pelayanan,Proses,Kota Bekasi,Citra
5,2024-05-30,BPN Kota Bogor,Penundaan Berlarut,Proses,Kota Bogor,Citra
";

struct StubGeocoder {
    known: HashMap<String, Coordinate>,
    calls: Rc<RefCell<usize>>,
}

impl Geocoder for StubGeocoder {
    fn lookup(&mut self, query: &str) -> LookupResult<Coordinate> {
        *self.calls.borrow_mut() += 1;
        self.known
            .get(query)
            .copied()
            .ok_or_else(|| LookupError::NotFound(query.to_string()))
    }
}

const BOGOR: Coordinate = Coordinate {
    lat: -6.5971,
    lon: 106.806,
};
const BEKASI: Coordinate = Coordinate {
    lat: -6.2383,
    lon: 106.9756,
};

fn stub_resolver() -> (LocationResolver, Rc<RefCell<usize>>) {
    let calls = Rc::new(RefCell::new(0));
    let known = HashMap::from([
        ("Kota Bogor, Indonesia".to_string(), BOGOR),
        ("Kota Bekasi, Indonesia".to_string(), BEKASI),
    ]);
    let geocoder = StubGeocoder {
        known,
        calls: Rc::clone(&calls),
    };
    let resolver = LocationResolver::new(
        Box::new(geocoder),
        Duration::ZERO,
        ", Indonesia",
        FALLBACK_COORDINATE,
    );
    (resolver, calls)
}

fn write_data(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("data_tanah.csv");
    fs::write(&path, contents).unwrap();
    path
}

fn open(path: &Path) -> (Session, Rc<RefCell<usize>>) {
    let (resolver, calls) = stub_resolver();
    let session = Session::open(path, ReportConfig::default(), resolver, |_| {}).unwrap();
    (session, calls)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

#[test]
fn metrics_over_full_dataset() {
    let dir = TempDir::new().unwrap();
    let (session, _) = open(&write_data(&dir, DATA));

    let m = session.metrics(today());
    assert_eq!(m.total, 5);
    assert_eq!(m.closed, 2);
    assert_eq!(m.open, 3);
    assert_eq!(m.closed + m.open, m.total);
    assert!((m.completion_rate - 40.0).abs() < 1e-9);
    assert_eq!(m.distinct_categories, 3);
    // Cases 1 and 5 are open and older than 30 days; case 4 is recent.
    assert_eq!(m.overdue, 2);
    assert!(m.overdue <= m.open);
    assert_eq!(m.top_reported_entity, "BPN Kota Bogor");
    let trend: Vec<(&str, usize)> = m.trend.iter().map(|t| (t.month.as_str(), t.count)).collect();
    assert_eq!(trend, vec![("2024-04", 2), ("2024-05", 2), ("2024-06", 1)]);
    assert_eq!(m.trend.iter().map(|t| t.count).sum::<usize>(), m.total);
    assert_eq!(assess(m.completion_rate), Assessment::NeedsAttention);
}

#[test]
fn each_location_resolved_once_with_fallback() {
    let dir = TempDir::new().unwrap();
    let (session, calls) = open(&write_data(&dir, DATA));

    assert_eq!(*calls.borrow(), 3);
    let cache = session.locations();
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get("Kota Bogor"), BOGOR);
    assert_eq!(cache.get("Kota Bekasi"), BEKASI);
    assert_eq!(
        cache.get("Kantor A"),
        Coordinate {
            lat: -6.2088,
            lon: 106.8456
        }
    );
    assert_eq!(cache.fallback_count(), 1);
}

#[test]
fn filters_change_the_view_not_the_data() {
    let dir = TempDir::new().unwrap();
    let (mut session, _) = open(&write_data(&dir, DATA));

    session.set_filters(
        Filters::default()
            .with_entity("BPN Kota Bogor")
            .with_statuses(["Proses"]),
    );
    let m = session.metrics(today());
    assert_eq!(m.total, 2);
    assert_eq!(m.closed, 0);
    assert_eq!(m.completion_rate, 0.0);
    assert_eq!(session.records().len(), 5);

    session.set_filters(Filters::default().with_search("citra").with_date_range(
        NaiveDate::from_ymd_opt(2024, 6, 1),
        None,
    ));
    let view = session.view();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].id.as_deref(), Some("4"));
}

#[test]
fn empty_view_has_zero_defaults() {
    let dir = TempDir::new().unwrap();
    let (mut session, _) = open(&write_data(&dir, DATA));

    session.set_filters(Filters::default().with_search("tidak ada yang cocok"));
    let summary = session.summary(today());
    assert_eq!(summary.metrics.total, 0);
    assert_eq!(summary.metrics.closed, 0);
    assert_eq!(summary.metrics.completion_rate, 0.0);
    assert_eq!(summary.metrics.top_reported_entity, "-");
    assert_eq!(summary.assessment, Assessment::NeedsAttention);
}

#[test]
fn missing_columns_degrade_metrics() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, "Terlapor,Keterangan\nBPN Kota Bogor,a\nBPN Kota Depok,b\n");
    let (session, calls) = open(&path);

    let m = session.metrics(today());
    assert_eq!(m.total, 2);
    assert_eq!(m.closed, 0);
    assert_eq!(m.open, 2);
    assert_eq!(m.overdue, 0);
    assert_eq!(m.distinct_categories, 0);
    assert!(m.trend.is_empty());
    assert_eq!(*calls.borrow(), 0);
    assert!(session.locations().is_empty());
}

#[test]
fn export_applies_column_preference() {
    let dir = TempDir::new().unwrap();
    let path = write_data(
        &dir,
        "Catatan,Status,Terlapor,No\nx,Proses,BPN Kota Bogor,1\ny,Selesai,BPN Kota Depok,2\n",
    );
    let (mut session, _) = open(&path);
    session.set_filters(Filters::default().with_statuses(["Selesai"]));

    let out = dir.path().join("export.csv");
    assert_eq!(session.export_view(&out).unwrap(), 1);
    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(text, "No,Terlapor,Status,Catatan\n2,BPN Kota Depok,Selesai,y\n");
}

#[test]
fn refresh_reloads_only_when_modified() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, DATA);
    let (mut session, calls) = open(&path);
    assert_eq!(*calls.borrow(), 3);

    assert!(!session.refresh(|_| {}).unwrap());
    assert_eq!(*calls.borrow(), 3);

    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "6,2024-06-28,BPN Kota Bogor,Penundaan Berlarut,Proses,Kota Bogor,Andi").unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    drop(file);

    assert!(session.refresh(|_| {}).unwrap());
    assert_eq!(session.records().len(), 6);
    // The cache is rebuilt per load, so every location is looked up again.
    assert_eq!(*calls.borrow(), 6);
}

#[test]
fn missing_file_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let (resolver, _) = stub_resolver();
    let result = Session::open(
        dir.path().join("data_tanah.csv"),
        ReportConfig::default(),
        resolver,
        |_| {},
    );
    assert!(matches!(result, Err(LoadError::NotFound(_))));
}
