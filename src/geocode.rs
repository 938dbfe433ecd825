//! Location resolution: free-text location names to coordinates.
//!
//! Each distinct name is looked up at most once per load, strictly one
//! request at a time behind a minimum inter-request delay. Lookups that
//! fail for any reason resolve to the configured fallback coordinate.

use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::GeocoderConfig;
use crate::error::{LookupError, LookupResult};
use crate::types::{Coordinate, Record};

/// External lookup of a query string to a coordinate.
pub trait Geocoder {
    fn lookup(&mut self, query: &str) -> LookupResult<Coordinate>;
}

/// Geocoder backed by a Nominatim-compatible `/search` endpoint.
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> LookupResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn lookup(&mut self, query: &str) -> LookupResult<Coordinate> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()?
            .error_for_status()?
            .json()?;
        first_place(places, query)
    }
}

fn first_place(places: Vec<NominatimPlace>, query: &str) -> LookupResult<Coordinate> {
    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NotFound(query.to_string()))?;
    let lat = place
        .lat
        .trim()
        .parse::<f64>()
        .map_err(|_| LookupError::Malformed(format!("latitude '{}'", place.lat)))?;
    let lon = place
        .lon
        .trim()
        .parse::<f64>()
        .map_err(|_| LookupError::Malformed(format!("longitude '{}'", place.lon)))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(LookupError::Malformed(format!("out of range ({lat}, {lon})")));
    }
    Ok(Coordinate { lat, lon })
}

/// Geocoder used in offline mode; every lookup fails with `Disabled`.
pub struct DisabledGeocoder;

impl Geocoder for DisabledGeocoder {
    fn lookup(&mut self, _query: &str) -> LookupResult<Coordinate> {
        Err(LookupError::Disabled)
    }
}

/// Enforces a minimum delay between consecutive requests.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: None,
        }
    }

    pub fn time_until_ready(&self) -> Duration {
        match self.last_request {
            Some(last) => self.min_delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Block until a request may be sent, then mark it as sent.
    ///
    /// Returns how long the caller was made to wait.
    pub fn acquire(&mut self) -> Duration {
        let wait = self.time_until_ready();
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.last_request = Some(Instant::now());
        wait
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Geocoded,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    pub coordinate: Coordinate,
    pub resolution: Resolution,
}

/// Name to coordinate mapping for one load. Never persisted or shared.
#[derive(Debug, Clone)]
pub struct LocationCache {
    entries: HashMap<String, CacheEntry>,
    order: Vec<String>,
    fallback: Coordinate,
}

impl LocationCache {
    pub fn new(fallback: Coordinate) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            fallback,
        }
    }

    /// Coordinate for `name`; unknown names get the fallback.
    pub fn get(&self, name: &str) -> Coordinate {
        self.entries
            .get(name)
            .map(|e| e.coordinate)
            .unwrap_or(self.fallback)
    }

    pub fn entry(&self, name: &str) -> Option<&CacheEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: &str, entry: CacheEntry) {
        if self.entries.insert(name.to_string(), entry).is_none() {
            self.order.push(name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fallback_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.resolution == Resolution::Fallback)
            .count()
    }

    /// Entries in the order they were first resolved.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheEntry)> + '_ {
        self.order
            .iter()
            .filter_map(|n| self.entries.get(n).map(|e| (n.as_str(), e)))
    }
}

/// Progress of a resolution pass, reported after each name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

pub struct LocationResolver {
    geocoder: Box<dyn Geocoder>,
    limiter: RateLimiter,
    country_suffix: String,
    fallback: Coordinate,
}

impl LocationResolver {
    pub fn new(
        geocoder: Box<dyn Geocoder>,
        min_delay: Duration,
        country_suffix: impl Into<String>,
        fallback: Coordinate,
    ) -> Self {
        Self {
            geocoder,
            limiter: RateLimiter::new(min_delay),
            country_suffix: country_suffix.into(),
            fallback,
        }
    }

    /// Build the resolver described by `config`.
    ///
    /// Offline mode, a disabled geocoder, or a client that cannot be built
    /// all yield a resolver that maps every name to the fallback.
    pub fn from_config(config: &GeocoderConfig, offline: bool) -> Self {
        let geocoder: Option<Box<dyn Geocoder>> = if offline || !config.enabled {
            None
        } else {
            match NominatimGeocoder::new(config) {
                Ok(g) => Some(Box::new(g)),
                Err(e) => {
                    warn!("Geocoder unavailable, using fallback coordinates: {}", e);
                    None
                }
            }
        };
        match geocoder {
            Some(g) => Self::new(g, config.min_delay(), &config.country_suffix, config.fallback()),
            None => Self::offline(config.fallback()),
        }
    }

    pub fn offline(fallback: Coordinate) -> Self {
        Self::new(Box::new(DisabledGeocoder), Duration::ZERO, "", fallback)
    }

    /// Resolve one name, applying the fallback on any lookup error.
    pub fn resolve_one(&mut self, name: &str) -> CacheEntry {
        let query = format!("{}{}", name, self.country_suffix);
        self.limiter.acquire();
        match self.geocoder.lookup(&query) {
            Ok(coordinate) => {
                debug!(%query, lat = coordinate.lat, lon = coordinate.lon, "Geocoded");
                CacheEntry {
                    coordinate,
                    resolution: Resolution::Geocoded,
                }
            }
            Err(LookupError::Disabled) => CacheEntry {
                coordinate: self.fallback,
                resolution: Resolution::Fallback,
            },
            Err(e) => {
                warn!(%query, "Geocoding failed, using fallback: {}", e);
                CacheEntry {
                    coordinate: self.fallback,
                    resolution: Resolution::Fallback,
                }
            }
        }
    }

    /// Resolve every name not already in `cache`, in order.
    ///
    /// Blank names are skipped. `progress` is called once per name.
    pub fn resolve_into<F>(&mut self, names: &[String], cache: &mut LocationCache, mut progress: F)
    where
        F: FnMut(Progress),
    {
        let total = names.len();
        for (idx, name) in names.iter().enumerate() {
            let name = name.trim();
            if !name.is_empty() && !cache.contains(name) {
                let entry = self.resolve_one(name);
                cache.insert(name, entry);
            }
            let p = Progress {
                done: idx + 1,
                total,
            };
            debug!(done = p.done, total, fraction = p.fraction(), "Location progress");
            progress(p);
        }
    }

    pub fn resolve_all<F>(&mut self, names: &[String], progress: F) -> LocationCache
    where
        F: FnMut(Progress),
    {
        let mut cache = LocationCache::new(self.fallback);
        self.resolve_into(names, &mut cache, progress);
        info!(
            resolved = cache.len(),
            fallback = cache.fallback_count(),
            "Resolved locations"
        );
        cache
    }
}

/// Distinct non-empty location names in first-encounter order.
pub fn distinct_locations(records: &[Record]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.location.as_deref())
        .filter(|l| seen.insert(*l))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FALLBACK_COORDINATE;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Stub geocoder answering from a fixed table and recording queries.
    struct StubGeocoder {
        known: HashMap<String, Coordinate>,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl Geocoder for StubGeocoder {
        fn lookup(&mut self, query: &str) -> LookupResult<Coordinate> {
            self.calls.borrow_mut().push(query.to_string());
            self.known
                .get(query)
                .copied()
                .ok_or_else(|| LookupError::NotFound(query.to_string()))
        }
    }

    fn resolver(known: &[(&str, Coordinate)]) -> (LocationResolver, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let stub = StubGeocoder {
            known: known.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            calls: Rc::clone(&calls),
        };
        let r = LocationResolver::new(
            Box::new(stub),
            Duration::ZERO,
            ", Indonesia",
            FALLBACK_COORDINATE,
        );
        (r, calls)
    }

    const BOGOR: Coordinate = Coordinate {
        lat: -6.5971,
        lon: 106.806,
    };

    #[test]
    fn test_query_gets_country_suffix() {
        let (mut r, calls) = resolver(&[("Bogor, Indonesia", BOGOR)]);
        let cache = r.resolve_all(&["Bogor".to_string()], |_| {});
        assert_eq!(cache.get("Bogor"), BOGOR);
        assert_eq!(cache.entry("Bogor").unwrap().resolution, Resolution::Geocoded);
        assert_eq!(*calls.borrow(), vec!["Bogor, Indonesia".to_string()]);
    }

    #[test]
    fn test_unresolvable_name_gets_fallback() {
        let (mut r, _) = resolver(&[]);
        let cache = r.resolve_all(&["Kantor A".to_string()], |_| {});
        let c = cache.get("Kantor A");
        assert_eq!(c, Coordinate { lat: -6.2088, lon: 106.8456 });
        assert_eq!(cache.entry("Kantor A").unwrap().resolution, Resolution::Fallback);
        assert_eq!(cache.fallback_count(), 1);
    }

    #[test]
    fn test_each_name_queried_once_and_idempotent() {
        let (mut r, calls) = resolver(&[("Bogor, Indonesia", BOGOR)]);
        let names = vec!["Bogor".to_string(), "Kantor A".to_string()];
        let mut cache = r.resolve_all(&names, |_| {});
        let first = (cache.get("Bogor"), cache.get("Kantor A"));
        r.resolve_into(&names, &mut cache, |_| {});
        assert_eq!((cache.get("Bogor"), cache.get("Kantor A")), first);
        assert_eq!(calls.borrow().len(), 2);
        let order: Vec<&str> = cache.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["Bogor", "Kantor A"]);
    }

    #[test]
    fn test_unknown_name_lookup_defaults_to_fallback() {
        let cache = LocationCache::new(FALLBACK_COORDINATE);
        assert_eq!(cache.get("Tidak Ada"), FALLBACK_COORDINATE);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_progress_reported_per_name() {
        let (mut r, _) = resolver(&[]);
        let names = vec!["A".to_string(), " ".to_string(), "B".to_string()];
        let mut seen = Vec::new();
        let cache = r.resolve_all(&names, |p| seen.push(p));
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().unwrap().fraction(), 1.0);
        assert_eq!(seen[0], Progress { done: 1, total: 3 });
        // Blank names are not cached.
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_offline_resolver_never_geocodes() {
        let mut r = LocationResolver::offline(FALLBACK_COORDINATE);
        let cache = r.resolve_all(&["Bogor".to_string()], |_| {});
        assert_eq!(cache.get("Bogor"), FALLBACK_COORDINATE);
        assert_eq!(cache.fallback_count(), 1);
    }

    #[test]
    fn test_rate_limiter_spaces_requests() {
        let mut limiter = RateLimiter::new(Duration::from_millis(30));
        assert_eq!(limiter.acquire(), Duration::ZERO);
        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert!(limiter.time_until_ready() > Duration::ZERO);
    }

    #[test]
    fn test_first_place_parsing() {
        let places: Vec<NominatimPlace> =
            serde_json::from_str(r#"[{"lat":"-6.5971","lon":"106.8060","display_name":"Bogor"}]"#)
                .unwrap();
        let c = first_place(places, "Bogor").unwrap();
        assert!((c.lat + 6.5971).abs() < 1e-9);
        assert!((c.lon - 106.806).abs() < 1e-9);

        assert!(matches!(first_place(vec![], "X"), Err(LookupError::NotFound(_))));
        let bad = vec![NominatimPlace {
            lat: "abc".to_string(),
            lon: "1".to_string(),
        }];
        assert!(matches!(first_place(bad, "X"), Err(LookupError::Malformed(_))));
    }

    #[test]
    fn test_distinct_locations_keep_first_seen_order() {
        let rec = |l: Option<&str>| Record {
            location: l.map(str::to_string),
            ..Default::default()
        };
        let records = vec![rec(Some("Bogor")), rec(None), rec(Some("Depok")), rec(Some("Bogor"))];
        assert_eq!(distinct_locations(&records), vec!["Bogor", "Depok"]);
    }
}
