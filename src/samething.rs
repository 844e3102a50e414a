//! SameThing Client: resolves a DBpedia subject IRI to its canonical
//! Wikidata IRI via an external "same-thing" lookup service.

use log::warn;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

const WIKIDATA_BASE: &str = "http://www.wikidata.org/entity/";
const CACHE_CAPACITY: usize = 4096;
const MAX_RETRIES: u32 = 5;
const BACKOFF_FACTOR: f64 = 0.5;
const RETRY_STATUSES: [u16; 3] = [502, 503, 504];

/// Maps subject IRIs to their canonical Wikidata IRI, falling back to the
/// input IRI when the service has no match or is unreachable. HTTP failures
/// are always non-fatal here.
pub struct SameThingClient {
    service_url: String,
    http: reqwest::blocking::Client,
    cache: Mutex<LruCache<String, String>>,
}

impl SameThingClient {
    pub fn new(service_url: String) -> Self {
        let http = reqwest::blocking::Client::builder()
            .build()
            .expect("reqwest client with default TLS config always builds");
        let cache = Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap()));
        SameThingClient { service_url, http, cache }
    }

    /// Looks up the canonical Wikidata IRI for `iri`, memoizing results in a
    /// process-local LRU cache. Returns `iri` unchanged on any failure to
    /// find or reach a match.
    pub fn fetch_wikidata_uri(&self, iri: &str) -> String {
        if let Some(hit) = self.cache.lock().unwrap().get(iri) {
            return hit.clone();
        }

        let request_url = format!("{}lookup/?meta=off&uri={iri}", self.service_url);
        let resolved = self.get_with_retries(&request_url).unwrap_or_else(|err| {
            warn!("same-thing: lookup failed for {iri}: {err}");
            None
        });

        let resolved = resolved.unwrap_or_else(|| {
            warn!("same-thing: no Wikidata URI found by {request_url}");
            iri.to_owned()
        });

        self.cache.lock().unwrap().put(iri.to_owned(), resolved.clone());
        resolved
    }

    /// Issues the GET, retrying up to [`MAX_RETRIES`] times with exponential
    /// backoff on 502/503/504. Connection-level failures (the service is
    /// unreachable) are not retried: they aren't in the retryable status set,
    /// and retrying them here would just burn the backoff schedule against a
    /// host that was never going to answer.
    fn get_with_retries(&self, url: &str) -> Result<Option<String>, reqwest::Error> {
        let mut attempt = 0;
        loop {
            match self.http.get(url).send() {
                Ok(response) if response.status().is_success() => {
                    let body: serde_json::Value = response.json().unwrap_or(serde_json::Value::Null);
                    return Ok(find_wikidata_local(&body));
                }
                Ok(response) if RETRY_STATUSES.contains(&response.status().as_u16()) && attempt < MAX_RETRIES => {
                    attempt += 1;
                    std::thread::sleep(Duration::from_secs_f64(BACKOFF_FACTOR * 2f64.powi(attempt as i32 - 1)));
                }
                Ok(_) => return Ok(None),
                Err(_) => return Ok(None),
            }
        }
    }
}

/// Scans the response's `locals` array for the first IRI under the
/// Wikidata entity namespace.
fn find_wikidata_local(body: &serde_json::Value) -> Option<String> {
    body.get("locals")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str())
        .find(|iri| iri.starts_with(WIKIDATA_BASE))
        .map(str::to_owned)
}
