//! Reverse geocoding: decimal coordinates to a human-readable place name.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;
use crate::error::GeocodeError;
use crate::metadata::Coordinates;

/// Returned whenever the lookup does not produce a name.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

pub trait PlaceResolver: Send + Sync {
    /// One lookup, no retry.
    fn lookup(&self, coords: Coordinates) -> Result<String, GeocodeError>;

    /// Like [`lookup`](Self::lookup) but never fails: errors become
    /// [`UNKNOWN_LOCATION`].
    fn resolve(&self, coords: Coordinates) -> String {
        match self.lookup(coords) {
            Ok(name) => name,
            Err(e) => {
                warn!(%coords, error = %e, "reverse geocoding failed, using fallback");
                UNKNOWN_LOCATION.to_string()
            }
        }
    }
}

impl<F> PlaceResolver for F
where
    F: Fn(Coordinates) -> Result<String, GeocodeError> + Send + Sync,
{
    fn lookup(&self, coords: Coordinates) -> Result<String, GeocodeError> {
        self(coords)
    }
}

#[derive(Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Nominatim `/reverse` client.
pub struct NominatimResolver {
    client: Client,
    base_url: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimResolver {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            min_interval: config.min_interval(),
            last_request: Mutex::new(None),
        })
    }

    fn throttle(&self) {
        let mut last = self.last_request.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

impl PlaceResolver for NominatimResolver {
    fn lookup(&self, coords: Coordinates) -> Result<String, GeocodeError> {
        self.throttle();

        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[("format", "json")])
            .query(&[("lat", coords.lat), ("lon", coords.lon)])
            .send()?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GeocodeError::Status(status));
        }

        let body: ReverseResponse = response.json()?;
        let name = body
            .display_name
            .filter(|n| !n.trim().is_empty())
            .ok_or(GeocodeError::MissingName)?;
        debug!(%coords, place = %name, "resolved place");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::OneShotServer;

    fn resolver_for(server: &OneShotServer) -> NominatimResolver {
        let config = GeocoderConfig {
            base_url: server.url.clone(),
            min_interval_ms: 0,
            timeout_secs: 5,
            ..GeocoderConfig::default()
        };
        NominatimResolver::new(&config).unwrap()
    }

    const SPOT: Coordinates = Coordinates { lat: 10.5, lon: 20.25 };

    #[test]
    fn test_resolve_display_name() {
        let server = OneShotServer::start("200 OK", r#"{"display_name":"Paris, France"}"#);
        let resolver = resolver_for(&server);

        assert_eq!(resolver.resolve(SPOT), "Paris, France");

        let request = server.request();
        assert!(request.starts_with("GET /reverse?format=json&lat=10.5&lon=20.25 "));
        assert!(request.to_ascii_lowercase().contains("user-agent: photoplan/"));
    }

    #[test]
    fn test_not_found_is_status_error() {
        let server = OneShotServer::start("404 Not Found", "");
        let resolver = resolver_for(&server);

        assert!(matches!(
            resolver.lookup(SPOT),
            Err(GeocodeError::Status(s)) if s == StatusCode::NOT_FOUND
        ));
        server.request();
    }

    #[test]
    fn test_not_found_resolves_to_unknown_location() {
        let server = OneShotServer::start("404 Not Found", "");
        let resolver = resolver_for(&server);

        assert_eq!(resolver.resolve(SPOT), "Unknown Location");
        server.request();
    }

    #[test]
    fn test_missing_display_name_falls_back() {
        let server = OneShotServer::start("200 OK", r#"{"error":"Unable to geocode"}"#);
        let resolver = resolver_for(&server);

        assert_eq!(resolver.resolve(SPOT), UNKNOWN_LOCATION);
        server.request();
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |c: Coordinates| Ok::<_, GeocodeError>(format!("{:.1}", c.lat));
        assert_eq!(resolver.resolve(SPOT), "10.5");
    }
}
