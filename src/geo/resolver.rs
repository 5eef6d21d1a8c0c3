// file: src/geo/resolver.rs
// description: best-effort caller geolocation from network origin
// reference: https://ipinfo.io/developers

use crate::config::LocationConfig;
use crate::error::{PipelineError, Result};
use crate::models::{Location, LocationLookup};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves the caller's approximate location. Implementations never fail:
/// every lookup problem collapses to [`LocationLookup::Absent`].
#[async_trait]
pub trait LocationResolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self) -> LocationLookup;
}

/// Always reports an absent location.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLocationResolver;

#[async_trait]
impl LocationResolver for NoopLocationResolver {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn resolve(&self) -> LocationLookup {
        LocationLookup::Absent
    }
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    loc: Option<String>,
    #[serde(default)]
    bogon: bool,
}

/// Single-attempt lookup against an ipinfo-compatible endpoint.
pub struct IpInfoResolver {
    client: Client,
    endpoint: String,
}

impl IpInfoResolver {
    pub fn new(config: &LocationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build geolocation client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    async fn lookup(&self) -> Result<Location> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| PipelineError::LocationLookup(format!("geolocation request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::LocationLookup(format!(
                "geolocation service returned {}",
                response.status()
            )));
        }

        let body: IpInfoResponse = response.json().await.map_err(|e| {
            PipelineError::LocationLookup(format!("geolocation response unreadable: {}", e))
        })?;

        parse_ipinfo(body)
    }
}

fn parse_ipinfo(body: IpInfoResponse) -> Result<Location> {
    if body.bogon {
        return Err(PipelineError::LocationLookup(
            "private network address has no location".to_string(),
        ));
    }

    let mut location = Location::new(
        body.city.as_deref().unwrap_or_default(),
        body.region.as_deref().unwrap_or_default(),
        body.country.as_deref().unwrap_or_default(),
    );

    if let Some((lat, lng)) = body.loc.as_deref().and_then(parse_coordinates) {
        location = location.with_coordinates(lat, lng);
    }

    if location.is_blank() {
        return Err(PipelineError::LocationLookup(
            "geolocation result carried no place names".to_string(),
        ));
    }

    Ok(location)
}

fn parse_coordinates(loc: &str) -> Option<(f64, f64)> {
    let (lat, lng) = loc.split_once(',')?;
    Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?))
}

#[async_trait]
impl LocationResolver for IpInfoResolver {
    fn name(&self) -> &'static str {
        "ipinfo"
    }

    async fn resolve(&self) -> LocationLookup {
        match self.lookup().await {
            Ok(location) => {
                debug!(
                    "Resolved location: {} {} {}",
                    location.city(),
                    location.state(),
                    location.country()
                );
                LocationLookup::Resolved(location)
            }
            Err(e) => {
                warn!("Location lookup failed, continuing without location: {}", e);
                LocationLookup::Absent
            }
        }
    }
}
