// src/geo/boundary.rs

use reqwest::Client;
use serde_json::Value as Json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::region::{lookup, Region};
use crate::error::{PulseError, Result};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// Region names of a GeoJSON boundary set. Geometry is never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundaries {
    /// Feature property holding the region name.
    pub name_property: String,
    names: Vec<String>,
}

impl Boundaries {
    pub fn from_geojson(text: &str, name_property: &str) -> Result<Self> {
        let bad = |detail: String| PulseError::malformed("boundaries", detail);
        let doc: Json = serde_json::from_str(text).map_err(|e| bad(e.to_string()))?;
        let features = doc
            .get("features")
            .and_then(Json::as_array)
            .ok_or_else(|| bad("no `features` array".into()))?;

        let mut names = Vec::with_capacity(features.len());
        for (i, feature) in features.iter().enumerate() {
            match feature
                .get("properties")
                .and_then(|p| p.get(name_property))
                .and_then(Json::as_str)
            {
                Some(name) => names.push(name.to_string()),
                None => debug!(feature = i, property = name_property, "feature without a name"),
            }
        }
        Ok(Boundaries {
            name_property: name_property.to_string(),
            names,
        })
    }

    /// Download and parse a boundary set, retrying with exponential backoff.
    #[instrument(level = "info", skip(client, url), fields(url = %url))]
    pub async fn fetch(client: &Client, url: &Url, name_property: &str) -> Result<Self> {
        let mut attempts = 0;
        let body = loop {
            match get_text(client, url).await {
                Ok(body) => break body,
                Err(e) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempts - 1);
                    warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(PulseError::unavailable(url.as_str(), e)),
            }
        };
        let boundaries = Self::from_geojson(&body, name_property)?;
        info!(features = boundaries.names.len(), "boundaries loaded");
        Ok(boundaries)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Boundary names paired with the region they canonicalise to.
    pub fn regions(&self) -> impl Iterator<Item = (&str, Option<&'static Region>)> + '_ {
        self.names.iter().map(|n| (n.as_str(), lookup(n)))
    }

    /// Boundary names the lookup table does not know.
    pub fn unmatched(&self) -> Vec<&str> {
        self.regions()
            .filter_map(|(name, region)| region.is_none().then_some(name))
            .collect()
    }
}

async fn get_text(client: &Client, url: &Url) -> reqwest::Result<String> {
    client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}
