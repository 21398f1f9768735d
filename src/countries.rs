use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::index::is_country_code;

/// Source of border information for the neighbour expansion.
#[async_trait]
pub trait CountryDirectory: Send + Sync {
    /// Common names of the countries bordering `country`. Unknown countries
    /// have no neighbours.
    async fn neighbours(&self, country: &str) -> Result<Vec<String>>;

    /// HTTP status of the upstream service, for the status page.
    async fn probe(&self) -> u16;
}

#[derive(Debug, Deserialize)]
struct CountryName {
    common: String,
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    name: CountryName,
    #[serde(default)]
    borders: Vec<String>,
}

/// Client for a restcountries-style v3.1 API.
pub struct RestCountriesClient {
    client: Client,
    base_url: Url,
}

impl RestCountriesClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid country API url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(format!("Country API url '{}' cannot be a base", base_url)));
        }
        Ok(Self { client, base_url })
    }

    /// `{base}/{kind}/{value}`, with `value` escaped as a single path segment.
    fn endpoint(&self, kind: &str, value: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(kind).push(value.trim());
        }
        url
    }

    fn search_url(&self, token: &str) -> Url {
        let kind = if is_country_code(token) { "alpha" } else { "name" };
        self.endpoint(kind, token)
    }

    /// `Ok(None)` on 404.
    async fn fetch(&self, url: &Url) -> Result<Option<Vec<CountryRecord>>> {
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let records = response
                    .json::<Vec<CountryRecord>>()
                    .await
                    .map_err(|e| AppError::CountryApi(format!("Invalid response from {}: {}", url, e)))?;
                Ok(Some(records))
            }
            status => Err(AppError::CountryApi(format!("{} returned status {}", url, status))),
        }
    }
}

#[async_trait]
impl CountryDirectory for RestCountriesClient {
    async fn neighbours(&self, country: &str) -> Result<Vec<String>> {
        let Some(records) = self.fetch(&self.search_url(country)).await? else {
            debug!(country, "country unknown upstream, no neighbours");
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for border in records.iter().flat_map(|r| r.borders.iter()) {
            match self.fetch(&self.endpoint("alpha", border)).await {
                Ok(Some(found)) => names.extend(found.into_iter().next().map(|c| c.name.common)),
                Ok(None) => warn!(border = %border, "border code not found upstream"),
                Err(e) => warn!(border = %border, "skipping border: {}", e),
            }
        }
        Ok(names)
    }

    async fn probe(&self) -> u16 {
        match self.client.get(self.base_url.clone()).send().await {
            Ok(response) => response.status().as_u16(),
            Err(e) => {
                warn!("country API unreachable: {}", e);
                StatusCode::SERVICE_UNAVAILABLE.as_u16()
            }
        }
    }
}
