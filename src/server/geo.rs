//! IP geolocation through an ipinfo-compatible JSON endpoint.

use std::net::IpAddr;

use serde::Deserialize;

use crate::core::config;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Clone)]
pub struct GeoLocator {
    client: reqwest::Client,
    base_url: String,
}

impl GeoLocator {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config::network::geoip_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET {base}/{ip}/json`. Failures give an empty location.
    pub async fn locate(&self, ip: IpAddr) -> Location {
        if self.base_url.is_empty() {
            return Location::default();
        }
        let url = format!("{}/{}/json", self.base_url, ip);
        match self.fetch(&url).await {
            Ok(location) => location,
            Err(e) => {
                log::debug!("GeoIP lookup for {} failed: {}", ip, e);
                Location::default()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Location, reqwest::Error> {
        self.client.get(url).send().await?.error_for_status()?.json().await
    }
}
