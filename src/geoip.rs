//! Client address classification and IP geolocation.
//!
//! Mirrors the detection step that runs before any gate decision: classify
//! the raw client address, consult the geolocation provider for routable
//! addresses, and negotiate a language from the request. Lookup failures
//! never reach the caller; they degrade to [`RegionHint::Unknown`].

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SiteConfig;
use crate::locale::Language;

/// Classification of the raw client address attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAddr {
    /// No address was supplied, or it did not parse as an IP.
    Missing,
    /// The address parsed but is not publicly routable.
    Private(IpAddr),
    /// The address is publicly routable and eligible for geolocation.
    Routable(IpAddr),
}

impl ClientAddr {
    /// Classify an optional raw address string.
    ///
    /// Unparsable input is treated the same as a missing address.
    pub fn classify(raw: Option<&str>) -> ClientAddr {
        let Some(raw) = raw else {
            return ClientAddr::Missing;
        };
        let Ok(ip) = raw.trim().parse::<IpAddr>() else {
            return ClientAddr::Missing;
        };
        if is_private(ip) {
            ClientAddr::Private(ip)
        } else {
            ClientAddr::Routable(ip)
        }
    }

    /// The parsed address, if one was present.
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            ClientAddr::Missing => None,
            ClientAddr::Private(ip) | ClientAddr::Routable(ip) => Some(*ip),
        }
    }
}

/// Addresses that must never be sent to the geolocation provider.
fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                // Unique local fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link local fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Best-effort region information derived from the client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionHint {
    /// No usable address, or the provider lookup failed.
    Unknown,
    /// The address is private; sentinel value, never used to pick a
    /// destination.
    Private,
    /// Lower-cased ISO country code from the provider.
    Country(String),
}

/// Per-request detection result handed to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub addr: ClientAddr,
    pub region: RegionHint,
    pub language: Language,
}

impl Detection {
    /// A detection carrying no address information, with the language
    /// negotiated from the request. Used on paths that skip geolocation.
    pub fn without_lookup(accept_language: Option<&str>, config: &SiteConfig) -> Detection {
        Detection {
            addr: ClientAddr::Missing,
            region: RegionHint::Unknown,
            language: Language::negotiate(accept_language, config),
        }
    }
}

/// Geolocation lookup: IP in, ISO country code out.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn country_code(&self, ip: IpAddr) -> Result<String>;
}

/// HTTP geolocation provider.
///
/// Expects `GET <base_url>/<ip>` to return JSON with a `country_code` field.
pub struct HttpGeoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeoProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build geolocation HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    country_code: String,
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    async fn country_code(&self, ip: IpAddr) -> Result<String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), ip);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Geolocation request failed for {}", ip))?
            .error_for_status()
            .context("Geolocation service returned an error status")?;

        let body: GeoResponse = response
            .json()
            .await
            .context("Failed to parse geolocation response")?;

        Ok(body.country_code)
    }
}

/// Fixed-map provider for tests and offline demos.
#[derive(Debug, Default)]
pub struct StaticGeoProvider {
    entries: HashMap<IpAddr, String>,
}

impl StaticGeoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, ip: IpAddr, country_code: impl Into<String>) -> Self {
        self.entries.insert(ip, country_code.into());
        self
    }
}

#[async_trait]
impl GeoProvider for StaticGeoProvider {
    async fn country_code(&self, ip: IpAddr) -> Result<String> {
        self.entries
            .get(&ip)
            .cloned()
            .with_context(|| format!("No geolocation entry for {}", ip))
    }
}

/// Run address classification, geolocation and language negotiation for a
/// request.
///
/// Provider failures are logged and reported as [`RegionHint::Unknown`];
/// this function never returns an error.
pub async fn detect(
    raw_addr: Option<&str>,
    accept_language: Option<&str>,
    provider: &dyn GeoProvider,
    config: &SiteConfig,
) -> Detection {
    let addr = ClientAddr::classify(raw_addr);

    let region = match addr {
        ClientAddr::Missing => RegionHint::Unknown,
        ClientAddr::Private(_) => RegionHint::Private,
        ClientAddr::Routable(ip) => match provider.country_code(ip).await {
            Ok(code) => {
                let code = code.to_lowercase();
                debug!("Geolocated {} to region '{}'", ip, code);
                RegionHint::Country(code)
            }
            Err(e) => {
                warn!("Geolocation lookup failed for {}: {}", ip, e);
                RegionHint::Unknown
            }
        },
    };

    Detection {
        addr,
        region,
        language: Language::negotiate(accept_language, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify_missing() {
        assert_eq!(ClientAddr::classify(None), ClientAddr::Missing);
    }

    #[test]
    fn test_classify_garbage() {
        assert_eq!(ClientAddr::classify(Some("not-an-ip")), ClientAddr::Missing);
        assert_eq!(ClientAddr::classify(Some("")), ClientAddr::Missing);
    }

    #[test]
    fn test_classify_private_ranges() {
        for raw in ["10.1.2.3", "192.168.0.1", "172.16.5.5", "127.0.0.1", "169.254.0.1"] {
            match ClientAddr::classify(Some(raw)) {
                ClientAddr::Private(_) => {}
                other => panic!("{} should classify as private, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_classify_private_v6() {
        for raw in ["::1", "fe80::1", "fc00::1", "fd12::42"] {
            match ClientAddr::classify(Some(raw)) {
                ClientAddr::Private(_) => {}
                other => panic!("{} should classify as private, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_classify_routable() {
        match ClientAddr::classify(Some("8.8.8.8")) {
            ClientAddr::Routable(ip) => assert_eq!(ip.to_string(), "8.8.8.8"),
            other => panic!("expected routable, got {:?}", other),
        }
        match ClientAddr::classify(Some("2001:4860:4860::8888")) {
            ClientAddr::Routable(_) => {}
            other => panic!("expected routable, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_trims_whitespace() {
        match ClientAddr::classify(Some(" 8.8.4.4 ")) {
            ClientAddr::Routable(_) => {}
            other => panic!("expected routable, got {:?}", other),
        }
    }

    // ==================== Detection Tests ====================

    fn provider() -> StaticGeoProvider {
        StaticGeoProvider::new()
            .with_entry("8.8.8.8".parse().unwrap(), "US")
            .with_entry("81.2.69.160".parse().unwrap(), "GB")
    }

    #[tokio::test]
    async fn test_detect_missing_ip() {
        let config = SiteConfig::default();
        let detection = detect(None, None, &provider(), &config).await;
        assert_eq!(detection.region, RegionHint::Unknown);
        assert_eq!(detection.addr, ClientAddr::Missing);
    }

    #[tokio::test]
    async fn test_detect_private_ip_is_sentinel() {
        let config = SiteConfig::default();
        let detection = detect(Some("192.168.1.20"), None, &provider(), &config).await;
        assert_eq!(detection.region, RegionHint::Private);
    }

    #[tokio::test]
    async fn test_detect_routable_ip_lowercases_country() {
        let config = SiteConfig::default();
        let detection = detect(Some("81.2.69.160"), None, &provider(), &config).await;
        assert_eq!(detection.region, RegionHint::Country("gb".to_string()));
    }

    #[tokio::test]
    async fn test_detect_provider_failure_degrades() {
        let config = SiteConfig::default();
        // 1.1.1.1 has no entry in the static provider, so the lookup errors.
        let detection = detect(Some("1.1.1.1"), None, &provider(), &config).await;
        assert_eq!(detection.region, RegionHint::Unknown);
    }

    #[tokio::test]
    async fn test_detect_negotiates_language() {
        let config = SiteConfig::default();
        let detection = detect(None, Some("fr-CA"), &provider(), &config).await;
        assert_eq!(detection.language.code(), "fr");
    }
}
