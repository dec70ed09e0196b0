//! Shipping estimation: postal code -> zone-based cost and lead time.
//!
//! The postal registry sits behind the [`PostalLookup`] trait so the
//! estimator itself stays a pure function of the zone table and the
//! resolved state. Lookup failures of any kind degrade to "quote
//! unavailable", never to a fabricated quote.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Zone 1: Southeast (closest). Zone 4: North (farthest).
const ZONE1_STATES: &[&str] = &["SP", "RJ", "MG", "ES"];
const ZONE2_STATES: &[&str] = &["PR", "SC", "RS", "GO", "DF", "MT", "MS"];
const ZONE3_STATES: &[&str] = &["BA", "SE", "AL", "PE", "PB", "RN", "CE", "PI", "MA"];
const ZONE4_STATES: &[&str] = &["AM", "RR", "AP", "PA", "TO", "RO", "AC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingZone {
    Zone1,
    Zone2,
    Zone3,
    Zone4,
    Default,
}

impl ShippingZone {
    pub fn for_state(state: &str) -> Self {
        let state = state.to_ascii_uppercase();
        let state = state.as_str();
        if ZONE1_STATES.contains(&state) {
            Self::Zone1
        } else if ZONE2_STATES.contains(&state) {
            Self::Zone2
        } else if ZONE3_STATES.contains(&state) {
            Self::Zone3
        } else if ZONE4_STATES.contains(&state) {
            Self::Zone4
        } else {
            Self::Default
        }
    }

    /// Fixed (cost, lead-time-days) pair per zone.
    pub fn rate(self) -> (Decimal, i32) {
        match self {
            Self::Zone1 => (dec!(7), 3),
            Self::Zone2 => (dec!(12), 5),
            Self::Zone3 => (dec!(15), 7),
            Self::Zone4 => (dec!(20), 10),
            Self::Default => (dec!(10), 5),
        }
    }
}

/// Resolved address data from the postal registry.
#[derive(Debug, Clone)]
pub struct PostalAddress {
    pub city: String,
    pub state: String,
}

/// External postal registry seam; mocked in tests.
#[async_trait]
pub trait PostalLookup: Send + Sync {
    /// Resolves a normalized 8-digit postal code. `Ok(None)` means the code
    /// is unknown or the registry is unreachable (fail soft).
    async fn resolve(&self, zipcode: &str) -> Result<Option<PostalAddress>, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    localidade: Option<String>,
    #[serde(default)]
    uf: Option<String>,
    #[serde(default)]
    erro: Option<serde_json::Value>,
}

/// ViaCEP client with a short bounded timeout.
pub struct ViaCepClient {
    http: reqwest::Client,
    base_url: String,
}

impl ViaCepClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl PostalLookup for ViaCepClient {
    async fn resolve(&self, zipcode: &str) -> Result<Option<PostalAddress>, ServiceError> {
        let url = format!("{}/ws/{}/json/", self.base_url, zipcode);

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, zipcode, "Postal registry unreachable");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), zipcode, "Postal registry returned an error status");
            return Ok(None);
        }

        let body: ViaCepResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, zipcode, "Postal registry returned an unparseable body");
                return Ok(None);
            }
        };

        if body.erro.is_some() {
            warn!(zipcode, "Zipcode not found in postal registry");
            return Ok(None);
        }

        match (body.localidade, body.uf) {
            (Some(city), Some(state)) => Ok(Some(PostalAddress { city, state })),
            _ => {
                warn!(zipcode, "Postal registry response missing city/state");
                Ok(None)
            }
        }
    }
}

/// Shipping quote for a resolved postal code. Ephemeral, recomputed per
/// request, never cached.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShippingQuote {
    pub cost: Decimal,
    pub days: i32,
    pub city: String,
    pub state: String,
}

/// Strips non-digit characters; a valid code has exactly 8 digits left.
pub fn normalize_zipcode(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 8 {
        Some(digits)
    } else {
        None
    }
}

#[derive(Clone)]
pub struct ShippingService {
    lookup: Arc<dyn PostalLookup>,
}

impl ShippingService {
    pub fn new(lookup: Arc<dyn PostalLookup>) -> Self {
        Self { lookup }
    }

    /// Computes a zone-based shipping quote for a postal code.
    /// `Ok(None)` covers malformed codes, unknown codes, and registry
    /// failures alike; callers surface that as "quote unavailable".
    #[instrument(skip(self))]
    pub async fn quote(&self, zipcode: &str) -> Result<Option<ShippingQuote>, ServiceError> {
        let normalized = match normalize_zipcode(zipcode) {
            Some(z) => z,
            None => {
                warn!(zipcode, "Invalid zipcode length");
                return Ok(None);
            }
        };

        let address = match self.lookup.resolve(&normalized).await? {
            Some(a) => a,
            None => return Ok(None),
        };

        let (cost, days) = ShippingZone::for_state(&address.state).rate();

        Ok(Some(ShippingQuote {
            cost,
            days,
            city: address.city,
            state: address.state,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Option<PostalAddress>);

    #[async_trait]
    impl PostalLookup for FixedLookup {
        async fn resolve(&self, _zipcode: &str) -> Result<Option<PostalAddress>, ServiceError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize_zipcode("01310-100"), Some("01310100".to_string()));
        assert_eq!(normalize_zipcode("01 310 100"), Some("01310100".to_string()));
        assert_eq!(normalize_zipcode("0131010"), None);
        assert_eq!(normalize_zipcode("013101000"), None);
        assert_eq!(normalize_zipcode("abcdefgh"), None);
    }

    #[test]
    fn zone_mapping_matches_rate_table() {
        assert_eq!(ShippingZone::for_state("SP"), ShippingZone::Zone1);
        assert_eq!(ShippingZone::for_state("rs"), ShippingZone::Zone2);
        assert_eq!(ShippingZone::for_state("BA"), ShippingZone::Zone3);
        assert_eq!(ShippingZone::for_state("AM"), ShippingZone::Zone4);
        assert_eq!(ShippingZone::for_state("XX"), ShippingZone::Default);

        assert_eq!(ShippingZone::Zone1.rate(), (dec!(7), 3));
        assert_eq!(ShippingZone::Zone4.rate(), (dec!(20), 10));
        assert_eq!(ShippingZone::Default.rate(), (dec!(10), 5));
    }

    #[tokio::test]
    async fn malformed_zipcode_never_yields_a_quote() {
        let svc = ShippingService::new(Arc::new(FixedLookup(Some(PostalAddress {
            city: "São Paulo".into(),
            state: "SP".into(),
        }))));

        // Lookup would succeed, but normalization fails first.
        assert!(svc.quote("1234").await.unwrap().is_none());
        assert!(svc.quote("123456789").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolved_state_drives_the_quote() {
        let svc = ShippingService::new(Arc::new(FixedLookup(Some(PostalAddress {
            city: "São Paulo".into(),
            state: "SP".into(),
        }))));

        let quote = svc.quote("01310-100").await.unwrap().unwrap();
        assert_eq!(quote.cost, dec!(7));
        assert_eq!(quote.days, 3);
        assert_eq!(quote.state, "SP");
    }

    #[tokio::test]
    async fn unknown_zipcode_fails_soft() {
        let svc = ShippingService::new(Arc::new(FixedLookup(None)));
        assert!(svc.quote("99999-999").await.unwrap().is_none());
    }
}
