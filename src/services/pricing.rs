//! Read-only pricing collaborator. The seat core never computes or persists
//! prices; it asks this client for a per-showtime price sheet and falls back
//! to the showtime's own base price when the external service is down.

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::models::{SeatClass, Showtime};

/// Prices used to annotate one showtime's snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PriceSheet {
    pub base_price: i64,
    pub vip_surcharge: i64,
    pub couple_surcharge: i64,
}

impl PriceSheet {
    pub fn price_for(&self, class: SeatClass) -> i64 {
        match class {
            SeatClass::Vip => self.base_price + self.vip_surcharge,
            SeatClass::Couple => self.base_price + self.couple_surcharge,
            SeatClass::Standard | SeatClass::Accessible => self.base_price,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PricingResponse {
    base_price: i64,
    #[serde(default)]
    vip_surcharge: i64,
    #[serde(default)]
    couple_surcharge: i64,
}

#[derive(Clone)]
pub struct PricingClient {
    http: reqwest::Client,
    config: PricingConfig,
}

impl PricingClient {
    pub fn from_config(config: &PricingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            http,
            config: config.clone(),
        }
    }

    /// Price sheet for a showtime. Never fails: any problem with the pricing
    /// service degrades to the showtime's base price plus the configured
    /// default surcharges.
    pub async fn sheet_for(&self, showtime: &Showtime) -> PriceSheet {
        if let Some(base_url) = &self.config.base_url {
            match self.fetch(base_url, showtime.id).await {
                Ok(sheet) => return sheet,
                Err(e) => {
                    warn!(showtime_id = %showtime.id, "pricing service unavailable, using base price: {e}");
                }
            }
        }
        PriceSheet {
            base_price: showtime.base_price,
            vip_surcharge: self.config.vip_surcharge,
            couple_surcharge: self.config.couple_surcharge,
        }
    }

    async fn fetch(&self, base_url: &str, showtime_id: Uuid) -> Result<PriceSheet, reqwest::Error> {
        let url = format!("{base_url}/showtimes/{showtime_id}/price");
        let body: PricingResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(PriceSheet {
            base_price: body.base_price,
            vip_surcharge: body.vip_surcharge,
            couple_surcharge: body.couple_surcharge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn showtime(base_price: i64) -> Showtime {
        Showtime {
            id: Uuid::new_v4(),
            theater_id: Uuid::new_v4(),
            movie_id: Uuid::new_v4(),
            starts_at: Utc::now(),
            base_price,
            capacity: 50,
            created_at: Utc::now(),
        }
    }

    fn config(base_url: Option<String>) -> PricingConfig {
        PricingConfig {
            base_url,
            request_timeout_secs: 2,
            vip_surcharge: 5000,
            couple_surcharge: 8000,
        }
    }

    #[tokio::test]
    async fn uses_the_pricing_service_when_available() {
        let server = MockServer::start().await;
        let st = showtime(40_000);
        Mock::given(method("GET"))
            .and(path(format!("/showtimes/{}/price", st.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base_price": 45_000,
                "vip_surcharge": 7000
            })))
            .mount(&server)
            .await;

        let client = PricingClient::from_config(&config(Some(server.uri())));
        let sheet = client.sheet_for(&st).await;
        assert_eq!(sheet.base_price, 45_000);
        assert_eq!(sheet.price_for(SeatClass::Vip), 52_000);
        assert_eq!(sheet.price_for(SeatClass::Standard), 45_000);
        // Missing surcharge fields default to zero.
        assert_eq!(sheet.price_for(SeatClass::Couple), 45_000);
    }

    #[tokio::test]
    async fn falls_back_to_base_price_on_service_error() {
        let server = MockServer::start().await;
        let st = showtime(40_000);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = PricingClient::from_config(&config(Some(server.uri())));
        let sheet = client.sheet_for(&st).await;
        assert_eq!(sheet.base_price, 40_000);
        assert_eq!(sheet.price_for(SeatClass::Vip), 45_000);
        assert_eq!(sheet.price_for(SeatClass::Accessible), 40_000);
    }

    #[tokio::test]
    async fn no_configured_service_means_local_sheet() {
        let client = PricingClient::from_config(&config(None));
        let sheet = client.sheet_for(&showtime(30_000)).await;
        assert_eq!(sheet.price_for(SeatClass::Couple), 38_000);
    }
}
