use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use common::Money;
use domain::{Address, LabelFormat};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::json;

use crate::client::CarrierClient;
use crate::token::TokenCache;
use crate::types::{PurchasedLabel, RateOffer, RateRequest, ShipmentRequest};
use crate::{CarrierError, Result};

const DEFAULT_BASE_URL: &str = "https://apis.usps.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The USPS mail classes quoted by the rates call.
const MAIL_CLASSES: &[&str] = &[
    "USPS_GROUND_ADVANTAGE",
    "PRIORITY_MAIL",
    "PRIORITY_MAIL_EXPRESS",
    "FIRST-CLASS_PACKAGE_SERVICE",
    "MEDIA_MAIL",
    "LIBRARY_MAIL",
    "PARCEL_SELECT",
];

/// USPS API credentials and origin address.
#[derive(Debug, Clone)]
pub struct UspsConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub ship_from: Address,
}

impl UspsConfig {
    /// Reads credentials from `USPS_CLIENT_ID` and `USPS_CLIENT_SECRET`.
    /// Returns `None` when either is missing.
    pub fn from_env(ship_from: Address) -> Option<Self> {
        Some(Self {
            client_id: std::env::var("USPS_CLIENT_ID").ok()?,
            client_secret: std::env::var("USPS_CLIENT_SECRET").ok()?,
            base_url: std::env::var("USPS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            ship_from,
        })
    }
}

/// USPS prices and labels API client.
pub struct UspsClient {
    config: Option<UspsConfig>,
    http: reqwest::Client,
    token: TokenCache,
}

impl UspsClient {
    pub fn new(config: Option<UspsConfig>) -> Self {
        Self {
            config,
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            token: TokenCache::new(),
        }
    }

    fn config(&self) -> Result<&UspsConfig> {
        self.config
            .as_ref()
            .ok_or(CarrierError::NotConfigured("USPS"))
    }

    /// Display names for the mail classes. Unknown classes are shown
    /// as the raw code.
    fn service_name(code: &str) -> String {
        match code {
            "USPS_GROUND_ADVANTAGE" => "USPS Ground Advantage".to_string(),
            "PRIORITY_MAIL" => "Priority Mail".to_string(),
            "PRIORITY_MAIL_EXPRESS" => "Priority Mail Express".to_string(),
            "FIRST-CLASS_PACKAGE_SERVICE" => "First-Class Package Service".to_string(),
            "MEDIA_MAIL" => "Media Mail".to_string(),
            "LIBRARY_MAIL" => "Library Mail".to_string(),
            "PARCEL_SELECT" => "Parcel Select".to_string(),
            other => other.to_string(),
        }
    }

    async fn bearer_token(&self) -> Result<String> {
        let config = self.config()?;
        let url = format!("{}/oauth2/v3/token", config.base_url);
        let http = self.http.clone();
        let client_id = config.client_id.clone();
        let client_secret = config.client_secret.clone();

        self.token
            .get_or_refresh(|| async move {
                let response = http
                    .post(&url)
                    .json(&json!({
                        "grant_type": "client_credentials",
                        "client_id": client_id,
                        "client_secret": client_secret,
                    }))
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(CarrierError::Auth {
                        status: status.as_u16(),
                        body: response.text().await.unwrap_or_default(),
                    });
                }

                let body: TokenResponse = response.json().await?;
                Ok((body.access_token, Duration::from_secs(body.expires_in)))
            })
            .await
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(CarrierError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// Quotes one mail class for one package. USPS prices one
    /// class/package pair per call.
    async fn quote_class(
        &self,
        token: &str,
        mail_class: &str,
        request: &RateRequest,
        package: &domain::PackageSpec,
    ) -> Result<Option<RateOffer>> {
        let config = self.config()?;

        let body = json!({
            "originZIPCode": config.ship_from.postal_code,
            "destinationZIPCode": request.destination.postal_code,
            "weight": package.weight_lb,
            "length": package.length_in,
            "width": package.width_in,
            "height": package.height_in,
            "mailClass": mail_class,
            "processingCategory": "MACHINABLE",
            "rateIndicator": "SP",
            "destinationEntryFacilityType": "NONE",
            "priceType": "COMMERCIAL",
        });

        let response = self
            .http
            .post(format!("{}/prices/v3/base-rates/search", config.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        // A class that does not apply to this package is not an error.
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let parsed: PriceResponse = response.json().await?;

        let Some(rate) = parsed.rates.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(RateOffer {
            carrier: "USPS".to_string(),
            service_code: mail_class.to_string(),
            service_name: Self::service_name(mail_class),
            price: Money::from_cents((rate.price * 100.0).round() as i64),
            currency: "USD".to_string(),
            estimated_days: None,
            estimated_delivery_date: None,
        }))
    }
}

#[async_trait]
impl CarrierClient for UspsClient {
    fn name(&self) -> &'static str {
        "USPS"
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    #[tracing::instrument(skip(self, request))]
    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<RateOffer>> {
        let token = self.bearer_token().await?;

        let package = request
            .packages
            .first()
            .ok_or_else(|| CarrierError::Decode("no packages to rate".into()))?;

        // One price call per mail class, issued concurrently so the
        // whole quote settles in roughly one round trip.
        let results = join_all(
            MAIL_CLASSES
                .iter()
                .map(|mail_class| self.quote_class(&token, mail_class, request, package)),
        )
        .await;

        let mut offers = Vec::new();
        for result in results {
            if let Some(offer) = result? {
                offers.push(offer);
            }
        }
        Ok(offers)
    }

    #[tracing::instrument(skip(self, request), fields(service = %request.service_code))]
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<PurchasedLabel> {
        let config = self.config()?;
        let token = self.bearer_token().await?;

        let package = request
            .packages
            .first()
            .ok_or_else(|| CarrierError::Decode("no packages to ship".into()))?;

        let from = &config.ship_from;
        let to = &request.destination;
        let body = json!({
            "labelType": "SHIPPING_LABEL",
            "mailClass": request.service_code,
            "imageInfo": {
                "imageType": "PDF",
                "labelType": "4X6LABEL",
            },
            "fromAddress": {
                "firstName": from.name,
                "streetAddress": from.line1,
                "secondaryAddress": from.line2,
                "city": from.city,
                "state": from.region,
                "ZIPCode": from.postal_code,
            },
            "toAddress": {
                "firstName": to.name,
                "streetAddress": to.line1,
                "secondaryAddress": to.line2,
                "city": to.city,
                "state": to.region,
                "ZIPCode": to.postal_code,
            },
            "packageDescription": {
                "weight": package.weight_lb,
                "length": package.length_in,
                "width": package.width_in,
                "height": package.height_in,
                "mailingDate": chrono::Utc::now().date_naive(),
                "processingCategory": "MACHINABLE",
                "rateIndicator": "SP",
                "destinationEntryFacilityType": "NONE",
            },
        });

        let response = self
            .http
            .post(format!("{}/labels/v3/label", config.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let parsed: LabelResponse = response.json().await?;

        let label_data = BASE64
            .decode(parsed.label_image.as_bytes())
            .map_err(|err| CarrierError::Decode(format!("label decode: {err}")))?;

        Ok(PurchasedLabel {
            tracking_number: parsed.tracking_number,
            label_data,
            label_format: LabelFormat::Pdf,
            cost: Money::from_cents((parsed.postage * 100.0).round() as i64),
            currency: "USD".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    rates: Vec<PriceRate>,
}

#[derive(Debug, Deserialize)]
struct PriceRate {
    price: f64,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(rename = "labelImage")]
    label_image: String,
    #[serde(rename = "trackingNumber")]
    tracking_number: String,
    #[serde(default)]
    postage: f64,
}
