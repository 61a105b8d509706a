use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use common::Money;
use domain::{Address, LabelFormat};
use serde::Deserialize;
use serde_json::json;

use crate::client::CarrierClient;
use crate::token::TokenCache;
use crate::types::{PurchasedLabel, RateOffer, RateRequest, ShipmentRequest};
use crate::{CarrierError, Result};

const DEFAULT_BASE_URL: &str = "https://onlinetools.ups.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// UPS API credentials and shipper identity.
#[derive(Debug, Clone)]
pub struct UpsConfig {
    pub client_id: String,
    pub client_secret: String,
    pub account_number: String,
    pub base_url: String,
    pub ship_from: Address,
}

impl UpsConfig {
    /// Reads credentials from `UPS_CLIENT_ID`, `UPS_CLIENT_SECRET` and
    /// `UPS_ACCOUNT_NUMBER`. Returns `None` when any is missing, which
    /// leaves the client unconfigured.
    pub fn from_env(ship_from: Address) -> Option<Self> {
        Some(Self {
            client_id: std::env::var("UPS_CLIENT_ID").ok()?,
            client_secret: std::env::var("UPS_CLIENT_SECRET").ok()?,
            account_number: std::env::var("UPS_ACCOUNT_NUMBER").ok()?,
            base_url: std::env::var("UPS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            ship_from,
        })
    }
}

/// UPS Rating and Shipping API client.
pub struct UpsClient {
    config: Option<UpsConfig>,
    http: reqwest::Client,
    token: TokenCache,
}

impl UpsClient {
    pub fn new(config: Option<UpsConfig>) -> Self {
        Self {
            config,
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            token: TokenCache::new(),
        }
    }

    fn config(&self) -> Result<&UpsConfig> {
        self.config
            .as_ref()
            .ok_or(CarrierError::NotConfigured("UPS"))
    }

    /// Human-readable names for the UPS domestic service codes. Codes
    /// outside this table are displayed as-is.
    fn service_name(code: &str) -> String {
        match code {
            "01" => "UPS Next Day Air".to_string(),
            "02" => "UPS 2nd Day Air".to_string(),
            "03" => "UPS Ground".to_string(),
            "12" => "UPS 3 Day Select".to_string(),
            "13" => "UPS Next Day Air Saver".to_string(),
            "14" => "UPS Next Day Air Early".to_string(),
            "59" => "UPS 2nd Day Air A.M.".to_string(),
            "65" => "UPS Worldwide Saver".to_string(),
            other => other.to_string(),
        }
    }

    async fn bearer_token(&self) -> Result<String> {
        let config = self.config()?;
        let url = format!("{}/security/v1/oauth/token", config.base_url);
        let http = self.http.clone();
        let client_id = config.client_id.clone();
        let client_secret = config.client_secret.clone();

        self.token
            .get_or_refresh(|| async move {
                let response = http
                    .post(&url)
                    .basic_auth(&client_id, Some(&client_secret))
                    .form(&[("grant_type", "client_credentials")])
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
                // UPS serializes expires_in as a decimal string.
                let valid_for = body
                    .expires_in
                    .parse::<u64>()
                    .map_err(|_| CarrierError::Decode("non-numeric expires_in".into()))?;
                Ok((body.access_token, Duration::from_secs(valid_for)))
            })
            .await
    }

    fn address_json(address: &Address) -> serde_json::Value {
        let mut lines = vec![address.line1.clone()];
        if let Some(line2) = &address.line2 {
            lines.push(line2.clone());
        }
        json!({
            "Name": address.name,
            "Address": {
                "AddressLine": lines,
                "City": address.city,
                "StateProvinceCode": address.region,
                "PostalCode": address.postal_code,
                "CountryCode": address.country,
            }
        })
    }

    fn package_json(packages: &[domain::PackageSpec]) -> Vec<serde_json::Value> {
        packages
            .iter()
            .map(|package| {
                json!({
                    "PackagingType": { "Code": "02" },
                    "Dimensions": {
                        "UnitOfMeasurement": { "Code": "IN" },
                        "Length": format!("{:.1}", package.length_in),
                        "Width": format!("{:.1}", package.width_in),
                        "Height": format!("{:.1}", package.height_in),
                    },
                    "PackageWeight": {
                        "UnitOfMeasurement": { "Code": "LBS" },
                        "Weight": format!("{:.1}", package.weight_lb),
                    }
                })
            })
            .collect()
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
}

#[async_trait]
impl CarrierClient for UpsClient {
    fn name(&self) -> &'static str {
        "UPS"
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    #[tracing::instrument(skip(self, request))]
    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<RateOffer>> {
        let config = self.config()?;
        let token = self.bearer_token().await?;

        let body = json!({
            "RateRequest": {
                "Request": { "RequestOption": "Shop" },
                "Shipment": {
                    "Shipper": {
                        "ShipperNumber": config.account_number,
                        "Name": config.ship_from.name,
                        "Address": Self::address_json(&config.ship_from)["Address"],
                    },
                    "ShipTo": Self::address_json(&request.destination),
                    "ShipFrom": Self::address_json(&config.ship_from),
                    "Package": Self::package_json(&request.packages),
                }
            }
        });

        let response = self
            .http
            .post(format!("{}/api/rating/v2403/Shop", config.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let parsed: RatingResponse = response.json().await?;

        let offers = parsed
            .rate_response
            .rated_shipment
            .into_iter()
            .filter_map(|rated| {
                let price = Money::parse_decimal(&rated.total_charges.monetary_value)?;
                let estimated_days = rated
                    .guaranteed_delivery
                    .as_ref()
                    .and_then(|g| g.business_days_in_transit.as_deref())
                    .and_then(|days| days.parse().ok());
                Some(RateOffer {
                    carrier: "UPS".to_string(),
                    service_code: rated.service.code.clone(),
                    service_name: Self::service_name(&rated.service.code),
                    price,
                    currency: rated.total_charges.currency_code,
                    estimated_days,
                    estimated_delivery_date: None,
                })
            })
            .collect();

        Ok(offers)
    }

    #[tracing::instrument(skip(self, request), fields(service = %request.service_code))]
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<PurchasedLabel> {
        let config = self.config()?;
        let token = self.bearer_token().await?;

        let label_format = match request.label_format {
            LabelFormat::Png => "PNG",
            LabelFormat::Zpl => "ZPL",
            _ => "GIF",
        };

        let body = json!({
            "ShipmentRequest": {
                "Request": { "RequestOption": "nonvalidate" },
                "Shipment": {
                    "Shipper": {
                        "ShipperNumber": config.account_number,
                        "Name": config.ship_from.name,
                        "Address": Self::address_json(&config.ship_from)["Address"],
                    },
                    "ShipTo": Self::address_json(&request.destination),
                    "ShipFrom": Self::address_json(&config.ship_from),
                    "PaymentInformation": {
                        "ShipmentCharge": {
                            "Type": "01",
                            "BillShipper": { "AccountNumber": config.account_number }
                        }
                    },
                    "Service": { "Code": request.service_code },
                    "Package": Self::package_json(&request.packages),
                },
                "LabelSpecification": {
                    "LabelImageFormat": { "Code": label_format }
                }
            }
        });

        let response = self
            .http
            .post(format!("{}/api/shipments/v2403/ship", config.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let parsed: ShipResponse = response.json().await?;
        let results = parsed.shipment_response.shipment_results;

        let package = results
            .package_results
            .into_iter()
            .next()
            .ok_or_else(|| CarrierError::Decode("no package results".into()))?;
        let label_data = BASE64
            .decode(package.shipping_label.graphic_image.as_bytes())
            .map_err(|err| CarrierError::Decode(format!("label decode: {err}")))?;
        let cost = Money::parse_decimal(&results.shipment_charges.total_charges.monetary_value)
            .ok_or_else(|| CarrierError::Decode("unparseable shipment charge".into()))?;

        let purchased_format = match label_format {
            "PNG" => LabelFormat::Png,
            "ZPL" => LabelFormat::Zpl,
            _ => LabelFormat::Gif,
        };

        Ok(PurchasedLabel {
            tracking_number: package.tracking_number,
            label_data,
            label_format: purchased_format,
            cost,
            currency: results.shipment_charges.total_charges.currency_code,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct RatingResponse {
    #[serde(rename = "RateResponse")]
    rate_response: RateResponseBody,
}

#[derive(Debug, Deserialize)]
struct RateResponseBody {
    #[serde(rename = "RatedShipment", default)]
    rated_shipment: Vec<RatedShipment>,
}

#[derive(Debug, Deserialize)]
struct RatedShipment {
    #[serde(rename = "Service")]
    service: ServiceRef,
    #[serde(rename = "TotalCharges")]
    total_charges: Charges,
    #[serde(rename = "GuaranteedDelivery")]
    guaranteed_delivery: Option<GuaranteedDelivery>,
}

#[derive(Debug, Deserialize)]
struct ServiceRef {
    #[serde(rename = "Code")]
    code: String,
}

#[derive(Debug, Deserialize)]
struct Charges {
    #[serde(rename = "CurrencyCode")]
    currency_code: String,
    #[serde(rename = "MonetaryValue")]
    monetary_value: String,
}

#[derive(Debug, Deserialize)]
struct GuaranteedDelivery {
    #[serde(rename = "BusinessDaysInTransit")]
    business_days_in_transit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShipResponse {
    #[serde(rename = "ShipmentResponse")]
    shipment_response: ShipmentResponseBody,
}

#[derive(Debug, Deserialize)]
struct ShipmentResponseBody {
    #[serde(rename = "ShipmentResults")]
    shipment_results: ShipmentResults,
}

#[derive(Debug, Deserialize)]
struct ShipmentResults {
    #[serde(rename = "ShipmentCharges")]
    shipment_charges: ShipmentCharges,
    #[serde(rename = "PackageResults", default)]
    package_results: Vec<PackageResults>,
}

#[derive(Debug, Deserialize)]
struct ShipmentCharges {
    #[serde(rename = "TotalCharges")]
    total_charges: Charges,
}

#[derive(Debug, Deserialize)]
struct PackageResults {
    #[serde(rename = "TrackingNumber")]
    tracking_number: String,
    #[serde(rename = "ShippingLabel")]
    shipping_label: ShippingLabel,
}

#[derive(Debug, Deserialize)]
struct ShippingLabel {
    #[serde(rename = "GraphicImage")]
    graphic_image: String,
}
