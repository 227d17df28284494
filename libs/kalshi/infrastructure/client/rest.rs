//! REST trading client for the communications API
//!
//! Covers the calls the quoter needs: creating, confirming, and deleting
//! quotes, plus the startup RFQ backfill. Every request carries signed
//! headers; prices cross the wire as 4-dp decimal strings.

use crate::domain::models::wire_price;
use crate::infrastructure::client::auth::{AuthError, KalshiSigner};
use crate::infrastructure::client::feed::types::RfqPayload;
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const COMMUNICATIONS_QUOTES: &str = "/trade-api/v2/communications/quotes";
const COMMUNICATIONS_RFQS: &str = "/trade-api/v2/communications/rfqs";
const CONFIRM_ATTEMPTS: usize = 3;
const CONFIRM_RETRY_WAIT: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum RestError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited")]
    RateLimited,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type Result<T> = std::result::Result<T, RestError>;

/// Response to a successful quote creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedQuote {
    pub quote_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateQuoteResponse {
    #[serde(default)]
    quote: Option<CreatedQuote>,
    #[serde(default)]
    quote_id: Option<String>,
}

/// One page of the RFQ backfill
#[derive(Debug, Deserialize)]
pub struct RfqsPage {
    #[serde(default)]
    pub rfqs: Vec<RfqPayload>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Authenticated REST client for quote management
pub struct TradingClient {
    http: reqwest::Client,
    base_url: String,
    signer: Arc<KalshiSigner>,
}

impl TradingClient {
    pub fn new(base_url: impl Into<String>, signer: Arc<KalshiSigner>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    /// Submit a quote for an RFQ
    pub async fn create_quote(
        &self,
        rfq_id: &str,
        yes_bid: Decimal,
        no_bid: Decimal,
        rest_remainder: bool,
    ) -> Result<CreatedQuote> {
        let body = json!({
            "rfq_id": rfq_id,
            "yes_bid": wire_price(yes_bid),
            "no_bid": wire_price(no_bid),
            "rest_remainder": rest_remainder,
        });

        info!("Creating quote for RFQ {}: {}", rfq_id, body);
        let response: CreateQuoteResponse = self
            .request(Method::POST, COMMUNICATIONS_QUOTES, Some(body))
            .await?;

        // Some responses nest the quote, some are flat
        let quote_id = response
            .quote
            .map(|q| q.quote_id)
            .or(response.quote_id)
            .ok_or_else(|| RestError::Api {
                status: 201,
                body: "create response carried no quote id".to_string(),
            })?;

        Ok(CreatedQuote { quote_id })
    }

    /// Confirm an accepted quote, retrying transient failures
    pub async fn confirm_quote(&self, quote_id: &str) -> Result<()> {
        let path = format!("{}/{}/confirm", COMMUNICATIONS_QUOTES, quote_id);
        let mut attempt = 1;

        loop {
            match self
                .request::<serde_json::Value>(Method::POST, &path, None)
                .await
            {
                Ok(_) => {
                    info!("Quote {} confirmed (attempt {})", quote_id, attempt);
                    return Ok(());
                }
                Err(e) if attempt < CONFIRM_ATTEMPTS => {
                    warn!(
                        "Confirm attempt {}/{} failed for quote {}: {}",
                        attempt, CONFIRM_ATTEMPTS, quote_id, e
                    );
                    attempt += 1;
                    tokio::time::sleep(CONFIRM_RETRY_WAIT).await;
                }
                Err(e) => {
                    warn!(
                        "All {} confirmation attempts failed for quote {}",
                        CONFIRM_ATTEMPTS, quote_id
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Withdraw a resting quote
    pub async fn delete_quote(&self, quote_id: &str) -> Result<()> {
        let path = format!("{}/{}", COMMUNICATIONS_QUOTES, quote_id);
        self.request::<serde_json::Value>(Method::DELETE, &path, None)
            .await?;
        Ok(())
    }

    /// Fetch one page of currently-open RFQs (startup backfill)
    pub async fn get_rfqs(&self, cursor: Option<&str>) -> Result<RfqsPage> {
        let path = match cursor {
            Some(c) => format!("{}?cursor={}", COMMUNICATIONS_RFQS, c),
            None => COMMUNICATIONS_RFQS.to_string(),
        };
        self.request(Method::GET, &path, None).await
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        // Signature covers the path without its query string
        let headers = self.signer.auth_headers(method.as_str(), path)?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method, &url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("KALSHI-ACCESS-KEY", &headers.key_id)
            .header("KALSHI-ACCESS-TIMESTAMP", headers.timestamp_ms.to_string())
            .header("KALSHI-ACCESS-SIGNATURE", &headers.signature);

        if let Some(json_body) = body {
            request = request.json(&json_body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RestError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Api {
                status: status.as_u16(),
                body,
            });
        }

        // Some endpoints return an empty body on success
        let text = response.text().await?;
        if text.trim().is_empty() {
            return serde_json::from_value(serde_json::Value::Object(Default::default()))
                .map_err(|e| RestError::Api {
                    status: status.as_u16(),
                    body: format!("empty body could not satisfy response type: {}", e),
                });
        }

        serde_json::from_str(&text).map_err(|e| RestError::Api {
            status: status.as_u16(),
            body: format!("malformed response: {} ({})", e, text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_response_accepts_nested_and_flat_shapes() {
        let nested: CreateQuoteResponse =
            serde_json::from_str(r#"{"quote": {"quote_id": "q-1"}}"#).unwrap();
        assert_eq!(nested.quote.unwrap().quote_id, "q-1");

        let flat: CreateQuoteResponse = serde_json::from_str(r#"{"quote_id": "q-2"}"#).unwrap();
        assert_eq!(flat.quote_id.as_deref(), Some("q-2"));
    }

    #[test]
    fn rfq_page_decodes_with_cursor() {
        let page: RfqsPage = serde_json::from_str(
            r#"{"rfqs": [{"id": "r-1", "contracts": 5}], "cursor": "next"}"#,
        )
        .unwrap();
        assert_eq!(page.rfqs.len(), 1);
        assert_eq!(page.rfqs[0].id, "r-1");
        assert_eq!(page.cursor.as_deref(), Some("next"));
    }
}
