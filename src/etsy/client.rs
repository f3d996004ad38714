//! Etsy Open API v3 client for draft listings and sales analytics.
//!
//! Every outcome, including transport failures and non-2xx responses, is
//! folded into a `StoreOutcome` envelope at this boundary. The envelope flows
//! back through the dispatcher into the conversation so the model can narrate
//! failures to the user; nothing escapes as an error.

use crate::errors::RelayError;
use crate::types::{ListingDraft, ShopAnalytics, StoreOutcome};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use ulid::Ulid;

/// Etsy listing titles are capped at 140 characters.
const TITLE_MAX_CHARS: usize = 140;

/// Etsy accepts at most 13 tags per listing.
const TAG_LIMIT: usize = 13;

const FALLBACK_CURRENCY: &str = "USD";

/// Marketplace operations, substitutable with a fake in tests.
///
/// Implementations must not return errors; failures are reported through the
/// envelope.
#[async_trait]
pub trait StoreApi: Send + Sync {
    /// Create a draft listing in the connected shop.
    ///
    /// Not idempotent at the marketplace: two identical calls create two
    /// drafts. Each request carries a generated idempotency key so duplicates
    /// can at least be traced.
    async fn create_draft_listing(&self, draft: &ListingDraft) -> StoreOutcome;

    /// Fetch recent sales receipts and summarize them. Read-only.
    async fn shop_analytics(&self) -> StoreOutcome;
}

/// Etsy Open API client.
#[derive(Debug, Clone)]
pub struct EtsyClient {
    base_url: String,
    api_key: String,
    shop_id: String,
    access_token: String,
    http: reqwest::Client,
}

// -- Receipt response types -------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReceiptsResponse {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    results: Vec<Receipt>,
}

#[derive(Debug, Default, Deserialize)]
struct Receipt {
    #[serde(default)]
    grandtotal: Money,
}

#[derive(Debug, Deserialize)]
struct Money {
    #[serde(default)]
    amount: f64,
    #[serde(default = "default_divisor")]
    divisor: f64,
    #[serde(default)]
    currency_code: Option<String>,
}

impl Default for Money {
    fn default() -> Self {
        Self { amount: 0.0, divisor: 1.0, currency_code: None }
    }
}

fn default_divisor() -> f64 {
    1.0
}

impl EtsyClient {
    /// Create a new Etsy client for one shop.
    pub fn new(base_url: &str, api_key: &str, shop_id: &str, access_token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            shop_id: shop_id.to_string(),
            access_token: access_token.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn post_listing(&self, draft: &ListingDraft) -> Result<Value, RelayError> {
        let url = format!("{}/shops/{}/listings", self.base_url, self.shop_id);
        let idempotency_key = Ulid::new().to_string();

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .bearer_auth(&self.access_token)
            .header("x-idempotency-key", &idempotency_key)
            .form(&listing_form(draft))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if !(200..300).contains(&status) {
            return Err(RelayError::Provider { status, body });
        }

        let data = serde_json::from_str(&body).map_err(|e| RelayError::Provider {
            status,
            body: format!("undecodable listing response: {e}"),
        })?;

        debug!("Created draft listing (idempotency key {})", idempotency_key);
        Ok(data)
    }

    async fn fetch_receipts(&self) -> Result<ReceiptsResponse, RelayError> {
        let url = format!("{}/shops/{}/receipts", self.base_url, self.shop_id);

        let resp = self
            .http
            .get(&url)
            .header("x-api-key", &self.api_key)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if !(200..300).contains(&status) {
            return Err(RelayError::Provider { status, body });
        }

        serde_json::from_str(&body).map_err(|e| RelayError::Provider {
            status,
            body: format!("undecodable receipts response: {e}"),
        })
    }
}

#[async_trait]
impl StoreApi for EtsyClient {
    async fn create_draft_listing(&self, draft: &ListingDraft) -> StoreOutcome {
        match self.post_listing(draft).await {
            Ok(data) => {
                let mut payload = Map::new();
                payload.insert("data".into(), data);
                StoreOutcome::success(payload)
            }
            Err(e) => {
                warn!("Listing creation failed: {e}");
                StoreOutcome::error(e.to_string())
            }
        }
    }

    async fn shop_analytics(&self) -> StoreOutcome {
        match self.fetch_receipts().await {
            Ok(receipts) => {
                let summary = summarize_receipts(receipts.count, &receipts.results);
                match serde_json::to_value(&summary) {
                    Ok(Value::Object(payload)) => StoreOutcome::success(payload),
                    _ => StoreOutcome::error("failed to encode analytics summary"),
                }
            }
            Err(e) => {
                warn!("Receipts fetch failed: {e}");
                StoreOutcome::error(e.to_string())
            }
        }
    }
}

/// Build the form-urlencoded body for a create-listing request.
///
/// Title is truncated to 140 characters and tags to the first 13, joined by
/// commas. Listing state is fixed to draft.
fn listing_form(draft: &ListingDraft) -> Vec<(&'static str, String)> {
    let tags = draft
        .tags
        .iter()
        .take(TAG_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");

    vec![
        ("title", truncate_chars(&draft.title, TITLE_MAX_CHARS)),
        ("description", draft.description.clone()),
        ("price", draft.price.to_string()),
        ("quantity", draft.quantity.to_string()),
        ("who_made", "i_did".into()),
        ("when_made", "2020_2026".into()),
        ("taxonomy_id", "1".into()),
        ("state", "draft".into()),
        ("is_supply", "false".into()),
        ("tags", tags),
    ]
}

/// Sum receipt totals into an analytics summary.
///
/// Each receipt's grand total is a minor-unit amount with a currency-specific
/// divisor; a non-positive divisor counts the amount as-is. The currency code
/// comes from the first receipt, falling back to USD when none exist.
fn summarize_receipts(count: u64, receipts: &[Receipt]) -> ShopAnalytics {
    let revenue = receipts
        .iter()
        .map(|r| {
            if r.grandtotal.divisor > 0.0 {
                r.grandtotal.amount / r.grandtotal.divisor
            } else {
                r.grandtotal.amount
            }
        })
        .sum();

    let currency = receipts
        .first()
        .and_then(|r| r.grandtotal.currency_code.clone())
        .unwrap_or_else(|| FALLBACK_CURRENCY.into());

    ShopAnalytics { total_sales: count, revenue, currency }
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
