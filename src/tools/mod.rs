//! Tool definitions and dispatch for the store-manager model.
//!
//! The tool set is fixed at startup: create a draft listing, fetch shop
//! analytics. Arguments are validated against the declared schema before any
//! request reaches the HTTP layer; unknown names and malformed arguments come
//! back as JSON error envelopes, never as faults.

use crate::errors::RelayError;
use crate::etsy::StoreApi;
use crate::types::{ListingDraft, ToolDefinition};
use serde_json::{json, Map, Value};
use tracing::warn;

pub const CREATE_DRAFT_LISTING: &str = "create_draft_listing";
pub const GET_SHOP_ANALYTICS: &str = "get_shop_analytics";

/// Verbatim reply for an unknown tool name.
pub const FUNCTION_NOT_FOUND: &str = r#"{"error": "Function not found."}"#;

/// Build the list of tool definitions exposed to the model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CREATE_DRAFT_LISTING.into(),
            description: "Create a new draft product listing on Etsy. Generate SEO optimized title, tags, and description.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "SEO optimized product title (max 140 chars)."
                    },
                    "description": {
                        "type": "string",
                        "description": "Detailed product description."
                    },
                    "price": {
                        "type": "number",
                        "description": "Price of the product."
                    },
                    "quantity": {
                        "type": "integer",
                        "description": "Number of items in stock."
                    },
                    "tags": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Array of 13 SEO tags."
                    }
                },
                "required": ["title", "description", "price", "quantity", "tags"]
            }),
        },
        ToolDefinition {
            name: GET_SHOP_ANALYTICS.into(),
            description: "Fetch the shop's sales and revenue analytics.".into(),
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

/// Execute a tool call by name, returning the serialized result for the
/// tool turn.
pub async fn execute_tool<S>(store: &S, name: &str, args: &Value) -> String
where
    S: StoreApi + ?Sized,
{
    let outcome = match name {
        CREATE_DRAFT_LISTING => match parse_listing_args(args) {
            Ok(draft) => store.create_draft_listing(&draft).await,
            Err(e) => {
                warn!("Rejected tool arguments: {e}");
                return error_envelope(&e.to_string());
            }
        },
        GET_SHOP_ANALYTICS => store.shop_analytics().await,
        _ => {
            warn!("Model requested unknown tool '{}'", name);
            return FUNCTION_NOT_FOUND.to_string();
        }
    };

    serde_json::to_string(&outcome)
        .unwrap_or_else(|_| error_envelope("failed to serialize tool result"))
}

fn error_envelope(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn dispatch_err(message: impl Into<String>) -> RelayError {
    RelayError::Dispatch(message.into())
}

/// Validate create-listing arguments against the declared schema.
fn parse_listing_args(args: &Value) -> Result<ListingDraft, RelayError> {
    let obj = args
        .as_object()
        .ok_or_else(|| dispatch_err("arguments must be a JSON object"))?;

    let title = required_str(obj, "title")?;
    let description = required_str(obj, "description")?;

    let price = obj
        .get("price")
        .and_then(Value::as_f64)
        .ok_or_else(|| dispatch_err("'price' must be a number"))?;
    if !(price > 0.0 && price.is_finite()) {
        return Err(dispatch_err("'price' must be a positive number"));
    }

    let quantity = obj
        .get("quantity")
        .and_then(Value::as_u64)
        .ok_or_else(|| dispatch_err("'quantity' must be a non-negative integer"))?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| dispatch_err("'quantity' is out of range"))?;

    let tags = obj
        .get("tags")
        .and_then(Value::as_array)
        .ok_or_else(|| dispatch_err("'tags' must be an array"))?
        .iter()
        .map(|tag| {
            tag.as_str()
                .map(str::to_string)
                .ok_or_else(|| dispatch_err("'tags' entries must be strings"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ListingDraft { title, description, price, quantity, tags })
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String, RelayError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| dispatch_err(format!("'{key}' must be a string")))
}
