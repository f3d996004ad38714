//! Error taxonomy for the relay.
//!
//! Marketplace failures are caught at the client boundary and folded into a
//! `StoreOutcome` error envelope so the model can narrate them; faults during
//! the LLM exchange itself surface as a plain-text error reply. Nothing is
//! allowed to propagate uncaught into the polling loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Network-level failure reaching an external API.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status or malformed response body from an external API.
    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    /// Unknown tool name or arguments that fail schema validation.
    #[error("dispatch failure: {0}")]
    Dispatch(String),

    /// Missing required credential, detected at startup. Non-fatal.
    #[error("missing configuration: {0}")]
    Config(&'static str),
}
