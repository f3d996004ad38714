mod client;

pub use client::{EtsyClient, StoreApi};
