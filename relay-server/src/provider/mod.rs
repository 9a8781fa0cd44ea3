//! Provider module for outbound calls to the verification API.
//!
//! Every call carries the token header and the API version prefix. Non-2xx
//! answers are normalized into [`ProviderError::Status`].

pub mod client;
pub mod error;

pub use client::{ProviderApi, ProviderClient};
pub use error::ProviderError;
