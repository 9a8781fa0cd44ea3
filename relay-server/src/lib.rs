//! IdRelay - relay between client apps and an identity-verification provider.
//!
//! ## Architecture
//!
//! ```text
//! Provider webhooks → Reconciler → RunStore ─┐
//!                                            ├→ RunAggregator → GET /api/workflow_runs/:id
//! Provider REST API ← ProviderClient ────────┘
//! ```

pub mod aggregate;
pub mod config;
pub mod provider;
pub mod reconcile;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use aggregate::{RunAggregator, RunView};
pub use config::{Config, ConfigError, MergePrecedence};
pub use provider::{ProviderApi, ProviderClient, ProviderError};
pub use reconcile::{DiscardReason, IngestOutcome, Reconciler};
pub use store::{MemoryRunStore, RunRecord, RunStore};
pub use web::{router, AppState};
