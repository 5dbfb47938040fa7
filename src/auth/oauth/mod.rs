//! Provider adapters and the login orchestrator

pub mod facebook;
pub mod google;
pub mod instagram;
pub mod provider;
pub mod service;
pub mod telegram;
pub mod verifier;

pub use provider::{ExternalProfile, ProviderAdapter, ProviderTokens};
pub use service::{AuthorizeResponse, OAuthService};
