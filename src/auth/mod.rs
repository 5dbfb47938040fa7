//! Authentication: JWT issuance, OAuth login flows, and session handling

pub mod credentials;
pub mod jwt;
pub mod middleware;
pub mod oauth;
pub mod reconcile;
pub mod state;

pub use credentials::{CredentialIssuer, IssuedCredentials};
pub use jwt::{AccessClaims, JwtService, JwtServiceImpl};
pub use reconcile::ReconciliationEngine;
pub use state::StateStore;
