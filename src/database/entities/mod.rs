//! Database entities for the identity service

pub mod oauth_links;
pub mod refresh_tokens;
pub mod users;

pub use oauth_links::{Entity as OauthLinks, ProviderKind, provider_column};
pub use refresh_tokens::Entity as RefreshTokens;
pub use users::{Entity as Users, Role};

pub type UserRecord = users::Model;
pub type OauthLinkRecord = oauth_links::Model;
pub type RefreshTokenRecord = refresh_tokens::Model;
