//! Domain-specific DAOs

pub mod links;
pub mod refresh_tokens;
pub mod users;

pub use links::LinksDao;
pub use refresh_tokens::RefreshTokensDao;
pub use users::UsersDao;
