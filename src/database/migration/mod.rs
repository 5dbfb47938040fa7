use sea_orm_migration::prelude::*;

pub use sea_orm_migration::MigratorTrait;

mod m20250301_100000_create_users_table;
mod m20250301_100100_create_oauth_links_table;
mod m20250301_100200_create_refresh_tokens_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_100000_create_users_table::Migration),
            Box::new(m20250301_100100_create_oauth_links_table::Migration),
            Box::new(m20250301_100200_create_refresh_tokens_table::Migration),
        ]
    }
}

/// Common table and column identifiers
#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    Password,
    Role,
    FirstName,
    LastName,
    AvatarUrl,
    Bio,
    Birthday,
    Active,
    Approved,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum OauthLinks {
    Table,
    Id,
    UserId,
    GoogleId,
    FacebookId,
    InstagramId,
    TelegramId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    TokenHash,
    UserId,
    CreatedAt,
    ExpiresAt,
    RevokedAt,
}
