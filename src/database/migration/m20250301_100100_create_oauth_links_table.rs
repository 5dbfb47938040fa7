use super::{OauthLinks, Users};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OauthLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthLinks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OauthLinks::UserId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(OauthLinks::GoogleId).string().null())
                    .col(ColumnDef::new(OauthLinks::FacebookId).string().null())
                    .col(ColumnDef::new(OauthLinks::InstagramId).string().null())
                    .col(ColumnDef::new(OauthLinks::TelegramId).string().null())
                    .col(
                        ColumnDef::new(OauthLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthLinks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth_links_user_id")
                            .from(OauthLinks::Table, OauthLinks::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // A provider identity may only ever belong to one account.
        for (name, column) in [
            ("idx_oauth_links_google_id", OauthLinks::GoogleId),
            ("idx_oauth_links_facebook_id", OauthLinks::FacebookId),
            ("idx_oauth_links_instagram_id", OauthLinks::InstagramId),
            ("idx_oauth_links_telegram_id", OauthLinks::TelegramId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(OauthLinks::Table)
                        .col(column)
                        .unique()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OauthLinks::Table).to_owned())
            .await
    }
}
