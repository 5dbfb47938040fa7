use crate::database::entities::{OauthLinkRecord, ProviderKind, oauth_links, provider_column};
use crate::database::{DatabaseResult, map_db_err};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

/// Provider links DAO for database operations
#[derive(Clone)]
pub struct LinksDao {
    db: DatabaseConnection,
}

impl LinksDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Find the link row owned by a user, if any
    pub async fn find_by_user_id(&self, user_id: i32) -> DatabaseResult<Option<OauthLinkRecord>> {
        let link = oauth_links::Entity::find()
            .filter(oauth_links::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(link)
    }

    /// Find a link by provider identifier
    pub async fn find_by_provider(
        &self,
        provider: ProviderKind,
        provider_id: &str,
    ) -> DatabaseResult<Option<OauthLinkRecord>> {
        let link = oauth_links::Entity::find()
            .filter(provider_column(provider).eq(provider_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(link)
    }

    /// Insert a new link row for a user
    pub async fn insert(&self, link: &OauthLinkRecord) -> DatabaseResult<OauthLinkRecord> {
        let inserted = link_active_model(link)
            .insert(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(inserted)
    }
}

pub(crate) fn link_active_model(link: &OauthLinkRecord) -> oauth_links::ActiveModel {
    oauth_links::ActiveModel {
        id: ActiveValue::NotSet,
        user_id: Set(link.user_id),
        google_id: Set(link.google_id.clone()),
        facebook_id: Set(link.facebook_id.clone()),
        instagram_id: Set(link.instagram_id.clone()),
        telegram_id: Set(link.telegram_id.clone()),
        created_at: Set(link.created_at),
        updated_at: Set(link.updated_at),
    }
}
