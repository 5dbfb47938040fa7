use crate::database::entities::{RefreshTokenRecord, refresh_tokens};
use crate::database::{DatabaseError, DatabaseResult, map_db_err};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

/// Refresh tokens DAO for database operations
#[derive(Clone)]
pub struct RefreshTokensDao {
    db: DatabaseConnection,
}

impl RefreshTokensDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Store a new refresh token record
    pub async fn store(&self, token: &RefreshTokenRecord) -> DatabaseResult<RefreshTokenRecord> {
        let active_model = refresh_tokens::ActiveModel {
            id: ActiveValue::NotSet,
            token_hash: Set(token.token_hash.clone()),
            user_id: Set(token.user_id),
            created_at: Set(token.created_at),
            expires_at: Set(token.expires_at),
            revoked_at: Set(token.revoked_at),
        };

        let stored = active_model.insert(&self.db).await.map_err(map_db_err)?;

        Ok(stored)
    }

    /// Get refresh token by hash
    pub async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> DatabaseResult<Option<RefreshTokenRecord>> {
        let token = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::TokenHash.eq(token_hash))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(token)
    }

    /// Revoke refresh token
    pub async fn revoke(&self, token_hash: &str) -> DatabaseResult<()> {
        let token = self
            .find_by_hash(token_hash)
            .await?
            .ok_or(DatabaseError::NotFound)?;

        let active_model = refresh_tokens::ActiveModel {
            id: Set(token.id),
            revoked_at: Set(Some(Utc::now())),
            ..Default::default()
        };

        active_model.update(&self.db).await.map_err(map_db_err)?;

        Ok(())
    }

    /// Delete every refresh token belonging to a user
    pub async fn delete_all_for_user(&self, user_id: i32) -> DatabaseResult<u64> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected)
    }

    /// Clean up expired tokens
    pub async fn cleanup_expired(&self) -> DatabaseResult<u64> {
        let now = Utc::now();
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected)
    }
}
