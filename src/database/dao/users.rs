use crate::database::dao::links::link_active_model;
use crate::database::entities::{ProviderKind, UserRecord, oauth_links, users};
use crate::database::{DatabaseResult, map_db_err};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};

/// Users DAO for database operations
#[derive(Clone)]
pub struct UsersDao {
    db: DatabaseConnection,
}

impl UsersDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Find user by ID
    pub async fn find_by_id(&self, user_id: i32) -> DatabaseResult<Option<UserRecord>> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(user)
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<UserRecord>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(user)
    }

    /// Insert a new user and return the stored record
    pub async fn insert(&self, user: &UserRecord) -> DatabaseResult<UserRecord> {
        let active_model = active_model_from(user);

        let inserted = active_model.insert(&self.db).await.map_err(map_db_err)?;

        Ok(inserted)
    }

    /// Create a new user together with its provider link in a single
    /// transaction. Either both rows land or neither does.
    pub async fn create_with_link(
        &self,
        user: &UserRecord,
        provider: ProviderKind,
        provider_id: &str,
    ) -> DatabaseResult<UserRecord> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let inserted = active_model_from(user)
            .insert(&txn)
            .await
            .map_err(map_db_err)?;

        let link = oauth_links::Model::new(inserted.id, provider, provider_id);
        link_active_model(&link).insert(&txn).await.map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;

        Ok(inserted)
    }

    /// Refresh profile fields from provider data. Supplied values overwrite,
    /// absent values never erase what is stored.
    pub async fn update_profile(
        &self,
        user: &UserRecord,
        first_name: Option<String>,
        last_name: Option<String>,
        avatar_url: Option<String>,
        bio: Option<String>,
        birthday: Option<String>,
    ) -> DatabaseResult<UserRecord> {
        let mut active_model = users::ActiveModel {
            id: Set(user.id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        let mut changed = false;
        if first_name.is_some() && first_name != user.first_name {
            active_model.first_name = Set(first_name);
            changed = true;
        }
        if last_name.is_some() && last_name != user.last_name {
            active_model.last_name = Set(last_name);
            changed = true;
        }
        if avatar_url.is_some() && avatar_url != user.avatar_url {
            active_model.avatar_url = Set(avatar_url);
            changed = true;
        }
        if bio.is_some() && bio != user.bio {
            active_model.bio = Set(bio);
            changed = true;
        }
        if birthday.is_some() && birthday != user.birthday {
            active_model.birthday = Set(birthday);
            changed = true;
        }

        if !changed {
            return Ok(user.clone());
        }

        let updated = active_model.update(&self.db).await.map_err(map_db_err)?;

        Ok(updated)
    }
}

fn active_model_from(user: &UserRecord) -> users::ActiveModel {
    users::ActiveModel {
        id: ActiveValue::NotSet,
        email: Set(user.email.clone()),
        password: Set(user.password.clone()),
        role: Set(user.role),
        first_name: Set(user.first_name.clone()),
        last_name: Set(user.last_name.clone()),
        avatar_url: Set(user.avatar_url.clone()),
        bio: Set(user.bio.clone()),
        birthday: Set(user.birthday.clone()),
        active: Set(user.active),
        approved: Set(user.approved),
        created_at: Set(user.created_at),
        updated_at: Set(user.updated_at),
    }
}
