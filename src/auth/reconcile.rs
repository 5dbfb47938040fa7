use crate::auth::oauth::provider::ExternalProfile;
use crate::database::entities::{OauthLinkRecord, Role, UserRecord};
use crate::database::{DatabaseError, LinksDao, UsersDao};
use crate::error::AppError;
use chrono::Utc;

/// Maps a verified external identity onto exactly one local account.
///
/// Resolution precedence: provider identifier first, then asserted email,
/// then account creation. Profile fields the provider supplies overwrite the
/// stored values; fields it omits are left untouched.
#[derive(Clone)]
pub struct ReconciliationEngine {
    users: UsersDao,
    links: LinksDao,
    /// Domain for synthetic placeholder emails.
    app_domain: String,
}

impl ReconciliationEngine {
    pub fn new(users: UsersDao, links: LinksDao, app_domain: String) -> Self {
        Self {
            users,
            links,
            app_domain,
        }
    }

    pub async fn resolve(
        &self,
        profile: &ExternalProfile,
        requested_role: Role,
    ) -> Result<UserRecord, AppError> {
        // 1. Returning identity: the provider id is already linked.
        if let Some(link) = self
            .links
            .find_by_provider(profile.provider, &profile.provider_id)
            .await?
        {
            let user = self
                .users
                .find_by_id(link.user_id)
                .await?
                .ok_or(DatabaseError::NotFound)?;
            return self.refresh_profile(user, profile).await;
        }

        // 2. Known email: attach this provider to the existing account.
        if let Some(email) = &profile.email {
            if let Some(user) = self.users.find_by_email(email).await? {
                return self.attach(user, profile).await;
            }
        }

        // 3. New account.
        self.create(profile, requested_role).await
    }

    async fn attach(
        &self,
        user: UserRecord,
        profile: &ExternalProfile,
    ) -> Result<UserRecord, AppError> {
        match self.links.find_by_user_id(user.id).await? {
            // An account already federated with some provider cannot be
            // silently claimed through an email collision.
            Some(_) => Err(AppError::EmailAlreadyLinked),
            None => {
                let link = OauthLinkRecord::new(user.id, profile.provider, &profile.provider_id);
                self.links.insert(&link).await?;

                tracing::info!(
                    user_id = user.id,
                    provider = %profile.provider,
                    "Attached provider identity to existing account"
                );

                self.refresh_profile(user, profile).await
            }
        }
    }

    async fn create(
        &self,
        profile: &ExternalProfile,
        requested_role: Role,
    ) -> Result<UserRecord, AppError> {
        let email = profile
            .email
            .clone()
            .unwrap_or_else(|| self.synthetic_email(profile));

        let now = Utc::now();
        let user = UserRecord {
            id: 0,
            email,
            password: String::new(),
            role: requested_role,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            bio: profile.bio.clone(),
            birthday: profile.birthday.clone(),
            active: true,
            approved: true,
            created_at: now,
            updated_at: now,
        };

        match self
            .users
            .create_with_link(&user, profile.provider, &profile.provider_id)
            .await
        {
            Ok(created) => {
                tracing::info!(
                    user_id = created.id,
                    provider = %profile.provider,
                    "Created account for external identity"
                );
                Ok(created)
            }
            // Lost a creation race. Some concurrent login inserted a row
            // with this provider id or email first; resolve against it.
            Err(DatabaseError::Constraint(message)) => {
                tracing::debug!(
                    provider = %profile.provider,
                    "Account creation raced, re-resolving: {message}"
                );
                self.resolve_after_race(profile).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_after_race(&self, profile: &ExternalProfile) -> Result<UserRecord, AppError> {
        if let Some(link) = self
            .links
            .find_by_provider(profile.provider, &profile.provider_id)
            .await?
        {
            let user = self
                .users
                .find_by_id(link.user_id)
                .await?
                .ok_or(DatabaseError::NotFound)?;
            return self.refresh_profile(user, profile).await;
        }

        if let Some(email) = &profile.email {
            if let Some(user) = self.users.find_by_email(email).await? {
                return self.attach(user, profile).await;
            }
        }

        Err(AppError::Internal(
            "Account creation failed without a conflicting row".to_string(),
        ))
    }

    /// Carry supplied profile fields from the provider assertion into the
    /// account. Absent fields never erase stored data.
    async fn refresh_profile(
        &self,
        user: UserRecord,
        profile: &ExternalProfile,
    ) -> Result<UserRecord, AppError> {
        let updated = self
            .users
            .update_profile(
                &user,
                profile.first_name.clone(),
                profile.last_name.clone(),
                profile.avatar_url.clone(),
                profile.bio.clone(),
                profile.birthday.clone(),
            )
            .await?;
        Ok(updated)
    }

    fn synthetic_email(&self, profile: &ExternalProfile) -> String {
        format!(
            "{}_{}@{}",
            profile.provider, profile.provider_id, self.app_domain
        )
    }
}
