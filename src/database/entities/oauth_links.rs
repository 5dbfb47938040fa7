use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// External identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Facebook,
    Instagram,
    Telegram,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Facebook => "facebook",
            ProviderKind::Instagram => "instagram",
            ProviderKind::Telegram => "telegram",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "google" => Some(ProviderKind::Google),
            "facebook" => Some(ProviderKind::Facebook),
            "instagram" => Some(ProviderKind::Instagram),
            "telegram" => Some(ProviderKind::Telegram),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most one link record per account, at most one identifier per provider.
/// Each identifier column carries its own unique index so a provider identity
/// can never be attached to two accounts.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_id: i32,
    #[sea_orm(unique)]
    pub google_id: Option<String>,
    #[sea_orm(unique)]
    pub facebook_id: Option<String>,
    #[sea_orm(unique)]
    pub instagram_id: Option<String>,
    #[sea_orm(unique)]
    pub telegram_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(user_id: i32, kind: ProviderKind, provider_id: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut link = Self {
            id: 0,
            user_id,
            google_id: None,
            facebook_id: None,
            instagram_id: None,
            telegram_id: None,
            created_at: now,
            updated_at: now,
        };
        link.set_provider_id(kind, provider_id.into());
        link
    }

    pub fn provider_id(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Google => self.google_id.as_deref(),
            ProviderKind::Facebook => self.facebook_id.as_deref(),
            ProviderKind::Instagram => self.instagram_id.as_deref(),
            ProviderKind::Telegram => self.telegram_id.as_deref(),
        }
    }

    pub fn set_provider_id(&mut self, kind: ProviderKind, provider_id: String) {
        match kind {
            ProviderKind::Google => self.google_id = Some(provider_id),
            ProviderKind::Facebook => self.facebook_id = Some(provider_id),
            ProviderKind::Instagram => self.instagram_id = Some(provider_id),
            ProviderKind::Telegram => self.telegram_id = Some(provider_id),
        }
    }
}

/// Column holding the identifier for a given provider.
pub fn provider_column(kind: ProviderKind) -> Column {
    match kind {
        ProviderKind::Google => Column::GoogleId,
        ProviderKind::Facebook => Column::FacebookId,
        ProviderKind::Instagram => Column::InstagramId,
        ProviderKind::Telegram => Column::TelegramId,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("google"), Some(ProviderKind::Google));
        assert_eq!(
            ProviderKind::parse("telegram"),
            Some(ProviderKind::Telegram)
        );
        assert_eq!(ProviderKind::parse("github"), None);
    }

    #[test]
    fn test_link_provider_id_roundtrip() {
        let link = Model::new(7, ProviderKind::Facebook, "fb-123");
        assert_eq!(link.provider_id(ProviderKind::Facebook), Some("fb-123"));
        assert_eq!(link.provider_id(ProviderKind::Google), None);
        assert_eq!(link.user_id, 7);
    }
}
