use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, sea_query::StringLen};
use serde::{Deserialize, Serialize};

/// Marketplace account role. Requested at login time; anything unrecognized
/// falls back to the unprivileged default.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[derive(Default)]
pub enum Role {
    #[sea_orm(string_value = "client")]
    #[serde(rename = "client")]
    #[default]
    Client,
    #[sea_orm(string_value = "master")]
    #[serde(rename = "master")]
    Master,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Master => "master",
        }
    }

    /// Lenient parse: absent or unrecognized values yield the default role.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("master") => Role::Master,
            Some("client") => Role::Client,
            _ => Role::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    /// Empty string sentinel for OAuth-only accounts.
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub birthday: Option<String>,
    pub active: bool,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::oauth_links::Entity")]
    OauthLink,
}

impl Related<super::oauth_links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OauthLink.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Default for Model {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Auto-assigned by the database
            email: String::new(),
            password: String::new(),
            role: Role::default(),
            first_name: None,
            last_name: None,
            avatar_url: None,
            bio: None,
            birthday: None,
            active: false,
            approved: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Model {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
            ..Default::default()
        }
    }

    pub fn with_activated(mut self, active: bool, approved: bool) -> Self {
        self.active = active;
        self.approved = approved;
        self
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_or_default() {
        assert_eq!(Role::parse_or_default(Some("master")), Role::Master);
        assert_eq!(Role::parse_or_default(Some("client")), Role::Client);
        assert_eq!(Role::parse_or_default(Some("admin")), Role::Client);
        assert_eq!(Role::parse_or_default(None), Role::Client);
    }

    #[test]
    fn test_password_not_serialized() {
        let user = Model {
            email: "a@x.com".to_string(),
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));
        assert!(json.contains("a@x.com"));
    }
}
