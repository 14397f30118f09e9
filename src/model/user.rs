use serde::{Deserialize, Serialize};
use std::fmt::Display;
use storefront_kit::Document;

/// Type-safe identifier for Users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Payload for registering a user.
#[derive(Debug, Clone)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
}

/// Partial update; `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub id: Option<UserId>,
    pub email: Option<String>,
}

impl UserFilter {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }
}

impl Document for User {
    type Id = UserId;
    type Filter = UserFilter;
    type Patch = UserUpdate;

    const KIND: &'static str = "user";

    fn id(&self) -> &UserId {
        &self.id
    }

    fn by_id(id: UserId) -> UserFilter {
        UserFilter {
            id: Some(id),
            ..Default::default()
        }
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        filter.id.map_or(true, |id| id == self.id)
            && filter.email.as_ref().map_or(true, |e| e.eq_ignore_ascii_case(&self.email))
    }

    fn apply(&mut self, patch: UserUpdate) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }
}
