//! Persistence entities and their response projections.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role every user holds.
pub const ROLE_USER: &str = "ROLE_USER";

/// Role allowed to act on any customer's users.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Maximum stored length of an email address.
pub const EMAIL_MAX_LEN: usize = 180;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub reference: String,
    pub price: Option<i64>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
}

/// A stored API user. Never serialized as-is: responses use
/// [`UserSummary`] or [`UserView`] so the password hash stays server side.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub roles: Vec<String>,
    pub password_hash: String,
    pub customer_id: Option<i64>,
}

impl User {
    /// Stored roles plus the implicit `ROLE_USER`, deduplicated.
    pub fn effective_roles(&self) -> Vec<String> {
        effective_roles(&self.roles)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            email: self.email.clone(),
            roles: self.effective_roles(),
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            roles: self.effective_roles(),
            customer_id: self.customer_id,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("password_hash", &"<redacted>")
            .field("customer_id", &self.customer_id)
            .finish()
    }
}

pub(crate) fn effective_roles(stored: &[String]) -> Vec<String> {
    let mut roles: Vec<String> = Vec::with_capacity(stored.len() + 1);
    for role in stored {
        if !roles.contains(role) {
            roles.push(role.clone());
        }
    }
    if !roles.iter().any(|r| r == ROLE_USER) {
        roles.push(ROLE_USER.to_string());
    }
    roles
}

/// Row of a customer's user listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub roles: Vec<String>,
}

/// User detail, as returned by `GET /api/users/{id}` and on creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub roles: Vec<String>,
    pub customer_id: Option<i64>,
}

/// Insert payload for a user; the id is assigned by the store.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub customer_id: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct NewCustomer {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub reference: String,
    pub price: Option<i64>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[&str]) -> User {
        User {
            id: 4,
            email: "jane@acme.test".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            password_hash: "$argon2id$secret".to_string(),
            customer_id: Some(2),
        }
    }

    #[test]
    fn test_effective_roles_adds_role_user() {
        assert_eq!(user(&[]).effective_roles(), vec![ROLE_USER.to_string()]);
        assert_eq!(
            user(&[ROLE_ADMIN]).effective_roles(),
            vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()]
        );
        assert_eq!(user(&[ROLE_USER]).effective_roles().len(), 1);
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let printed = format!("{:?}", user(&[ROLE_USER]));
        assert!(!printed.contains("secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_view_json_shape() {
        let json = serde_json::to_value(user(&[ROLE_USER]).view()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 4,
                "email": "jane@acme.test",
                "roles": ["ROLE_USER"],
                "customer_id": 2
            })
        );
    }
}
