//! Database models for users.

use crate::api::models::users::{Role, UserUpdate};
use crate::types::{CarrierId, CompanyId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub roles: Vec<Role>,
    pub company_id: Option<CompanyId>,
    pub carrier_id: Option<CarrierId>,
    pub active: bool,
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub roles: Option<Vec<Role>>,
    pub active: Option<bool>,
    pub carrier_id: Option<Option<CarrierId>>,
    pub password_hash: Option<String>,
}

impl UserUpdateDBRequest {
    pub fn new(update: UserUpdate) -> Self {
        Self {
            display_name: update.display_name,
            roles: update.roles,
            active: update.active,
            carrier_id: update.carrier_id,
            password_hash: None, // Regular updates don't include password changes
        }
    }
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub roles: Vec<Role>,
    pub company_id: Option<CompanyId>,
    pub carrier_id: Option<CarrierId>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
