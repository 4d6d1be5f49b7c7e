//! API request/response models for users and roles.

use crate::api::models::pagination::Pagination;
use crate::db::models::users::UserDBResponse;
use crate::errors::Error;
use crate::types::{CarrierId, CompanyId, UserId};
use crate::validation::{Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Roles map one-to-one onto the dashboard panels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform-wide administration
    Admin,
    /// Day-to-day fleet operations of one company
    Operator,
    /// The tenant's own administrator, including its users and costs
    CompanyManager,
    /// A subcontractor's view of the routes, trips, drivers and vehicles it operates
    Carrier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::CompanyManager => "company_manager",
            Role::Carrier => "carrier",
        }
    }
}

/// The authenticated caller, as resolved from a session token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub roles: Vec<Role>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            roles: user.roles,
            company_id: user.company_id,
            carrier_id: user.carrier_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub email: String,
    pub display_name: Option<String>,
    /// Initial password; users without one cannot log in until it is set
    pub password: Option<String>,
    pub roles: Vec<Role>,
    /// Defaults to the caller's company for non-admin callers
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
}

impl Validate for UserCreate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.email("email", Some(&self.email));
        errors.require_non_blank_opt("display_name", self.display_name.as_deref());
        if self.roles.is_empty() {
            errors.add("roles", "must contain at least one role");
        }
        if self.roles.contains(&Role::Carrier) && self.carrier_id.is_none() {
            errors.add("carrier_id", "is required for carrier users");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub roles: Option<Vec<Role>>,
    pub active: Option<bool>,
    /// `null` detaches the user from its carrier
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<Option<CarrierId>>,
}

impl Validate for UserUpdate {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank_opt("display_name", self.display_name.as_deref());
        if let Some(roles) = &self.roles
            && roles.is_empty()
        {
            errors.add("roles", "must contain at least one role");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub roles: Vec<Role>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub carrier_id: Option<CarrierId>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            display_name: db.display_name,
            roles: db.roles,
            company_id: db.company_id,
            carrier_id: db.carrier_id,
            active: db.active,
            last_login: db.last_login,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing users
#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on email and display name
    pub search: Option<String>,

    pub role: Option<Role>,

    /// Only honoured for admins; everyone else is limited to their company
    #[param(value_type = Option<String>, format = "uuid")]
    pub company_id: Option<CompanyId>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<bool>)]
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::CompanyManager).unwrap(), "\"company_manager\"");
        let role: Role = serde_json::from_str("\"carrier\"").unwrap();
        assert_eq!(role, Role::Carrier);
        assert_eq!(Role::Operator.as_str(), "operator");
    }

    #[test]
    fn test_user_create_validation() {
        let create = UserCreate {
            email: "not-an-email".to_string(),
            display_name: None,
            password: None,
            roles: vec![Role::Carrier],
            company_id: None,
            carrier_id: None,
        };
        match create.validate() {
            Err(Error::Validation { errors }) => {
                assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["carrier_id", "email"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let absent: UserUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.carrier_id, None);

        let cleared: UserUpdate = serde_json::from_str(r#"{"carrier_id": null}"#).unwrap();
        assert_eq!(cleared.carrier_id, Some(None));
    }
}
