//! Permission extractors and tenant scoping.
//!
//! Handlers declare what they need in their signature:
//!
//! ```ignore
//! async fn list_routes(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<resource::Routes, operation::ReadOwn>,
//! ) -> Result<Json<...>> {
//!     let scope = current_user.scope()?;
//!     ...
//! }
//! ```
//!
//! [`TenantScope`] is the application-level equivalent of row-level security: every list filter
//! and single-record read made on behalf of a non-admin goes through it, and records outside the
//! scope are reported as not found.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    auth::rbac,
    errors::{Error, Result},
    types::{CarrierId, CompanyId, Operation, Permission, Resource},
};

pub use crate::auth::rbac::has_permission;

pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync + 'static {
        const RESOURCE: Resource;
    }

    macro_rules! markers {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    markers!(
        Companies, Carriers, Drivers, Vehicles, Routes, Trips, Alerts, Costs, Documents, Users, Reports,
    );
}

pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync + 'static {
        const OPERATION: Operation;
    }

    macro_rules! markers {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    markers!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

use operation::OperationMarker;
use resource::ResourceMarker;

/// An authenticated user holding `(R, O)`. Derefs to [`CurrentUser`].
pub struct RequiresPermission<R, O> {
    pub user: CurrentUser,
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<R: ResourceMarker, O: OperationMarker> RequiresPermission<R, O> {
    pub fn scope(&self) -> Result<TenantScope> {
        TenantScope::for_user(&self.user)
    }
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &CurrentUser {
        &self.user
    }
}

pub fn require(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if rbac::has_permission(user, resource, operation) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, operation),
            action: operation,
            resource: resource.to_string(),
        })
    }
}

impl<R: ResourceMarker, O: OperationMarker> FromRequestParts<AppState> for RequiresPermission<R, O> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require(&user, R::RESOURCE, O::OPERATION)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

/// The tenant boundary applied to a caller's reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// Admins see every tenant
    Global,
    Company(CompanyId),
    /// Carrier users only see what their carrier operates
    Carrier { company_id: CompanyId, carrier_id: CarrierId },
}

impl TenantScope {
    /// Scoped users without a company (or carrier users without a carrier) are denied.
    pub fn for_user(user: &CurrentUser) -> Result<Self> {
        if rbac::is_unscoped(&user.roles) {
            return Ok(TenantScope::Global);
        }
        let denied = || Error::InsufficientPermissions {
            required: Permission::Any(vec![]),
            action: Operation::ReadOwn,
            resource: "any tenant data without a company assignment".to_string(),
        };
        let company_id = user.company_id.ok_or_else(denied)?;

        let carrier_only = rbac::has_role(&user.roles, &[Role::Carrier])
            && !rbac::has_role(&user.roles, &[Role::Operator, Role::CompanyManager]);
        if carrier_only {
            let carrier_id = user.carrier_id.ok_or_else(denied)?;
            return Ok(TenantScope::Carrier { company_id, carrier_id });
        }
        Ok(TenantScope::Company(company_id))
    }

    pub fn is_global(&self) -> bool {
        matches!(self, TenantScope::Global)
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        match self {
            TenantScope::Global => None,
            TenantScope::Company(company_id) | TenantScope::Carrier { company_id, .. } => Some(*company_id),
        }
    }

    pub fn carrier_id(&self) -> Option<CarrierId> {
        match self {
            TenantScope::Carrier { carrier_id, .. } => Some(*carrier_id),
            _ => None,
        }
    }

    /// Company filter for a listing: admins get what they asked for, everyone else their own.
    pub fn filter_company(&self, requested: Option<CompanyId>) -> Option<CompanyId> {
        self.company_id().or(requested)
    }

    /// Company a new record belongs to. Non-admins may omit it or repeat their own.
    pub fn owning_company(&self, requested: Option<CompanyId>) -> Result<CompanyId> {
        match (self.company_id(), requested) {
            (None, Some(requested)) => Ok(requested),
            (None, None) => Err(Error::BadRequest {
                message: "company_id is required".to_string(),
            }),
            (Some(own), Some(requested)) if requested != own => Err(Error::InsufficientPermissions {
                required: Permission::Any(vec![]),
                action: Operation::CreateAll,
                resource: "records in another company".to_string(),
            }),
            (Some(own), _) => Ok(own),
        }
    }

    /// Whether a record owned by `company_id` (and optionally a carrier) is visible.
    pub fn allows(&self, company_id: CompanyId, carrier_id: Option<CarrierId>) -> bool {
        match self {
            TenantScope::Global => true,
            TenantScope::Company(own) => *own == company_id,
            TenantScope::Carrier {
                company_id: own,
                carrier_id: own_carrier,
            } => *own == company_id && carrier_id == Some(*own_carrier),
        }
    }

    /// Company-level check for records that carry no carrier.
    pub fn allows_company(&self, company_id: CompanyId) -> bool {
        self.company_id().is_none_or(|own| own == company_id)
    }

    /// Out-of-scope records behave exactly like missing ones.
    pub fn ensure<T>(&self, record: Option<T>, resource: &str, id: impl ToString, owner: impl Fn(&T) -> (CompanyId, Option<CarrierId>)) -> Result<T> {
        match record {
            Some(record) => {
                let (company_id, carrier_id) = owner(&record);
                if self.allows(company_id, carrier_id) {
                    Ok(record)
                } else {
                    Err(not_found(resource, id))
                }
            }
            None => Err(not_found(resource, id)),
        }
    }
}

pub fn not_found(resource: &str, id: impl ToString) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(roles: Vec<Role>, company_id: Option<CompanyId>, carrier_id: Option<CarrierId>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "scope@fleet.test".to_string(),
            display_name: None,
            roles,
            company_id,
            carrier_id,
        }
    }

    #[test]
    fn test_scope_derivation() {
        let company = Uuid::new_v4();
        let carrier = Uuid::new_v4();

        assert_eq!(TenantScope::for_user(&user(vec![Role::Admin], None, None)).unwrap(), TenantScope::Global);
        assert_eq!(
            TenantScope::for_user(&user(vec![Role::Operator], Some(company), None)).unwrap(),
            TenantScope::Company(company)
        );
        assert_eq!(
            TenantScope::for_user(&user(vec![Role::Carrier], Some(company), Some(carrier))).unwrap(),
            TenantScope::Carrier {
                company_id: company,
                carrier_id: carrier
            }
        );
        // A wider role wins over the carrier restriction
        assert_eq!(
            TenantScope::for_user(&user(vec![Role::Carrier, Role::CompanyManager], Some(company), Some(carrier))).unwrap(),
            TenantScope::Company(company)
        );
    }

    #[test]
    fn test_scoped_user_without_company_is_denied() {
        let err = TenantScope::for_user(&user(vec![Role::Operator], None, None)).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 403);

        let err = TenantScope::for_user(&user(vec![Role::Carrier], Some(Uuid::new_v4()), None)).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 403);
    }

    #[test]
    fn test_owning_company() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = TenantScope::Company(own);

        assert_eq!(scope.owning_company(None).unwrap(), own);
        assert_eq!(scope.owning_company(Some(own)).unwrap(), own);
        assert_eq!(scope.owning_company(Some(other)).unwrap_err().status_code().as_u16(), 403);

        assert_eq!(TenantScope::Global.owning_company(Some(other)).unwrap(), other);
        assert_eq!(TenantScope::Global.owning_company(None).unwrap_err().status_code().as_u16(), 400);
    }

    #[test]
    fn test_filter_company_ignores_request_for_scoped_users() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(TenantScope::Company(own).filter_company(Some(other)), Some(own));
        assert_eq!(TenantScope::Global.filter_company(Some(other)), Some(other));
        assert_eq!(TenantScope::Global.filter_company(None), None);
    }

    #[test]
    fn test_out_of_scope_is_not_found() {
        let own = Uuid::new_v4();
        let carrier = Uuid::new_v4();
        let scope = TenantScope::Carrier {
            company_id: own,
            carrier_id: carrier,
        };

        assert!(scope.allows(own, Some(carrier)));
        assert!(!scope.allows(own, None));
        assert!(!scope.allows(own, Some(Uuid::new_v4())));
        assert!(!scope.allows(Uuid::new_v4(), Some(carrier)));

        let id = Uuid::new_v4();
        let record = Some((Uuid::new_v4(), Some(carrier)));
        let err = scope.ensure(record, "Route", id, |r| *r).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(scope.ensure(Some((own, Some(carrier))), "Route", id, |r| *r).is_ok());
    }
}
