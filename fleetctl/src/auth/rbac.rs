//! Static role to permission table.
//!
//! Each role grants a fixed set of `(Resource, Operation)` pairs. `*All` operations reach
//! every tenant and imply the matching `*Own` operation.

use crate::api::models::users::{CurrentUser, Role};
use crate::types::{Operation, Resource};

type Grant = (Resource, Operation);

macro_rules! grants {
    ($($resource:ident => [$($op:ident),* $(,)?]),* $(,)?) => {
        &[$($((Resource::$resource, Operation::$op),)*)*]
    };
}

const ALL_OPERATIONS: [Operation; 4] = [
    Operation::CreateAll,
    Operation::ReadAll,
    Operation::UpdateAll,
    Operation::DeleteAll,
];

const ADMIN: [Grant; Resource::ALL.len() * ALL_OPERATIONS.len()] = {
    let mut out = [(Resource::Companies, Operation::ReadAll); Resource::ALL.len() * ALL_OPERATIONS.len()];
    let mut i = 0;
    while i < Resource::ALL.len() {
        let mut j = 0;
        while j < ALL_OPERATIONS.len() {
            out[i * ALL_OPERATIONS.len() + j] = (Resource::ALL[i], ALL_OPERATIONS[j]);
            j += 1;
        }
        i += 1;
    }
    out
};

const COMPANY_MANAGER: &[Grant] = grants! {
    Companies => [ReadOwn, UpdateOwn],
    Carriers => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Drivers => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Vehicles => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Routes => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Trips => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Alerts => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Costs => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Documents => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Users => [CreateOwn, ReadOwn, UpdateOwn, DeleteOwn],
    Reports => [ReadOwn],
};

const OPERATOR: &[Grant] = grants! {
    Companies => [ReadOwn],
    Carriers => [ReadOwn],
    Drivers => [CreateOwn, ReadOwn, UpdateOwn],
    Vehicles => [CreateOwn, ReadOwn, UpdateOwn],
    Routes => [CreateOwn, ReadOwn, UpdateOwn],
    Trips => [CreateOwn, ReadOwn, UpdateOwn],
    Alerts => [CreateOwn, ReadOwn, UpdateOwn],
    Costs => [CreateOwn, ReadOwn],
    Documents => [CreateOwn, ReadOwn, UpdateOwn],
    Reports => [ReadOwn],
};

const CARRIER: &[Grant] = grants! {
    Companies => [ReadOwn],
    Carriers => [ReadOwn],
    Drivers => [ReadOwn],
    Vehicles => [ReadOwn],
    Routes => [ReadOwn],
    Trips => [ReadOwn, UpdateOwn],
    Alerts => [CreateOwn],
};

pub fn role_permissions(role: Role) -> &'static [Grant] {
    match role {
        Role::Admin => &ADMIN,
        Role::CompanyManager => COMPANY_MANAGER,
        Role::Operator => OPERATOR,
        Role::Carrier => CARRIER,
    }
}

/// True iff any of `required` is held. An empty `required` grants nothing.
pub fn has_role(user_roles: &[Role], required: &[Role]) -> bool {
    required.iter().any(|role| user_roles.contains(role))
}

pub fn role_grants(role: Role, resource: Resource, operation: Operation) -> bool {
    role_permissions(role)
        .iter()
        .any(|&(r, op)| r == resource && (op == operation || op == operation.widened()))
}

pub fn roles_grant(roles: &[Role], resource: Resource, operation: Operation) -> bool {
    roles.iter().any(|&role| role_grants(role, resource, operation))
}

pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    roles_grant(&user.roles, resource, operation)
}

/// Whether any role held grants an `*All` operation, making the caller tenant-unscoped.
pub fn is_unscoped(roles: &[Role]) -> bool {
    roles.iter().any(|&role| role_permissions(role).iter().any(|&(_, op)| op.is_all()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(roles: Vec<Role>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "someone@fleet.test".to_string(),
            display_name: None,
            roles,
            company_id: Some(Uuid::new_v4()),
            carrier_id: None,
        }
    }

    #[test]
    fn test_has_role_is_any_of() {
        let roles = [Role::Operator, Role::Carrier];
        assert!(has_role(&roles, &[Role::Admin, Role::Operator]));
        assert!(has_role(&roles, &[Role::Carrier]));
        assert!(!has_role(&roles, &[Role::Admin, Role::CompanyManager]));
    }

    #[test]
    fn test_empty_requirement_grants_nothing() {
        assert!(!has_role(&[Role::Admin], &[]));
        assert!(!has_role(&[], &[]));
        assert!(!has_role(&[], &[Role::Operator]));
    }

    #[test]
    fn test_all_implies_own() {
        let admin = user(vec![Role::Admin]);
        for resource in Resource::ALL {
            for op in [Operation::ReadOwn, Operation::CreateOwn, Operation::UpdateOwn, Operation::DeleteOwn] {
                assert!(has_permission(&admin, resource, op), "admin lacks {op:?} on {resource}");
                assert!(has_permission(&admin, resource, op.widened()));
            }
        }
    }

    #[test]
    fn test_own_does_not_imply_all() {
        let manager = user(vec![Role::CompanyManager]);
        assert!(has_permission(&manager, Resource::Costs, Operation::DeleteOwn));
        assert!(!has_permission(&manager, Resource::Costs, Operation::DeleteAll));
        assert!(!has_permission(&manager, Resource::Companies, Operation::CreateOwn));
    }

    #[test]
    fn test_role_coverage() {
        let operator = user(vec![Role::Operator]);
        assert!(has_permission(&operator, Resource::Trips, Operation::UpdateOwn));
        assert!(has_permission(&operator, Resource::Costs, Operation::CreateOwn));
        assert!(!has_permission(&operator, Resource::Costs, Operation::DeleteOwn));
        assert!(!has_permission(&operator, Resource::Users, Operation::ReadOwn));
        assert!(!has_permission(&operator, Resource::Routes, Operation::DeleteOwn));

        let carrier = user(vec![Role::Carrier]);
        assert!(has_permission(&carrier, Resource::Trips, Operation::UpdateOwn));
        assert!(has_permission(&carrier, Resource::Alerts, Operation::CreateOwn));
        assert!(!has_permission(&carrier, Resource::Routes, Operation::UpdateOwn));
        assert!(!has_permission(&carrier, Resource::Costs, Operation::ReadOwn));
        assert!(!has_permission(&carrier, Resource::Reports, Operation::ReadOwn));

        // Roles combine
        let both = user(vec![Role::Carrier, Role::Operator]);
        assert!(has_permission(&both, Resource::Costs, Operation::ReadOwn));
    }

    #[test]
    fn test_only_admin_is_unscoped() {
        assert!(is_unscoped(&[Role::Admin]));
        assert!(is_unscoped(&[Role::Carrier, Role::Admin]));
        assert!(!is_unscoped(&[Role::CompanyManager, Role::Operator, Role::Carrier]));
        assert!(!is_unscoped(&[]));
    }

    #[test]
    fn test_admin_table_is_complete() {
        assert_eq!(role_permissions(Role::Admin).len(), Resource::ALL.len() * 4);
    }
}
