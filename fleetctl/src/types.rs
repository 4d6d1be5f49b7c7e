//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (CompanyId, DriverId, etc.)
//! - Permission and authorization types
//! - Resource and operation enums for access control
//!
//! # Permission System
//!
//! - [`Resource`]: What entity type is being accessed (Routes, Trips, Costs, etc.)
//! - [`Operation`]: What action is being performed (Read, Create, Update, Delete)
//! - [`Permission`]: Authorization requirement combining resource and operation
//!
//! ## Operations
//!
//! Operations come in two flavors:
//! - **All**: Unrestricted access across every tenant (e.g., `ReadAll`, `DeleteAll`)
//! - **Own**: Restricted to the caller's own company, and for carriers their own carrier
//!   (e.g., `ReadOwn`, `UpdateOwn`)

use std::fmt;
use uuid::Uuid;

pub type CompanyId = Uuid;
pub type CarrierId = Uuid;
pub type DriverId = Uuid;
pub type VehicleId = Uuid;
pub type RouteId = Uuid;
pub type TripId = Uuid;
pub type AlertId = Uuid;
pub type CostId = Uuid;
pub type DocumentId = Uuid;
pub type UserId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// *-All means any tenant, *-Own means the caller's tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

impl Operation {
    /// The unrestricted counterpart of an `*Own` operation. `*All` operations map to themselves.
    pub fn widened(self) -> Operation {
        match self {
            Operation::CreateOwn => Operation::CreateAll,
            Operation::ReadOwn => Operation::ReadAll,
            Operation::UpdateOwn => Operation::UpdateAll,
            Operation::DeleteOwn => Operation::DeleteAll,
            other => other,
        }
    }

    pub fn is_all(self) -> bool {
        self.widened() == self
    }
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Companies,
    Carriers,
    Drivers,
    Vehicles,
    Routes,
    Trips,
    Alerts,
    Costs,
    Documents,
    Users,
    Reports,
}

impl Resource {
    pub const ALL: [Resource; 11] = [
        Resource::Companies,
        Resource::Carriers,
        Resource::Drivers,
        Resource::Vehicles,
        Resource::Routes,
        Resource::Trips,
        Resource::Alerts,
        Resource::Costs,
        Resource::Documents,
        Resource::Users,
        Resource::Reports,
    ];
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Any of the listed permissions suffices
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Companies => "companies",
            Resource::Carriers => "carriers",
            Resource::Drivers => "drivers",
            Resource::Vehicles => "vehicles",
            Resource::Routes => "routes",
            Resource::Trips => "trips",
            Resource::Alerts => "alerts",
            Resource::Costs => "costs",
            Resource::Documents => "documents",
            Resource::Users => "users",
            Resource::Reports => "reports",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_widened() {
        assert_eq!(Operation::ReadOwn.widened(), Operation::ReadAll);
        assert_eq!(Operation::DeleteAll.widened(), Operation::DeleteAll);
        assert!(Operation::UpdateAll.is_all());
        assert!(!Operation::CreateOwn.is_all());
    }
}
