//! Cross-entity reference checks.
//!
//! A record may only point at carriers, drivers, vehicles, routes and trips of its own company.
//! A dangling or foreign reference is reported as a validation error on the referencing field,
//! never as "not found", so callers cannot probe other tenants' ids.

use uuid::Uuid;

use crate::api::models::documents::DocumentOwnerKind;
use crate::api::models::drivers::DriverStatus;
use crate::db::Stores;
use crate::db::handlers::Repository as _;
use crate::db::models::{
    carriers::CarrierDBResponse, drivers::DriverDBResponse, routes::RouteDBResponse, trips::TripDBResponse,
    vehicles::VehicleDBResponse,
};
use crate::errors::{Error, Result};
use crate::types::{CarrierId, CompanyId, DriverId, RouteId, TripId, VehicleId, abbrev_uuid};
use crate::validation::ValidationErrors;

/// Validation error for a reference that is missing or belongs to another tenant.
pub fn unknown_reference(field: &str) -> Error {
    let mut errors = ValidationErrors::new();
    errors.add(field, "does not exist in this company");
    Error::Validation { errors }
}

fn in_company<R>(record: Option<R>, company_id: CompanyId, owner: impl Fn(&R) -> CompanyId, field: &str) -> Result<R> {
    record.filter(|r| owner(r) == company_id).ok_or_else(|| unknown_reference(field))
}

pub async fn carrier(stores: &Stores, company_id: CompanyId, id: CarrierId) -> Result<CarrierDBResponse> {
    in_company(stores.carriers.get_by_id(id).await?, company_id, |c| c.company_id, "carrier_id")
}

pub async fn driver(stores: &Stores, company_id: CompanyId, id: DriverId) -> Result<DriverDBResponse> {
    in_company(stores.drivers.get_by_id(id).await?, company_id, |d| d.company_id, "driver_id")
}

pub async fn vehicle(stores: &Stores, company_id: CompanyId, id: VehicleId) -> Result<VehicleDBResponse> {
    in_company(stores.vehicles.get_by_id(id).await?, company_id, |v| v.company_id, "vehicle_id")
}

pub async fn route(stores: &Stores, company_id: CompanyId, id: RouteId) -> Result<RouteDBResponse> {
    in_company(stores.routes.get_by_id(id).await?, company_id, |r| r.company_id, "route_id")
}

pub async fn trip(stores: &Stores, company_id: CompanyId, id: TripId) -> Result<TripDBResponse> {
    in_company(stores.trips.get_by_id(id).await?, company_id, |t| t.company_id, "trip_id")
}

/// Check every optional reference at once, in field order.
pub async fn check_optional(
    stores: &Stores,
    company_id: CompanyId,
    carrier_id: Option<CarrierId>,
    driver_id: Option<DriverId>,
    vehicle_id: Option<VehicleId>,
) -> Result<()> {
    if let Some(id) = carrier_id {
        carrier(stores, company_id, id).await?;
    }
    if let Some(id) = driver_id {
        driver(stores, company_id, id).await?;
    }
    if let Some(id) = vehicle_id {
        vehicle(stores, company_id, id).await?;
    }
    Ok(())
}

/// The owner of a document must be the company itself or one of its carriers, drivers or vehicles.
pub async fn document_owner(stores: &Stores, company_id: CompanyId, kind: DocumentOwnerKind, owner_id: Uuid) -> Result<()> {
    let exists = match kind {
        DocumentOwnerKind::Company => owner_id == company_id && stores.companies.get_by_id(owner_id).await?.is_some(),
        DocumentOwnerKind::Carrier => carrier(stores, company_id, owner_id).await.is_ok(),
        DocumentOwnerKind::Driver => driver(stores, company_id, owner_id).await.is_ok(),
        DocumentOwnerKind::Vehicle => vehicle(stores, company_id, owner_id).await.is_ok(),
    };
    if exists { Ok(()) } else { Err(unknown_reference("owner_id")) }
}

/// Only active drivers may be put on a route or a trip.
pub fn ensure_driver_assignable(driver: &DriverDBResponse) -> Result<()> {
    if driver.status == DriverStatus::Active {
        Ok(())
    } else {
        Err(Error::Conflict {
            message: format!("Driver {} is {} and cannot be assigned", abbrev_uuid(&driver.id), driver.status.as_str()),
        })
    }
}

pub fn ensure_vehicle_assignable(vehicle: &VehicleDBResponse) -> Result<()> {
    if vehicle.status.is_assignable() {
        Ok(())
    } else {
        Err(Error::Conflict {
            message: format!("Vehicle {} is {} and cannot be assigned", vehicle.plate, vehicle.status.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::drivers::DriverCreate;
    use crate::db::models::drivers::DriverCreateDBRequest;
    use crate::test_utils::{create_test_carrier, create_test_company};

    fn driver_create(carrier_id: Option<CarrierId>) -> DriverCreate {
        DriverCreate {
            company_id: None,
            carrier_id,
            name: "Ana Souza".to_string(),
            document_number: "123.456.789-00".to_string(),
            license_number: None,
            license_category: None,
            license_expires_on: None,
            phone: None,
            email: None,
            status: Some(DriverStatus::OnLeave),
        }
    }

    #[tokio::test]
    async fn test_references_must_share_company() {
        let stores = Stores::in_memory();
        let acme = create_test_company(&stores, "Acme").await;
        let other = create_test_company(&stores, "Other").await;
        let foreign_carrier = create_test_carrier(&stores, other.id).await;
        let own_carrier = create_test_carrier(&stores, acme.id).await;

        assert!(carrier(&stores, acme.id, own_carrier.id).await.is_ok());

        let Err(Error::Validation { errors }) = carrier(&stores, acme.id, foreign_carrier.id).await else {
            panic!("expected validation error");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["carrier_id"]);

        assert!(check_optional(&stores, acme.id, None, Some(Uuid::new_v4()), None).await.is_err());
        assert!(check_optional(&stores, acme.id, Some(own_carrier.id), None, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_document_owner() {
        let stores = Stores::in_memory();
        let acme = create_test_company(&stores, "Acme").await;
        let other = create_test_company(&stores, "Other").await;

        assert!(document_owner(&stores, acme.id, DocumentOwnerKind::Company, acme.id).await.is_ok());
        assert!(document_owner(&stores, acme.id, DocumentOwnerKind::Company, other.id).await.is_err());
        assert!(document_owner(&stores, acme.id, DocumentOwnerKind::Driver, Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_driver_on_leave_is_not_assignable() {
        let stores = Stores::in_memory();
        let acme = create_test_company(&stores, "Acme").await;
        let driver = stores
            .drivers
            .create(&DriverCreateDBRequest::new(acme.id, driver_create(None)))
            .await
            .unwrap();

        let err = ensure_driver_assignable(&driver).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 409);
    }
}
