//! Commands and their handlers.

use chrono::Utc;
use tracing::{info, instrument};

use super::{Command, CommandHandler, ExecutionContext};
use crate::api::models::alerts::{AlertCreate, AlertResolve, AlertStatus};
use crate::api::models::costs::{CostCreate, DEFAULT_CURRENCY};
use crate::api::models::routes::{RouteAssignment, RouteCreate, RouteStatus};
use crate::api::models::trips::{TripCancel, TripComplete, TripSchedule, TripStart, TripStatus};
use crate::api::models::vehicles::VehicleStatus;
use crate::auth::permissions::TenantScope;
use crate::db::Stores;
use crate::db::handlers::Repository as _;
use crate::db::models::{
    alerts::{AlertCreateDBRequest, AlertDBResponse, AlertUpdateDBRequest},
    costs::{CostCreateDBRequest, CostDBResponse},
    routes::{RouteCreateDBRequest, RouteDBResponse, RouteUpdateDBRequest},
    trips::{TripCreateDBRequest, TripDBResponse, TripUpdateDBRequest},
    vehicles::{VehicleDBResponse, VehicleUpdateDBRequest},
};
use crate::errors::{Error, Result};
use crate::references::{self, unknown_reference};
use crate::types::{AlertId, CarrierId, RouteId, TripId, abbrev_uuid};
use crate::validation::{Validate, ValidationErrors};

fn invalid_transition(entity: &str, from: &str, action: &str) -> Error {
    Error::InvalidTransition {
        entity: entity.to_string(),
        from: from.to_string(),
        action: action.to_string(),
    }
}

/// Carrier users may only reference records of their own carrier.
fn within_carrier(scope: &TenantScope, carrier_id: Option<CarrierId>, field: &str) -> Result<()> {
    match scope.carrier_id() {
        Some(own) if carrier_id != Some(own) => Err(unknown_reference(field)),
        _ => Ok(()),
    }
}

async fn load_route(stores: &Stores, scope: &TenantScope, id: RouteId) -> Result<RouteDBResponse> {
    scope.ensure(stores.routes.get_by_id(id).await?, "Route", id, |r| (r.company_id, r.carrier_id))
}

async fn load_trip(stores: &Stores, scope: &TenantScope, id: TripId) -> Result<TripDBResponse> {
    scope.ensure(stores.trips.get_by_id(id).await?, "Trip", id, |t| (t.company_id, t.carrier_id))
}

async fn load_alert(stores: &Stores, scope: &TenantScope, id: AlertId) -> Result<AlertDBResponse> {
    scope.ensure(stores.alerts.get_by_id(id).await?, "Alert", id, |a| (a.company_id, None))
}

// Routes

pub struct CreateRoute {
    pub input: RouteCreate,
}

impl Command for CreateRoute {
    const NAME: &'static str = "CreateRoute";
    type Output = RouteDBResponse;
}

/// Change the carrier, driver and vehicle of a route. Absent fields stay, `null` clears.
pub struct AssignRouteResources {
    pub route_id: RouteId,
    pub assignment: RouteAssignment,
}

impl Command for AssignRouteResources {
    const NAME: &'static str = "AssignRouteResources";
    type Output = RouteDBResponse;
}

pub struct ChangeRouteStatus {
    pub route_id: RouteId,
    pub status: RouteStatus,
}

impl Command for ChangeRouteStatus {
    const NAME: &'static str = "ChangeRouteStatus";
    type Output = RouteDBResponse;
}

#[derive(Clone)]
pub struct RouteCommands {
    stores: Stores,
}

impl RouteCommands {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }
}

#[async_trait::async_trait]
impl CommandHandler<CreateRoute> for RouteCommands {
    #[instrument(skip_all, fields(code = %command.input.code), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: CreateRoute) -> Result<RouteDBResponse> {
        let input = command.input;
        input.validate()?;
        let company_id = ctx.scope.owning_company(input.company_id)?;

        references::check_optional(&self.stores, company_id, input.carrier_id, None, None).await?;
        if let Some(driver_id) = input.driver_id {
            references::ensure_driver_assignable(&references::driver(&self.stores, company_id, driver_id).await?)?;
        }
        if let Some(vehicle_id) = input.vehicle_id {
            references::ensure_vehicle_assignable(&references::vehicle(&self.stores, company_id, vehicle_id).await?)?;
        }

        let route = self.stores.routes.create(&RouteCreateDBRequest::new(company_id, input)).await?;
        info!(route_id = %abbrev_uuid(&route.id), "Route created");
        Ok(route)
    }
}

#[async_trait::async_trait]
impl CommandHandler<AssignRouteResources> for RouteCommands {
    #[instrument(skip_all, fields(route_id = %abbrev_uuid(&command.route_id)), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: AssignRouteResources) -> Result<RouteDBResponse> {
        let route = load_route(&self.stores, &ctx.scope, command.route_id).await?;
        if route.status == RouteStatus::Cancelled {
            return Err(invalid_transition("route", route.status.as_str(), "assign resources to"));
        }

        let RouteAssignment {
            carrier_id,
            driver_id,
            vehicle_id,
        } = command.assignment;
        if let Some(Some(carrier_id)) = carrier_id {
            references::carrier(&self.stores, route.company_id, carrier_id).await?;
        }
        if let Some(Some(driver_id)) = driver_id {
            references::ensure_driver_assignable(&references::driver(&self.stores, route.company_id, driver_id).await?)?;
        }
        if let Some(Some(vehicle_id)) = vehicle_id {
            references::ensure_vehicle_assignable(&references::vehicle(&self.stores, route.company_id, vehicle_id).await?)?;
        }

        let update = RouteUpdateDBRequest {
            carrier_id,
            driver_id,
            vehicle_id,
            ..Default::default()
        };
        Ok(self.stores.routes.update(route.id, &update).await?)
    }
}

#[async_trait::async_trait]
impl CommandHandler<ChangeRouteStatus> for RouteCommands {
    #[instrument(skip_all, fields(route_id = %abbrev_uuid(&command.route_id), status = command.status.as_str()), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: ChangeRouteStatus) -> Result<RouteDBResponse> {
        let route = load_route(&self.stores, &ctx.scope, command.route_id).await?;
        if !route.status.can_transition_to(command.status) {
            return Err(invalid_transition(
                "route",
                route.status.as_str(),
                &format!("move to {}", command.status.as_str()),
            ));
        }
        let update = RouteUpdateDBRequest {
            status: Some(command.status),
            ..Default::default()
        };
        Ok(self.stores.routes.update(route.id, &update).await?)
    }
}

// Trips

/// Schedule a trip on a route. Driver and vehicle default to the route's.
pub struct ScheduleTrip {
    pub input: TripSchedule,
}

impl Command for ScheduleTrip {
    const NAME: &'static str = "ScheduleTrip";
    type Output = TripDBResponse;
}

pub struct StartTrip {
    pub trip_id: TripId,
    pub input: TripStart,
}

impl Command for StartTrip {
    const NAME: &'static str = "StartTrip";
    type Output = TripDBResponse;
}

pub struct CompleteTrip {
    pub trip_id: TripId,
    pub input: TripComplete,
}

impl Command for CompleteTrip {
    const NAME: &'static str = "CompleteTrip";
    type Output = TripDBResponse;
}

pub struct CancelTrip {
    pub trip_id: TripId,
    pub input: TripCancel,
}

impl Command for CancelTrip {
    const NAME: &'static str = "CancelTrip";
    type Output = TripDBResponse;
}

#[derive(Clone)]
pub struct TripCommands {
    stores: Stores,
}

impl TripCommands {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    fn check_transition(trip: &TripDBResponse, next: TripStatus, action: &str) -> Result<()> {
        if trip.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(invalid_transition("trip", trip.status.as_str(), action))
        }
    }

    /// Put an in-service vehicle back into the pool, optionally advancing its odometer.
    async fn release_vehicle(&self, trip: &TripDBResponse, odometer_km: Option<f64>) -> Result<Option<VehicleDBResponse>> {
        let Some(vehicle_id) = trip.vehicle_id else {
            return Ok(None);
        };
        let Some(vehicle) = self.stores.vehicles.get_by_id(vehicle_id).await? else {
            return Ok(None);
        };
        let mut update = VehicleUpdateDBRequest::default();
        if vehicle.status == VehicleStatus::InService {
            update.status = Some(VehicleStatus::Available);
        }
        if let Some(reading) = odometer_km
            && reading > vehicle.odometer_km
        {
            update.odometer_km = Some(reading);
        }
        if update.status.is_none() && update.odometer_km.is_none() {
            return Ok(Some(vehicle));
        }
        Ok(Some(self.stores.vehicles.update(vehicle.id, &update).await?))
    }
}

#[async_trait::async_trait]
impl CommandHandler<ScheduleTrip> for TripCommands {
    #[instrument(skip_all, fields(route_id = %abbrev_uuid(&command.input.route_id)), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: ScheduleTrip) -> Result<TripDBResponse> {
        let input = command.input;
        input.validate()?;

        let route = self
            .stores
            .routes
            .get_by_id(input.route_id)
            .await?
            .filter(|r| ctx.scope.allows(r.company_id, r.carrier_id))
            .ok_or_else(|| unknown_reference("route_id"))?;
        if !matches!(route.status, RouteStatus::Planned | RouteStatus::Active) {
            return Err(invalid_transition("route", route.status.as_str(), "schedule trips on"));
        }

        let driver_id = input.driver_id.or(route.driver_id);
        let vehicle_id = input.vehicle_id.or(route.vehicle_id);
        if let Some(driver_id) = driver_id {
            references::ensure_driver_assignable(&references::driver(&self.stores, route.company_id, driver_id).await?)?;
        }
        if let Some(vehicle_id) = vehicle_id {
            references::ensure_vehicle_assignable(&references::vehicle(&self.stores, route.company_id, vehicle_id).await?)?;
        }

        let request = TripCreateDBRequest {
            company_id: route.company_id,
            route_id: route.id,
            carrier_id: route.carrier_id,
            driver_id,
            vehicle_id,
            scheduled_for: input.scheduled_for,
            passenger_count: input.passenger_count,
            notes: input.notes,
        };
        let trip = self.stores.trips.create(&request).await?;
        info!(trip_id = %abbrev_uuid(&trip.id), "Trip scheduled");
        Ok(trip)
    }
}

#[async_trait::async_trait]
impl CommandHandler<StartTrip> for TripCommands {
    #[instrument(skip_all, fields(trip_id = %abbrev_uuid(&command.trip_id)), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: StartTrip) -> Result<TripDBResponse> {
        let trip = load_trip(&self.stores, &ctx.scope, command.trip_id).await?;
        Self::check_transition(&trip, TripStatus::InProgress, "start")?;

        let mut errors = ValidationErrors::new();
        errors.non_negative("start_odometer_km", command.input.start_odometer_km);
        errors.into_result()?;

        if let Some(driver_id) = trip.driver_id {
            references::ensure_driver_assignable(&references::driver(&self.stores, trip.company_id, driver_id).await?)?;
        }
        let vehicle = match trip.vehicle_id {
            Some(vehicle_id) => {
                let vehicle = references::vehicle(&self.stores, trip.company_id, vehicle_id).await?;
                references::ensure_vehicle_assignable(&vehicle)?;
                if vehicle.status == VehicleStatus::InService {
                    return Err(Error::Conflict {
                        message: format!("Vehicle {} is already in service on another trip", vehicle.plate),
                    });
                }
                Some(vehicle)
            }
            None => None,
        };

        let update = TripUpdateDBRequest {
            status: Some(TripStatus::InProgress),
            started_at: Some(Utc::now()),
            start_odometer_km: command.input.start_odometer_km.or(vehicle.as_ref().map(|v| v.odometer_km)),
            ..Default::default()
        };
        let started = self.stores.trips.update(trip.id, &update).await?;

        if let Some(vehicle) = vehicle {
            self.stores
                .vehicles
                .update(vehicle.id, &VehicleUpdateDBRequest::status(VehicleStatus::InService))
                .await?;
        }
        info!("Trip started");
        Ok(started)
    }
}

#[async_trait::async_trait]
impl CommandHandler<CompleteTrip> for TripCommands {
    #[instrument(skip_all, fields(trip_id = %abbrev_uuid(&command.trip_id)), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: CompleteTrip) -> Result<TripDBResponse> {
        let trip = load_trip(&self.stores, &ctx.scope, command.trip_id).await?;
        Self::check_transition(&trip, TripStatus::Completed, "complete")?;

        let input = command.input;
        let mut errors = ValidationErrors::new();
        errors.non_negative("end_odometer_km", input.end_odometer_km);
        if let (Some(start), Some(end)) = (trip.start_odometer_km, input.end_odometer_km)
            && end < start
        {
            errors.add("end_odometer_km", "must not be less than start_odometer_km");
        }
        if input.passenger_count.is_some_and(|count| count < 0) {
            errors.add("passenger_count", "must not be negative");
        }
        errors.into_result()?;

        let update = TripUpdateDBRequest {
            status: Some(TripStatus::Completed),
            finished_at: Some(Utc::now()),
            end_odometer_km: input.end_odometer_km,
            passenger_count: input.passenger_count,
            notes: input.notes,
            ..Default::default()
        };
        let completed = self.stores.trips.update(trip.id, &update).await?;
        self.release_vehicle(&completed, input.end_odometer_km).await?;
        info!("Trip completed");
        Ok(completed)
    }
}

#[async_trait::async_trait]
impl CommandHandler<CancelTrip> for TripCommands {
    #[instrument(skip_all, fields(trip_id = %abbrev_uuid(&command.trip_id)), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: CancelTrip) -> Result<TripDBResponse> {
        let trip = load_trip(&self.stores, &ctx.scope, command.trip_id).await?;
        Self::check_transition(&trip, TripStatus::Cancelled, "cancel")?;

        let mut errors = ValidationErrors::new();
        errors.require_non_blank("reason", &command.input.reason);
        errors.max_length("reason", &command.input.reason, 500);
        errors.into_result()?;

        let was_running = trip.status == TripStatus::InProgress;
        let update = TripUpdateDBRequest {
            status: Some(TripStatus::Cancelled),
            finished_at: was_running.then(Utc::now),
            cancellation_reason: Some(command.input.reason.trim().to_string()),
            ..Default::default()
        };
        let cancelled = self.stores.trips.update(trip.id, &update).await?;
        // A scheduled trip never put its vehicle in service, so only a running one releases it
        if was_running {
            self.release_vehicle(&cancelled, None).await?;
        }
        info!("Trip cancelled");
        Ok(cancelled)
    }
}

// Alerts

pub struct RaiseAlert {
    pub input: AlertCreate,
}

impl Command for RaiseAlert {
    const NAME: &'static str = "RaiseAlert";
    type Output = AlertDBResponse;
}

pub struct AcknowledgeAlert {
    pub alert_id: AlertId,
}

impl Command for AcknowledgeAlert {
    const NAME: &'static str = "AcknowledgeAlert";
    type Output = AlertDBResponse;
}

pub struct ResolveAlert {
    pub alert_id: AlertId,
    pub input: AlertResolve,
}

impl Command for ResolveAlert {
    const NAME: &'static str = "ResolveAlert";
    type Output = AlertDBResponse;
}

#[derive(Clone)]
pub struct AlertCommands {
    stores: Stores,
}

impl AlertCommands {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    fn check_transition(alert: &AlertDBResponse, next: AlertStatus, action: &str) -> Result<()> {
        if alert.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(invalid_transition("alert", alert.status.as_str(), action))
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler<RaiseAlert> for AlertCommands {
    #[instrument(skip_all, fields(kind = command.input.kind.as_str(), severity = command.input.severity.as_str()), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: RaiseAlert) -> Result<AlertDBResponse> {
        let input = command.input;
        input.validate()?;
        let company_id = ctx.scope.owning_company(input.company_id)?;

        if let Some(route_id) = input.route_id {
            let route = references::route(&self.stores, company_id, route_id).await?;
            within_carrier(&ctx.scope, route.carrier_id, "route_id")?;
        }
        if let Some(trip_id) = input.trip_id {
            let trip = references::trip(&self.stores, company_id, trip_id).await?;
            within_carrier(&ctx.scope, trip.carrier_id, "trip_id")?;
        }
        if let Some(vehicle_id) = input.vehicle_id {
            let vehicle = references::vehicle(&self.stores, company_id, vehicle_id).await?;
            within_carrier(&ctx.scope, vehicle.carrier_id, "vehicle_id")?;
        }
        if let Some(driver_id) = input.driver_id {
            let driver = references::driver(&self.stores, company_id, driver_id).await?;
            within_carrier(&ctx.scope, driver.carrier_id, "driver_id")?;
        }

        let request = AlertCreateDBRequest {
            company_id,
            kind: input.kind,
            severity: input.severity,
            title: input.title.trim().to_string(),
            description: input.description,
            route_id: input.route_id,
            trip_id: input.trip_id,
            vehicle_id: input.vehicle_id,
            driver_id: input.driver_id,
            raised_by: Some(ctx.actor.id),
        };
        let alert = self.stores.alerts.create(&request).await?;
        info!(alert_id = %abbrev_uuid(&alert.id), "Alert raised");
        Ok(alert)
    }
}

#[async_trait::async_trait]
impl CommandHandler<AcknowledgeAlert> for AlertCommands {
    #[instrument(skip_all, fields(alert_id = %abbrev_uuid(&command.alert_id)), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: AcknowledgeAlert) -> Result<AlertDBResponse> {
        let alert = load_alert(&self.stores, &ctx.scope, command.alert_id).await?;
        Self::check_transition(&alert, AlertStatus::Acknowledged, "acknowledge")?;
        let update = AlertUpdateDBRequest {
            status: Some(AlertStatus::Acknowledged),
            acknowledged_by: Some(ctx.actor.id),
            acknowledged_at: Some(Utc::now()),
            ..Default::default()
        };
        Ok(self.stores.alerts.update(alert.id, &update).await?)
    }
}

#[async_trait::async_trait]
impl CommandHandler<ResolveAlert> for AlertCommands {
    #[instrument(skip_all, fields(alert_id = %abbrev_uuid(&command.alert_id)), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: ResolveAlert) -> Result<AlertDBResponse> {
        let alert = load_alert(&self.stores, &ctx.scope, command.alert_id).await?;
        Self::check_transition(&alert, AlertStatus::Resolved, "resolve")?;
        let update = AlertUpdateDBRequest {
            status: Some(AlertStatus::Resolved),
            resolved_by: Some(ctx.actor.id),
            resolved_at: Some(Utc::now()),
            resolution_notes: command.input.resolution_notes,
            ..Default::default()
        };
        Ok(self.stores.alerts.update(alert.id, &update).await?)
    }
}

// Costs

pub struct RecordCost {
    pub input: CostCreate,
}

impl Command for RecordCost {
    const NAME: &'static str = "RecordCost";
    type Output = CostDBResponse;
}

#[derive(Clone)]
pub struct CostCommands {
    stores: Stores,
}

impl CostCommands {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }
}

#[async_trait::async_trait]
impl CommandHandler<RecordCost> for CostCommands {
    #[instrument(skip_all, fields(category = command.input.category.as_str()), err)]
    async fn handle(&self, ctx: &ExecutionContext, command: RecordCost) -> Result<CostDBResponse> {
        let input = command.input;
        input.validate()?;
        let company_id = ctx.scope.owning_company(input.company_id)?;

        if let Some(route_id) = input.route_id {
            references::route(&self.stores, company_id, route_id).await?;
        }
        if let Some(trip_id) = input.trip_id {
            references::trip(&self.stores, company_id, trip_id).await?;
        }
        references::check_optional(&self.stores, company_id, input.carrier_id, None, input.vehicle_id).await?;

        let request = CostCreateDBRequest {
            company_id,
            category: input.category,
            amount: input.amount,
            currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            incurred_on: input.incurred_on,
            description: input.description,
            route_id: input.route_id,
            vehicle_id: input.vehicle_id,
            carrier_id: input.carrier_id,
            trip_id: input.trip_id,
            recorded_by: Some(ctx.actor.id),
        };
        let cost = self.stores.costs.create(&request).await?;
        info!(cost_id = %abbrev_uuid(&cost.id), amount = %cost.amount, "Cost recorded");
        Ok(cost)
    }
}
