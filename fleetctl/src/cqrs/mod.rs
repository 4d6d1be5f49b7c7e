//! Command/query dispatch for the operations that span several entities.
//!
//! Plain CRUD goes straight from the API handlers to the repositories. Anything with lifecycle
//! rules or side effects on other records (assigning resources to a route, starting a trip, resolving
//! an alert) is expressed as a [`Command`], and the composite reads behind the dashboard and reports
//! as a [`Query`]. Handlers are registered once at startup on a [`CommandBus`] / [`QueryBus`] and
//! looked up by message name on dispatch.
//!
//! Dispatch is direct and synchronous with the request: there is no event log, no retry and no
//! ordering between messages.

pub mod bus;
pub mod commands;
pub mod queries;

pub use bus::{BusError, CommandBus, QueryBus};

use crate::api::models::users::CurrentUser;
use crate::auth::permissions::TenantScope;
use crate::config::Config;
use crate::db::Stores;
use crate::errors::Result;

/// A state-changing request.
pub trait Command: Send + 'static {
    const NAME: &'static str;
    type Output: Send + 'static;
}

/// A read-only request.
pub trait Query: Send + 'static {
    const NAME: &'static str;
    type Output: Send + 'static;
}

#[async_trait::async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, ctx: &ExecutionContext, command: C) -> Result<C::Output>;
}

#[async_trait::async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, ctx: &ExecutionContext, query: Q) -> Result<Q::Output>;
}

/// Who is asking, and which tenant data they may touch.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub actor: CurrentUser,
    pub scope: TenantScope,
}

impl ExecutionContext {
    pub fn new(actor: CurrentUser) -> Result<Self> {
        let scope = TenantScope::for_user(&actor)?;
        Ok(Self { actor, scope })
    }
}

/// Bus with every command handler registered.
pub fn command_bus(stores: &Stores) -> std::result::Result<CommandBus, BusError> {
    use commands::*;

    let routes = RouteCommands::new(stores.clone());
    let trips = TripCommands::new(stores.clone());
    let alerts = AlertCommands::new(stores.clone());
    let costs = CostCommands::new(stores.clone());

    let mut bus = CommandBus::new();
    bus.register::<CreateRoute>(routes.clone())?;
    bus.register::<AssignRouteResources>(routes.clone())?;
    bus.register::<ChangeRouteStatus>(routes)?;
    bus.register::<ScheduleTrip>(trips.clone())?;
    bus.register::<StartTrip>(trips.clone())?;
    bus.register::<CompleteTrip>(trips.clone())?;
    bus.register::<CancelTrip>(trips)?;
    bus.register::<RaiseAlert>(alerts.clone())?;
    bus.register::<AcknowledgeAlert>(alerts.clone())?;
    bus.register::<ResolveAlert>(alerts)?;
    bus.register::<RecordCost>(costs)?;
    Ok(bus)
}

/// Bus with every query handler registered.
pub fn query_bus(stores: &Stores, config: &Config) -> std::result::Result<QueryBus, BusError> {
    use queries::*;

    let routes = RouteQueries::new(stores.clone());
    let reports = ReportQueries::new(stores.clone(), config.documents.expiry_warning_days);

    let mut bus = QueryBus::new();
    bus.register::<GetRouteDetails>(routes)?;
    bus.register::<GetDashboardStats>(reports.clone())?;
    bus.register::<GetFleetReport>(reports.clone())?;
    bus.register::<ListExpiringDocuments>(reports)?;
    Ok(bus)
}
