//! Composite reads.

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use super::{ExecutionContext, Query, QueryHandler};
use crate::api::models::documents::{DocumentResponse, ExpiringDocumentResponse, ExpiryState};
use crate::api::models::reports::{DashboardStats, FleetReport};
use crate::api::models::routes::RouteDetailsResponse;
use crate::auth::rbac;
use crate::db::Stores;
use crate::db::handlers::Repository as _;
use crate::db::handlers::alerts::AlertFilter;
use crate::db::handlers::costs::CostFilter;
use crate::db::handlers::documents::DocumentFilter;
use crate::db::handlers::repository::UNBOUNDED;
use crate::db::handlers::trips::TripFilter;
use crate::errors::{Error, Result};
use crate::reports;
use crate::types::{CompanyId, Operation, Resource, RouteId, abbrev_uuid};

/// How many trips the route details carry
const RECENT_TRIPS: i64 = 10;
/// Cap on the open alerts listed with a route
const ROUTE_ALERTS: i64 = 50;

pub struct GetRouteDetails {
    pub route_id: RouteId,
}

impl Query for GetRouteDetails {
    const NAME: &'static str = "GetRouteDetails";
    type Output = RouteDetailsResponse;
}

pub struct GetDashboardStats {
    pub company_id: Option<CompanyId>,
}

impl Query for GetDashboardStats {
    const NAME: &'static str = "GetDashboardStats";
    type Output = DashboardStats;
}

pub struct GetFleetReport {
    pub company_id: Option<CompanyId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Query for GetFleetReport {
    const NAME: &'static str = "GetFleetReport";
    type Output = FleetReport;
}

/// Documents already expired or expiring within `within_days`, soonest first.
pub struct ListExpiringDocuments {
    pub company_id: Option<CompanyId>,
    pub within_days: Option<i64>,
    pub skip: i64,
    pub limit: i64,
}

impl Query for ListExpiringDocuments {
    const NAME: &'static str = "ListExpiringDocuments";
    /// One page and the total
    type Output = (Vec<ExpiringDocumentResponse>, i64);
}

#[derive(Clone)]
pub struct RouteQueries {
    stores: Stores,
}

impl RouteQueries {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }
}

#[async_trait::async_trait]
impl QueryHandler<GetRouteDetails> for RouteQueries {
    #[instrument(skip_all, fields(route_id = %abbrev_uuid(&query.route_id)), err)]
    async fn handle(&self, ctx: &ExecutionContext, query: GetRouteDetails) -> Result<RouteDetailsResponse> {
        let route = ctx.scope.ensure(
            self.stores.routes.get_by_id(query.route_id).await?,
            "Route",
            query.route_id,
            |r| (r.company_id, r.carrier_id),
        )?;

        let carrier = match route.carrier_id {
            Some(id) => self.stores.carriers.get_by_id(id).await?,
            None => None,
        };
        let driver = match route.driver_id {
            Some(id) => self.stores.drivers.get_by_id(id).await?,
            None => None,
        };
        let vehicle = match route.vehicle_id {
            Some(id) => self.stores.vehicles.get_by_id(id).await?,
            None => None,
        };
        let recent_trips = self
            .stores
            .trips
            .list(&TripFilter::new(0, RECENT_TRIPS).with_route(route.id))
            .await?;

        let open_alerts = if rbac::has_permission(&ctx.actor, Resource::Alerts, Operation::ReadOwn) {
            self.stores
                .alerts
                .list(&AlertFilter::new(0, ROUTE_ALERTS).with_route(route.id).unresolved())
                .await?
        } else {
            Vec::new()
        };

        let total_cost = if rbac::has_permission(&ctx.actor, Resource::Costs, Operation::ReadOwn) {
            let costs = self
                .stores
                .costs
                .list(&CostFilter::new(0, UNBOUNDED).with_route(route.id))
                .await?;
            Some(costs.iter().map(|c| c.amount).sum::<Decimal>())
        } else {
            None
        };

        Ok(RouteDetailsResponse {
            route: route.into(),
            carrier: carrier.map(Into::into),
            driver: driver.map(Into::into),
            vehicle: vehicle.map(Into::into),
            recent_trips: recent_trips.into_iter().map(Into::into).collect(),
            open_alerts: open_alerts.into_iter().map(Into::into).collect(),
            total_cost,
        })
    }
}

#[derive(Clone)]
pub struct ReportQueries {
    stores: Stores,
    expiry_warning_days: i64,
}

impl ReportQueries {
    pub fn new(stores: Stores, expiry_warning_days: i64) -> Self {
        Self {
            stores,
            expiry_warning_days,
        }
    }
}

#[async_trait::async_trait]
impl QueryHandler<GetDashboardStats> for ReportQueries {
    async fn handle(&self, ctx: &ExecutionContext, query: GetDashboardStats) -> Result<DashboardStats> {
        let company_id = ctx.scope.filter_company(query.company_id);
        reports::dashboard_stats(&self.stores, company_id, self.expiry_warning_days, Utc::now().date_naive()).await
    }
}

#[async_trait::async_trait]
impl QueryHandler<GetFleetReport> for ReportQueries {
    async fn handle(&self, ctx: &ExecutionContext, query: GetFleetReport) -> Result<FleetReport> {
        let company_id = ctx.scope.filter_company(query.company_id);
        let (from, to) = reports::resolve_range(query.from, query.to, Utc::now().date_naive())?;
        reports::fleet_report(&self.stores, company_id, from, to).await
    }
}

#[async_trait::async_trait]
impl QueryHandler<ListExpiringDocuments> for ReportQueries {
    #[instrument(skip_all, err)]
    async fn handle(&self, ctx: &ExecutionContext, query: ListExpiringDocuments) -> Result<(Vec<ExpiringDocumentResponse>, i64)> {
        let within_days = query.within_days.unwrap_or(self.expiry_warning_days);
        if within_days < 0 {
            return Err(Error::BadRequest {
                message: "within_days must not be negative".to_string(),
            });
        }
        let today = Utc::now().date_naive();
        let horizon = today
            .checked_add_days(Days::new(within_days as u64))
            .unwrap_or(NaiveDate::MAX);

        let company_id = ctx.scope.filter_company(query.company_id);
        let mut documents = self
            .stores
            .documents
            .list(&DocumentFilter {
                company_id,
                ..DocumentFilter::new(0, UNBOUNDED).expiring_by(horizon)
            })
            .await?;
        documents.sort_by(|a, b| a.expires_on.cmp(&b.expires_on).then_with(|| a.number.cmp(&b.number)));

        let total = documents.len() as i64;
        let page = documents
            .into_iter()
            .skip(query.skip.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .filter_map(|document| {
                let expires_on = document.expires_on?;
                let expiry_state = ExpiryState::classify(Some(expires_on), today, within_days)?;
                Some(ExpiringDocumentResponse {
                    document: DocumentResponse::from(document),
                    expiry_state,
                    days_until_expiry: (expires_on - today).num_days(),
                })
            })
            .collect();
        Ok((page, total))
    }
}
