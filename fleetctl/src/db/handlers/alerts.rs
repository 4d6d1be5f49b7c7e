//! Database repository for alerts.

use crate::api::models::alerts::{AlertKind, AlertSeverity, AlertStatus};
use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, contains_ci, matches_nullable, matches_opt, opt_contains_ci};
use crate::db::handlers::repository::Repository;
use crate::db::models::alerts::{AlertCreateDBRequest, AlertDBResponse, AlertUpdateDBRequest};
use crate::types::{AlertId, CompanyId, DriverId, RouteId, TripId, VehicleId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing alerts
#[derive(Debug, Clone)]
pub struct AlertFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    /// Any of these statuses
    pub statuses: Option<Vec<AlertStatus>>,
    pub severity: Option<AlertSeverity>,
    pub kind: Option<AlertKind>,
    pub route_id: Option<RouteId>,
    pub trip_id: Option<TripId>,
    pub vehicle_id: Option<VehicleId>,
    pub driver_id: Option<DriverId>,
    /// Raised at or after (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Raised before (exclusive)
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring search on title and description
    pub search: Option<String>,
}

impl AlertFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            statuses: None,
            severity: None,
            kind: None,
            route_id: None,
            trip_id: None,
            vehicle_id: None,
            driver_id: None,
            from: None,
            to: None,
            search: None,
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<AlertStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    /// Alerts that still need attention
    pub fn unresolved(self) -> Self {
        self.with_statuses(vec![AlertStatus::Open, AlertStatus::Acknowledged])
    }

    pub fn with_route(mut self, route_id: RouteId) -> Self {
        self.route_id = Some(route_id);
        self
    }

    pub fn with_driver(mut self, driver_id: DriverId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    pub fn with_vehicle(mut self, vehicle_id: VehicleId) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self
    }

    pub fn raised_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

pub struct Alerts {
    db: PgPool,
}

impl Alerts {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &AlertFilter) {
        if let Some(company_id) = filter.company_id {
            query.push(" AND company_id = ");
            query.push_bind(company_id);
        }
        if let Some(ref statuses) = filter.statuses {
            query.push(" AND status = ANY(");
            query.push_bind(statuses.clone());
            query.push(")");
        }
        if let Some(severity) = filter.severity {
            query.push(" AND severity = ");
            query.push_bind(severity);
        }
        if let Some(kind) = filter.kind {
            query.push(" AND kind = ");
            query.push_bind(kind);
        }
        if let Some(route_id) = filter.route_id {
            query.push(" AND route_id = ");
            query.push_bind(route_id);
        }
        if let Some(trip_id) = filter.trip_id {
            query.push(" AND trip_id = ");
            query.push_bind(trip_id);
        }
        if let Some(vehicle_id) = filter.vehicle_id {
            query.push(" AND vehicle_id = ");
            query.push_bind(vehicle_id);
        }
        if let Some(driver_id) = filter.driver_id {
            query.push(" AND driver_id = ");
            query.push_bind(driver_id);
        }
        if let Some(from) = filter.from {
            query.push(" AND created_at >= ");
            query.push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND created_at < ");
            query.push_bind(to);
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query.push(" AND (title ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(description, '') ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

#[async_trait::async_trait]
impl Repository for Alerts {
    type CreateRequest = AlertCreateDBRequest;
    type UpdateRequest = AlertUpdateDBRequest;
    type Response = AlertDBResponse;
    type Id = AlertId;
    type Filter = AlertFilter;

    #[instrument(skip(self, request), fields(kind = request.kind.as_str(), severity = request.severity.as_str()), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let alert = sqlx::query_as::<_, AlertDBResponse>(
            r#"
            INSERT INTO alerts (id, company_id, kind, severity, status, title, description, route_id, trip_id,
                                vehicle_id, driver_id, raised_by)
            VALUES ($1, $2, $3, $4, 'open', $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.company_id)
        .bind(request.kind)
        .bind(request.severity)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.route_id)
        .bind(request.trip_id)
        .bind(request.vehicle_id)
        .bind(request.driver_id)
        .bind(request.raised_by)
        .fetch_one(&self.db)
        .await?;

        Ok(alert)
    }

    #[instrument(skip(self), fields(alert_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let alert = sqlx::query_as::<_, AlertDBResponse>("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(alert)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let alerts = sqlx::query_as::<_, AlertDBResponse>("SELECT * FROM alerts WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(alerts.into_iter().map(|a| (a.id, a)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM alerts WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let alerts = query.build_query_as::<AlertDBResponse>().fetch_all(&self.db).await?;
        Ok(alerts)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM alerts WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(alert_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let alert = sqlx::query_as::<_, AlertDBResponse>(
            r#"
            UPDATE alerts SET
                status = COALESCE($2, status),
                acknowledged_by = COALESCE($3, acknowledged_by),
                acknowledged_at = COALESCE($4, acknowledged_at),
                resolved_by = COALESCE($5, resolved_by),
                resolved_at = COALESCE($6, resolved_at),
                resolution_notes = COALESCE($7, resolution_notes),
                vehicle_id = CASE WHEN $8 THEN $9 ELSE vehicle_id END,
                driver_id = CASE WHEN $10 THEN $11 ELSE driver_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.status)
        .bind(request.acknowledged_by)
        .bind(request.acknowledged_at)
        .bind(request.resolved_by)
        .bind(request.resolved_at)
        .bind(&request.resolution_notes)
        .bind(request.vehicle_id.is_some())
        .bind(request.vehicle_id.flatten())
        .bind(request.driver_id.is_some())
        .bind(request.driver_id.flatten())
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(alert)
    }

    #[instrument(skip(self), fields(alert_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1").bind(id).execute(&self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for AlertDBResponse {
    type Create = AlertCreateDBRequest;
    type Update = AlertUpdateDBRequest;
    type Filter = AlertFilter;

    const TABLE: &'static str = "alerts";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            company_id: request.company_id,
            kind: request.kind,
            severity: request.severity,
            status: AlertStatus::Open,
            title: request.title.clone(),
            description: request.description.clone(),
            route_id: request.route_id,
            trip_id: request.trip_id,
            vehicle_id: request.vehicle_id,
            driver_id: request.driver_id,
            raised_by: request.raised_by,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(status) = request.status {
            self.status = status;
        }
        if let Some(user) = request.acknowledged_by {
            self.acknowledged_by = Some(user);
        }
        if let Some(at) = request.acknowledged_at {
            self.acknowledged_at = Some(at);
        }
        if let Some(user) = request.resolved_by {
            self.resolved_by = Some(user);
        }
        if let Some(at) = request.resolved_at {
            self.resolved_at = Some(at);
        }
        if let Some(notes) = &request.resolution_notes {
            self.resolution_notes = Some(notes.clone());
        }
        if let Some(vehicle_id) = request.vehicle_id {
            self.vehicle_id = vehicle_id;
        }
        if let Some(driver_id) = request.driver_id {
            self.driver_id = driver_id;
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.company_id, &self.company_id)
            && filter.statuses.as_ref().is_none_or(|statuses| statuses.contains(&self.status))
            && matches_opt(&filter.severity, &self.severity)
            && matches_opt(&filter.kind, &self.kind)
            && matches_nullable(&filter.route_id, &self.route_id)
            && matches_nullable(&filter.trip_id, &self.trip_id)
            && matches_nullable(&filter.vehicle_id, &self.vehicle_id)
            && matches_nullable(&filter.driver_id, &self.driver_id)
            && filter.from.is_none_or(|from| self.created_at >= from)
            && filter.to.is_none_or(|to| self.created_at < to)
            && filter
                .search
                .as_deref()
                .is_none_or(|s| contains_ci(&self.title, s) || opt_contains_ci(self.description.as_deref(), s))
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        other.created_at.cmp(&self.created_at)
    }
}
