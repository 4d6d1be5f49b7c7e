//! Fleet report and dashboard aggregation.
//!
//! Both are computed from repository listings rather than SQL aggregates, so they behave the same
//! on every storage backend. Inputs are bounded by company and date range.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::instrument;

use crate::api::models::alerts::{AlertSeverity, AlertStatus};
use crate::api::models::reports::{DashboardStats, FleetReport};
use crate::api::models::routes::RouteStatus;
use crate::api::models::trips::TripStatus;
use crate::db::Stores;
use crate::db::handlers::Repository as _;
use crate::db::handlers::alerts::AlertFilter;
use crate::db::handlers::costs::CostFilter;
use crate::db::handlers::documents::DocumentFilter;
use crate::db::handlers::drivers::DriverFilter;
use crate::db::handlers::repository::UNBOUNDED;
use crate::db::handlers::routes::RouteFilter;
use crate::db::handlers::trips::TripFilter;
use crate::db::handlers::vehicles::VehicleFilter;
use crate::errors::{Error, Result};
use crate::types::CompanyId;

/// Length of the report range when `from` is omitted
pub const DEFAULT_RANGE_DAYS: u64 = 30;

/// completed / (completed + cancelled), `None` when neither happened.
pub fn completion_rate(completed: i64, cancelled: i64) -> Option<f64> {
    let finished = completed + cancelled;
    (finished > 0).then(|| completed as f64 / finished as f64)
}

/// Cost per kilometre rounded to cents, `None` for zero (or unusable) distance.
pub fn cost_per_km(total_cost: Decimal, distance_km: f64) -> Option<Decimal> {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return None;
    }
    let distance = Decimal::from_f64(distance_km)?;
    if distance.is_zero() {
        return None;
    }
    total_cost.checked_div(distance).map(|per_km| per_km.round_dp(2))
}

/// Resolve an optional `[from, to]` day range; `to` defaults to today.
pub fn resolve_range(from: Option<NaiveDate>, to: Option<NaiveDate>, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let to = to.unwrap_or(today);
    let from = match from {
        Some(from) => from,
        None => to.checked_sub_days(Days::new(DEFAULT_RANGE_DAYS)).unwrap_or(NaiveDate::MIN),
    };
    if from > to {
        return Err(Error::BadRequest {
            message: format!("from ({from}) must not be after to ({to})"),
        });
    }
    Ok((from, to))
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Half-open timestamp range covering whole days `[from, to]`.
fn day_bounds(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = to.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
    (start_of(from), start_of(end))
}

fn tally<T>(items: impl IntoIterator<Item = T>, key: impl Fn(&T) -> &'static str) -> BTreeMap<String, i64> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(key(&item).to_string()).or_insert(0) += 1;
    }
    counts
}

fn by_severity<'a>(severities: impl IntoIterator<Item = &'a AlertSeverity>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = AlertSeverity::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
    for severity in severities {
        *counts.entry(severity.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

#[instrument(skip(stores), err)]
pub async fn fleet_report(stores: &Stores, company_id: Option<CompanyId>, from: NaiveDate, to: NaiveDate) -> Result<FleetReport> {
    let (start, end) = day_bounds(from, to);

    let routes = stores
        .routes
        .list(&RouteFilter {
            company_id,
            ..RouteFilter::new(0, UNBOUNDED)
        })
        .await?;
    let drivers = stores
        .drivers
        .list(&DriverFilter {
            company_id,
            ..DriverFilter::new(0, UNBOUNDED)
        })
        .await?;
    let vehicles = stores
        .vehicles
        .list(&VehicleFilter {
            company_id,
            ..VehicleFilter::new(0, UNBOUNDED)
        })
        .await?;
    let trips = stores
        .trips
        .list(&TripFilter {
            company_id,
            ..TripFilter::new(0, UNBOUNDED).scheduled_between(start, end)
        })
        .await?;
    let costs = stores
        .costs
        .list(&CostFilter {
            company_id,
            ..CostFilter::new(0, UNBOUNDED).incurred_between(from, to)
        })
        .await?;
    let alerts = stores
        .alerts
        .list(&AlertFilter {
            company_id,
            ..AlertFilter::new(0, UNBOUNDED).raised_between(start, end)
        })
        .await?;

    // Completed trips without both odometer readings count their route's planned distance
    let missing: HashSet<_> = trips
        .iter()
        .filter(|t| t.status == TripStatus::Completed && t.odometer_distance_km().is_none())
        .map(|t| t.route_id)
        .collect();
    let fallback = if missing.is_empty() {
        Default::default()
    } else {
        stores.routes.get_bulk(missing.into_iter().collect()).await?
    };
    let total_distance_km: f64 = trips
        .iter()
        .filter(|t| t.status == TripStatus::Completed)
        .map(|t| {
            t.odometer_distance_km()
                .or_else(|| fallback.get(&t.route_id).map(|r| r.distance_km))
                .unwrap_or(0.0)
        })
        .sum();

    let mut costs_by_category = BTreeMap::new();
    for cost in &costs {
        *costs_by_category.entry(cost.category.as_str().to_string()).or_insert(Decimal::ZERO) += cost.amount;
    }
    let total_cost: Decimal = costs.iter().map(|c| c.amount).sum();

    let trips_by_status = tally(&trips, |t| t.status.as_str());
    let completed = trips.iter().filter(|t| t.status == TripStatus::Completed).count() as i64;
    let cancelled = trips.iter().filter(|t| t.status == TripStatus::Cancelled).count() as i64;

    Ok(FleetReport {
        company_id,
        from,
        to,
        routes_by_status: tally(&routes, |r| r.status.as_str()),
        drivers_by_status: tally(&drivers, |d| d.status.as_str()),
        vehicles_by_status: tally(&vehicles, |v| v.status.as_str()),
        trips_by_status,
        total_trips: trips.len() as i64,
        completion_rate: completion_rate(completed, cancelled),
        total_distance_km,
        costs_by_category,
        total_cost,
        cost_per_km: cost_per_km(total_cost, total_distance_km),
        alerts_by_severity: by_severity(alerts.iter().map(|a| &a.severity)),
        open_alerts: alerts.iter().filter(|a| a.status != AlertStatus::Resolved).count() as i64,
        generated_at: Utc::now(),
    })
}

#[instrument(skip(stores), err)]
pub async fn dashboard_stats(stores: &Stores, company_id: Option<CompanyId>, expiry_warning_days: i64, today: NaiveDate) -> Result<DashboardStats> {
    let (start, end) = day_bounds(today, today);

    let active_routes = stores
        .routes
        .count(&RouteFilter {
            company_id,
            ..RouteFilter::new(0, UNBOUNDED).with_status(RouteStatus::Active)
        })
        .await?;
    let trips = stores
        .trips
        .list(&TripFilter {
            company_id,
            ..TripFilter::new(0, UNBOUNDED).scheduled_between(start, end)
        })
        .await?;
    let open_alerts = stores
        .alerts
        .list(&AlertFilter {
            company_id,
            ..AlertFilter::new(0, UNBOUNDED).unresolved()
        })
        .await?;
    let vehicles = stores
        .vehicles
        .list(&VehicleFilter {
            company_id,
            ..VehicleFilter::new(0, UNBOUNDED)
        })
        .await?;
    let horizon = today
        .checked_add_days(Days::new(expiry_warning_days.max(0) as u64))
        .unwrap_or(NaiveDate::MAX);
    let expiring_documents = stores
        .documents
        .count(&DocumentFilter {
            company_id,
            ..DocumentFilter::new(0, UNBOUNDED).expiring_by(horizon)
        })
        .await?;
    let month_start = today.with_day(1).unwrap_or(today);
    let month_to_date_cost = stores
        .costs
        .list(&CostFilter {
            company_id,
            ..CostFilter::new(0, UNBOUNDED).incurred_between(month_start, today)
        })
        .await?
        .iter()
        .map(|c| c.amount)
        .sum();

    Ok(DashboardStats {
        company_id,
        active_routes,
        trips_today: tally(&trips, |t| t.status.as_str()),
        open_alerts_by_severity: by_severity(open_alerts.iter().map(|a| &a.severity)),
        vehicles_by_status: tally(&vehicles, |v| v.status.as_str()),
        expiring_documents,
        month_to_date_cost,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::alerts::AlertKind;
    use crate::api::models::costs::CostCategory;
    use crate::db::models::alerts::AlertCreateDBRequest;
    use crate::db::models::costs::CostCreateDBRequest;
    use crate::db::models::trips::{TripCreateDBRequest, TripUpdateDBRequest};
    use crate::test_utils::{create_test_company, create_test_route};
    use std::str::FromStr;
    use tokio_test::{assert_err, assert_ok};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[test]
    fn test_completion_rate() {
        assert_eq!(completion_rate(0, 0), None);
        assert_eq!(completion_rate(3, 1), Some(0.75));
        assert_eq!(completion_rate(0, 2), Some(0.0));
    }

    #[test]
    fn test_cost_per_km() {
        assert_eq!(cost_per_km(Decimal::from(100), 0.0), None);
        assert_eq!(cost_per_km(Decimal::from(100), -3.0), None);
        assert_eq!(cost_per_km(Decimal::from(100), f64::NAN), None);
        assert_eq!(cost_per_km(Decimal::from(100), 40.0), Some(Decimal::from_str("2.50").unwrap()));
        assert_eq!(cost_per_km(Decimal::from(10), 3.0), Some(Decimal::from_str("3.33").unwrap()));
    }

    #[test]
    fn test_resolve_range() {
        let today = day("2024-03-31");
        assert_eq!(assert_ok!(resolve_range(None, None, today)), (day("2024-03-01"), today));
        assert_eq!(
            assert_ok!(resolve_range(Some(day("2024-01-01")), Some(day("2024-01-31")), today)),
            (day("2024-01-01"), day("2024-01-31"))
        );
        let err = assert_err!(resolve_range(Some(day("2024-02-01")), Some(day("2024-01-01")), today));
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    async fn trip(stores: &Stores, company_id: CompanyId, route_id: uuid::Uuid, on: NaiveDate, update: TripUpdateDBRequest) {
        let created = stores
            .trips
            .create(&TripCreateDBRequest {
                company_id,
                route_id,
                carrier_id: None,
                driver_id: None,
                vehicle_id: None,
                scheduled_for: start_of(on) + chrono::Duration::hours(7),
                passenger_count: None,
                notes: None,
            })
            .await
            .unwrap();
        stores.trips.update(created.id, &update).await.unwrap();
    }

    #[tokio::test]
    async fn test_fleet_report_arithmetic() {
        let stores = Stores::in_memory();
        let acme = create_test_company(&stores, "Acme").await;
        let other = create_test_company(&stores, "Other").await;
        let route = create_test_route(&stores, acme.id, None).await;
        let foreign_route = create_test_route(&stores, other.id, None).await;
        let on = day("2024-05-10");

        let completed = |start: Option<f64>, end: Option<f64>| TripUpdateDBRequest {
            status: Some(TripStatus::Completed),
            start_odometer_km: start,
            end_odometer_km: end,
            ..Default::default()
        };
        // 100 km by odometer, 25 km from the route, one cancelled, one still scheduled
        trip(&stores, acme.id, route.id, on, completed(Some(1000.0), Some(1100.0))).await;
        trip(&stores, acme.id, route.id, on, completed(None, None)).await;
        trip(
            &stores,
            acme.id,
            route.id,
            on,
            TripUpdateDBRequest {
                status: Some(TripStatus::Cancelled),
                ..Default::default()
            },
        )
        .await;
        trip(&stores, acme.id, route.id, on, TripUpdateDBRequest::default()).await;
        // Out of range and other company
        trip(&stores, acme.id, route.id, day("2024-04-01"), completed(None, None)).await;
        trip(&stores, other.id, foreign_route.id, on, completed(None, None)).await;

        for amount in ["200.00", "50.00"] {
            stores
                .costs
                .create(&CostCreateDBRequest {
                    company_id: acme.id,
                    category: CostCategory::Fuel,
                    amount: Decimal::from_str(amount).unwrap(),
                    currency: "BRL".to_string(),
                    incurred_on: on,
                    description: None,
                    route_id: Some(route.id),
                    vehicle_id: None,
                    carrier_id: None,
                    trip_id: None,
                    recorded_by: None,
                })
                .await
                .unwrap();
        }
        stores
            .alerts
            .create(&AlertCreateDBRequest {
                company_id: acme.id,
                kind: AlertKind::Delay,
                severity: AlertSeverity::High,
                title: "Late departure".to_string(),
                description: None,
                route_id: Some(route.id),
                trip_id: None,
                vehicle_id: None,
                driver_id: None,
                raised_by: None,
            })
            .await
            .unwrap();

        // Alerts are stamped with the current time, so the range runs up to today
        let today = Utc::now().date_naive();
        let report = fleet_report(&stores, Some(acme.id), day("2024-05-01"), today).await.unwrap();

        assert_eq!(report.total_trips, 4);
        assert_eq!(report.trips_by_status.get("completed"), Some(&2));
        assert_eq!(report.trips_by_status.get("scheduled"), Some(&1));
        assert_eq!(report.completion_rate, Some(2.0 / 3.0));
        assert_eq!(report.total_distance_km, 125.0);
        assert_eq!(report.total_cost, Decimal::from_str("250.00").unwrap());
        assert_eq!(report.costs_by_category.get("fuel"), Some(&Decimal::from_str("250.00").unwrap()));
        assert_eq!(report.cost_per_km, Some(Decimal::from_str("2.00").unwrap()));
        assert_eq!(report.alerts_by_severity.get("high"), Some(&1));
        assert_eq!(report.alerts_by_severity.get("low"), Some(&0));
        assert_eq!(report.open_alerts, 1);
        assert_eq!(report.routes_by_status.get("planned"), Some(&1));
    }

    #[tokio::test]
    async fn test_empty_report_has_no_ratios() {
        let stores = Stores::in_memory();
        let report = fleet_report(&stores, None, day("2024-05-01"), day("2024-05-31")).await.unwrap();
        assert_eq!(report.total_trips, 0);
        assert_eq!(report.completion_rate, None);
        assert_eq!(report.cost_per_km, None);
        assert_eq!(report.total_cost, Decimal::ZERO);
    }
}
