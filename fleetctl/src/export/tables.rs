//! Row layouts of the exportable entities and of the fleet report.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::{Cell, Tabular};
use crate::api::models::reports::FleetReport;
use crate::db::models::{
    alerts::AlertDBResponse, costs::CostDBResponse, documents::DocumentDBResponse, drivers::DriverDBResponse,
    routes::RouteDBResponse, trips::TripDBResponse, vehicles::VehicleDBResponse,
};
use crate::types::abbrev_uuid;

fn id(value: &uuid::Uuid) -> Cell {
    Cell::Text(abbrev_uuid(value))
}

fn opt_id(value: Option<&uuid::Uuid>) -> Cell {
    value.map_or(Cell::Empty, id)
}

fn money(value: Decimal) -> Cell {
    value.to_f64().map_or_else(|| Cell::Text(value.to_string()), Cell::Number)
}

fn timestamp(value: Option<&chrono::DateTime<chrono::Utc>>) -> Cell {
    value.map_or(Cell::Empty, |t| Cell::Text(t.format("%Y-%m-%d %H:%M").to_string()))
}

impl Tabular for DriverDBResponse {
    const NAME: &'static str = "drivers";

    fn title() -> &'static str {
        "Drivers"
    }

    fn headers() -> &'static [&'static str] {
        &["Name", "Document", "License", "Category", "License expires", "Phone", "Email", "Carrier", "Status"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.name),
            Cell::text(&self.document_number),
            Cell::opt_text(self.license_number.as_deref()),
            Cell::opt_text(self.license_category.as_deref()),
            Cell::opt_date(self.license_expires_on),
            Cell::opt_text(self.phone.as_deref()),
            Cell::opt_text(self.email.as_deref()),
            opt_id(self.carrier_id.as_ref()),
            Cell::text(self.status.as_str()),
        ]
    }
}

impl Tabular for VehicleDBResponse {
    const NAME: &'static str = "vehicles";

    fn title() -> &'static str {
        "Vehicles"
    }

    fn headers() -> &'static [&'static str] {
        &["Plate", "Kind", "Manufacturer", "Model", "Year", "Capacity", "Odometer (km)", "Carrier", "Status"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.plate),
            Cell::text(self.kind.as_str()),
            Cell::opt_text(self.manufacturer.as_deref()),
            Cell::opt_text(self.model.as_deref()),
            Cell::opt_number(self.year.map(f64::from)),
            Cell::opt_number(self.capacity.map(f64::from)),
            Cell::Number(self.odometer_km),
            opt_id(self.carrier_id.as_ref()),
            Cell::text(self.status.as_str()),
        ]
    }
}

impl Tabular for RouteDBResponse {
    const NAME: &'static str = "routes";

    fn title() -> &'static str {
        "Routes"
    }

    fn headers() -> &'static [&'static str] {
        &["Code", "Name", "Origin", "Destination", "Distance (km)", "Departure", "Shift", "Status"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.code),
            Cell::text(&self.name),
            Cell::text(&self.origin),
            Cell::text(&self.destination),
            Cell::Number(self.distance_km),
            Cell::opt_text(self.departure_time.map(|t| t.format("%H:%M").to_string())),
            Cell::text(self.shift.as_str()),
            Cell::text(self.status.as_str()),
        ]
    }
}

impl Tabular for TripDBResponse {
    const NAME: &'static str = "trips";

    fn title() -> &'static str {
        "Trips"
    }

    fn headers() -> &'static [&'static str] {
        &[
            "Trip", "Route", "Scheduled for", "Started", "Finished", "Status", "Passengers", "Distance (km)", "Notes",
        ]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            id(&self.id),
            id(&self.route_id),
            timestamp(Some(&self.scheduled_for)),
            timestamp(self.started_at.as_ref()),
            timestamp(self.finished_at.as_ref()),
            Cell::text(self.status.as_str()),
            Cell::opt_number(self.passenger_count.map(f64::from)),
            Cell::opt_number(self.odometer_distance_km()),
            Cell::opt_text(self.cancellation_reason.as_deref().or(self.notes.as_deref())),
        ]
    }
}

impl Tabular for AlertDBResponse {
    const NAME: &'static str = "alerts";

    fn title() -> &'static str {
        "Alerts"
    }

    fn headers() -> &'static [&'static str] {
        &["Raised", "Kind", "Severity", "Status", "Title", "Route", "Vehicle", "Resolved", "Resolution"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            timestamp(Some(&self.created_at)),
            Cell::text(self.kind.as_str()),
            Cell::text(self.severity.as_str()),
            Cell::text(self.status.as_str()),
            Cell::text(&self.title),
            opt_id(self.route_id.as_ref()),
            opt_id(self.vehicle_id.as_ref()),
            timestamp(self.resolved_at.as_ref()),
            Cell::opt_text(self.resolution_notes.as_deref()),
        ]
    }
}

impl Tabular for CostDBResponse {
    const NAME: &'static str = "costs";

    fn title() -> &'static str {
        "Costs"
    }

    fn headers() -> &'static [&'static str] {
        &["Date", "Category", "Amount", "Currency", "Description", "Route", "Vehicle", "Carrier"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::Date(self.incurred_on),
            Cell::text(self.category.as_str()),
            money(self.amount),
            Cell::text(&self.currency),
            Cell::opt_text(self.description.as_deref()),
            opt_id(self.route_id.as_ref()),
            opt_id(self.vehicle_id.as_ref()),
            opt_id(self.carrier_id.as_ref()),
        ]
    }
}

impl Tabular for DocumentDBResponse {
    const NAME: &'static str = "documents";

    fn title() -> &'static str {
        "Documents"
    }

    fn headers() -> &'static [&'static str] {
        &["Type", "Number", "Owner", "Owner id", "Issued", "Expires", "Notes"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::text(self.doc_type.as_str()),
            Cell::text(&self.number),
            Cell::text(self.owner_kind.as_str()),
            id(&self.owner_id),
            Cell::opt_date(self.issued_on),
            Cell::opt_date(self.expires_on),
            Cell::opt_text(self.notes.as_deref()),
        ]
    }
}

/// One metric of the fleet report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub section: &'static str,
    pub metric: String,
    pub value: Cell,
}

impl ReportLine {
    fn new(section: &'static str, metric: impl Into<String>, value: Cell) -> Self {
        Self {
            section,
            metric: metric.into(),
            value,
        }
    }
}

impl Tabular for ReportLine {
    const NAME: &'static str = "report";

    fn title() -> &'static str {
        "Fleet report"
    }

    fn headers() -> &'static [&'static str] {
        &["Section", "Metric", "Value"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![Cell::text(self.section), Cell::text(&self.metric), self.value.clone()]
    }
}

/// Flatten a report into one line per metric.
pub fn report_lines(report: &FleetReport) -> Vec<ReportLine> {
    let mut lines = vec![
        ReportLine::new("period", "from", Cell::Date(report.from)),
        ReportLine::new("period", "to", Cell::Date(report.to)),
    ];
    let counts = [
        ("routes", &report.routes_by_status),
        ("drivers", &report.drivers_by_status),
        ("vehicles", &report.vehicles_by_status),
        ("trips", &report.trips_by_status),
    ];
    for (section, by_status) in counts {
        lines.extend(
            by_status
                .iter()
                .map(|(status, count)| ReportLine::new(section, status.clone(), Cell::Number(*count as f64))),
        );
    }
    lines.push(ReportLine::new("trips", "total", Cell::Number(report.total_trips as f64)));
    lines.push(ReportLine::new("trips", "completion_rate", Cell::opt_number(report.completion_rate)));
    lines.push(ReportLine::new("distance", "total_km", Cell::Number(report.total_distance_km)));
    lines.extend(
        report
            .costs_by_category
            .iter()
            .map(|(category, amount)| ReportLine::new("costs", category.clone(), money(*amount))),
    );
    lines.push(ReportLine::new("costs", "total", money(report.total_cost)));
    lines.push(ReportLine::new("costs", "per_km", report.cost_per_km.map_or(Cell::Empty, money)));
    lines.extend(
        report
            .alerts_by_severity
            .iter()
            .map(|(severity, count)| ReportLine::new("alerts", severity.clone(), Cell::Number(*count as f64))),
    );
    lines.push(ReportLine::new("alerts", "open", Cell::Number(report.open_alerts as f64)));
    lines
}
