// src/routes/appointment_routes.rs

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    lifecycle::{
        appointment, bulk,
        bulk::BulkUpdateResult,
        conflict::{self, SlotCheck},
        parse_slot, status,
    },
    middleware::auth_context::AdminContext,
    models::{
        ApiOk, AppState, Appointment, AppointmentDraft, AppointmentFilter, AppointmentPatch,
        AppointmentStatus, parse_calendar_date,
    },
    store::AppointmentStore,
};

const MAX_CALENDAR_DAYS: i64 = 62;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/calendar", get(get_calendar))
        .route("/appointments/conflicts", get(check_conflict))
        .route("/appointments/bulk-status", post(bulk_update_status))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment).patch(patch_appointment),
        )
        .route("/appointments/{appointment_id}/status", post(set_status))
}

/* ============================================================
   Query params / request bodies
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    // YYYY-MM-DD
    pub start: String,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictQuery {
    pub date: String,
    pub time: String,
    pub exclude_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    pub appointment_ids: Vec<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub active_count: usize,
    pub appointments: Vec<Appointment>,
}

/* ============================================================
   Helpers
   ============================================================ */

fn parse_status(raw: &str) -> Result<AppointmentStatus, ApiError> {
    raw.parse().map_err(|e| ApiError::validation(format!("{e}")))
}

fn parse_optional_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_calendar_date(s)
            .map(Some)
            .ok_or_else(|| ApiError::validation(format!("{field} must be YYYY-MM-DD"))),
    }
}

fn filter_from_query(q: &ListQuery) -> Result<AppointmentFilter, ApiError> {
    let filter = AppointmentFilter {
        status: q
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_status)
            .transpose()?,
        from: parse_optional_date("from", q.from.as_deref())?,
        to: parse_optional_date("to", q.to.as_deref())?,
        search: q
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    };
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(ApiError::validation("from must not be after to"));
        }
    }
    Ok(filter)
}

/// One entry per day in `[start, start + days)`, empty days included.
fn fold_into_days(start: NaiveDate, days: i64, appointments: Vec<Appointment>) -> Vec<CalendarDay> {
    let mut map: BTreeMap<NaiveDate, Vec<Appointment>> = (0..days)
        .map(|i| (start + chrono::Duration::days(i), Vec::new()))
        .collect();

    for a in appointments {
        if let Some(slot) = map.get_mut(&a.appointment_date) {
            slot.push(a);
        }
    }

    map.into_iter()
        .map(|(date, appointments)| CalendarDay {
            date,
            active_count: appointments.iter().filter(|a| a.status.is_active()).count(),
            appointments,
        })
        .collect()
}

/* ============================================================
   GET /appointments
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let filter = filter_from_query(&q)?;
    let data = state.store.list_appointments(&filter).await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   GET /appointments/calendar
   ============================================================ */

pub async fn get_calendar(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(q): Query<CalendarQuery>,
) -> Result<Json<ApiOk<Vec<CalendarDay>>>, ApiError> {
    let days = q.days.unwrap_or(7);
    if !(1..=MAX_CALENDAR_DAYS).contains(&days) {
        return Err(ApiError::validation(format!(
            "days must be between 1 and {MAX_CALENDAR_DAYS}"
        )));
    }
    let start = parse_calendar_date(&q.start)
        .ok_or_else(|| ApiError::validation("start must be YYYY-MM-DD"))?;
    let end = start + chrono::Duration::days(days - 1);

    let filter = AppointmentFilter {
        from: Some(start),
        to: Some(end),
        ..Default::default()
    };
    let rows = state.store.list_appointments(&filter).await?;

    Ok(Json(ApiOk {
        data: fold_into_days(start, days, rows),
    }))
}

/* ============================================================
   GET /appointments/conflicts
   ============================================================ */

pub async fn check_conflict(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(q): Query<ConflictQuery>,
) -> Result<Json<ApiOk<SlotCheck>>, ApiError> {
    let slot = parse_slot(&q.date, &q.time)?;
    let data = conflict::check_slot(state.store.as_ref(), &slot, q.exclude_id).await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let data = state
        .store
        .get_appointment(appointment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "appointment not found".into()))?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   POST /appointments (walk-in)
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(req): Json<AppointmentDraft>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let data = appointment::create_appointment(state.store.as_ref(), req).await?;
    tracing::debug!(admin = %admin.username, id = %data.id, "walk-in appointment");
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   PATCH /appointments/{id}
   ============================================================ */

pub async fn patch_appointment(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<AppointmentPatch>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let data =
        appointment::update_appointment(state.store.as_ref(), appointment_id, req, Utc::now())
            .await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   Status transitions
   ============================================================ */

pub async fn set_status(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let to = parse_status(&req.status)?;
    let data = status::change_status(state.store.as_ref(), appointment_id, to, Utc::now()).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn bulk_update_status(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(req): Json<BulkStatusRequest>,
) -> Result<Json<BulkUpdateResult>, ApiError> {
    let to = parse_status(&req.status)?;
    let ids = req
        .appointment_ids
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            Uuid::parse_str(raw.trim()).map_err(|_| {
                ApiError::validation(format!("appointmentIds[{i}] is not a valid id"))
            })
        })
        .collect::<Result<Vec<Uuid>, ApiError>>()?;

    let result = bulk::bulk_update_status(state.store.as_ref(), &ids, to, Utc::now()).await?;
    Ok(Json(result))
}
