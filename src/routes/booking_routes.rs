// src/routes/booking_routes.rs

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
        booking,
        conversion::{self, Conversion, ConversionOverrides},
        optional, parse_date,
    },
    middleware::auth_context::AdminContext,
    models::{
        ApiOk, AppState, Appointment, Booking, BookingDraft, BookingFilter, BookingStatus,
        parse_calendar_date,
    },
    store::BookingStore,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(submit_booking).get(list_bookings))
        .route("/bookings/{booking_id}", get(get_booking).patch(patch_booking))
        .route("/bookings/{booking_id}/convert", post(convert_booking))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBookingRequest {
    pub status: Option<String>,
    #[serde(default)]
    pub convert: bool,
    #[serde(flatten)]
    pub conversion: ConvertRequest,
}

#[derive(Debug, Serialize)]
pub struct BookingUpdate {
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<Appointment>,
}

impl From<Conversion> for BookingUpdate {
    fn from(c: Conversion) -> Self {
        BookingUpdate {
            booking: c.booking,
            appointment: Some(c.appointment),
        }
    }
}

fn parse_status(raw: &str) -> Result<BookingStatus, ApiError> {
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

fn overrides(req: ConvertRequest) -> Result<ConversionOverrides, ApiError> {
    Ok(ConversionOverrides {
        date: req
            .appointment_date
            .as_deref()
            .map(|d| parse_date("appointmentDate", d))
            .transpose()?,
        time: optional(req.appointment_time.as_deref()),
        notes: optional(req.notes.as_deref()),
    })
}

/* ============================================================
   POST /bookings (public form)
   ============================================================ */

pub async fn submit_booking(
    State(state): State<AppState>,
    Json(req): Json<BookingDraft>,
) -> Result<Json<ApiOk<Booking>>, ApiError> {
    let today = Utc::now().date_naive();
    let data = booking::submit_booking(state.store.as_ref(), req, today).await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   Admin
   ============================================================ */

pub async fn list_bookings(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<Booking>>>, ApiError> {
    let filter = BookingFilter {
        status: q
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_status)
            .transpose()?,
        from: parse_optional_date("from", q.from.as_deref())?,
        to: parse_optional_date("to", q.to.as_deref())?,
    };
    let data = state.store.list_bookings(&filter).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn get_booking(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiOk<Booking>>, ApiError> {
    let data = state
        .store
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "booking not found".into()))?;
    Ok(Json(ApiOk { data }))
}

/// `convert: true` takes precedence over a plain status change.
pub async fn patch_booking(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<PatchBookingRequest>,
) -> Result<Json<ApiOk<BookingUpdate>>, ApiError> {
    let store = state.store.as_ref();

    if req.convert {
        let c = conversion::convert_booking(store, booking_id, overrides(req.conversion)?).await?;
        return Ok(Json(ApiOk { data: c.into() }));
    }

    let Some(raw) = req.status.as_deref() else {
        return Err(ApiError::validation("status or convert is required"));
    };
    let booking = booking::change_booking_status(store, booking_id, parse_status(raw)?).await?;
    Ok(Json(ApiOk {
        data: BookingUpdate {
            booking,
            appointment: None,
        },
    }))
}

/// The body is optional; without one the booking's own slot is used.
pub async fn convert_booking(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(booking_id): Path<Uuid>,
    body: Option<Json<ConvertRequest>>,
) -> Result<Json<ApiOk<BookingUpdate>>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let c = conversion::convert_booking(state.store.as_ref(), booking_id, overrides(req)?).await?;
    Ok(Json(ApiOk { data: c.into() }))
}
