//! Appointment lifecycle: status transitions, slot conflicts, bulk updates,
//! booking conversion and patient lookup. Every operation takes the store and
//! the current time explicitly so the rules stay independent of HTTP.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Slot, normalize_phone, parse_calendar_date};
use crate::store::StoreError;

pub mod appointment;
pub mod booking;
pub mod bulk;
pub mod conflict;
pub mod conversion;
pub mod lookup;
pub mod status;

pub use conflict::ConflictSummary;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("{} is already booked at {} on {}", .0.patient_name, .0.appointment_time, .0.appointment_date)]
    Conflict(ConflictSummary),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LifecycleError::Validation(msg.into())
    }
}

pub(crate) fn required(field: &str, value: &str) -> Result<String, LifecycleError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(LifecycleError::validation(format!("{field} is required")));
    }
    Ok(v.to_string())
}

pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, LifecycleError> {
    parse_calendar_date(raw)
        .ok_or_else(|| LifecycleError::validation(format!("{field} must be a date (YYYY-MM-DD)")))
}

pub(crate) fn parse_slot(date: &str, time: &str) -> Result<Slot, LifecycleError> {
    let date = parse_date("date", date)?;
    let time = required("time", time)?;
    Ok(Slot::new(date, &time))
}

pub(crate) fn validate_phone(raw: &str) -> Result<String, LifecycleError> {
    let phone = required("phone", raw)?;
    let digits = normalize_phone(&phone).chars().filter(char::is_ascii_digit).count();
    if digits < 7 {
        return Err(LifecycleError::validation("phone must contain at least 7 digits"));
    }
    Ok(phone)
}

pub(crate) fn validate_email(raw: Option<&str>) -> Result<Option<String>, LifecycleError> {
    let Some(email) = optional(raw) else {
        return Ok(None);
    };
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(Some(email)),
        _ => Err(LifecycleError::validation("email is not a valid address")),
    }
}
