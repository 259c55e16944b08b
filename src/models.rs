use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub session_ttl_hours: i64,
}

/* -------------------------
   Status enums
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // the admin UI has historically sent both "in-progress" and "in_progress"
        let wire = s.trim().to_ascii_lowercase().replace('_', "-");
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wire)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/* -------------------------
   Records
--------------------------*/

/// A `(date, time)` pair. Two active appointments may never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub date: NaiveDate,
    pub time: String,
}

impl Slot {
    pub fn new(date: NaiveDate, time: &str) -> Self {
        Self {
            date,
            time: time.trim().to_string(),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub service_type: String,
    pub health_concern: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub booking_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> Slot {
        Slot::new(self.appointment_date, &self.appointment_time)
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub slot: Slot,
    pub service_type: String,
    pub health_concern: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub booking_id: Option<Uuid>,
}

/// Field-level edits. `None` leaves a field untouched; the nested options
/// on nullable fields distinguish "leave" from "clear".
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub patient_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<Option<String>>,
    pub slot: Option<Slot>,
    pub service_type: Option<String>,
    pub health_concern: Option<String>,
    pub notes: Option<Option<String>>,
    pub status: Option<AppointmentStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    /// The status the transition was validated against. The store refuses the
    /// write if the row has moved on since.
    pub expected_status: Option<AppointmentStatus>,
}

impl AppointmentChanges {
    pub fn is_empty(&self) -> bool {
        self.patient_name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.slot.is_none()
            && self.service_type.is_none()
            && self.health_concern.is_none()
            && self.notes.is_none()
            && self.status.is_none()
            && self.completed_at.is_none()
    }

    pub fn apply_to(self, a: &mut Appointment, now: DateTime<Utc>) {
        if let Some(v) = self.patient_name {
            a.patient_name = v;
        }
        if let Some(v) = self.phone {
            a.phone = v;
        }
        if let Some(v) = self.email {
            a.email = v;
        }
        if let Some(slot) = self.slot {
            a.appointment_date = slot.date;
            a.appointment_time = slot.time;
        }
        if let Some(v) = self.service_type {
            a.service_type = v;
        }
        if let Some(v) = self.health_concern {
            a.health_concern = v;
        }
        if let Some(v) = self.notes {
            a.notes = v;
        }
        if let Some(v) = self.status {
            a.status = v;
        }
        if let Some(v) = self.completed_at {
            a.completed_at = Some(v);
        }
        a.updated_at = now;
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl AppointmentFilter {
    pub fn matches(&self, a: &Appointment) -> bool {
        if self.status.is_some_and(|s| s != a.status) {
            return false;
        }
        if self.from.is_some_and(|d| a.appointment_date < d) {
            return false;
        }
        if self.to.is_some_and(|d| a.appointment_date > d) {
            return false;
        }
        if let Some(q) = self.search.as_deref() {
            let q = q.to_lowercase();
            let hit = a.patient_name.to_lowercase().contains(&q)
                || a.phone.contains(&q)
                || a.email.as_deref().is_some_and(|e| e.to_lowercase().contains(&q));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub service_type: String,
    pub health_concern: String,
    pub request_callback: bool,
    pub status: BookingStatus,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn slot(&self) -> Slot {
        Slot::new(self.preferred_date, &self.preferred_time)
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub slot: Slot,
    pub service_type: String,
    pub health_concern: String,
    pub request_callback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn matches(&self, b: &Booking) -> bool {
        self.status.is_none_or(|s| s == b.status)
            && self.from.is_none_or(|d| b.preferred_date >= d)
            && self.to.is_none_or(|d| b.preferred_date <= d)
    }
}

#[derive(Debug, Clone)]
pub struct AdminUser {
    pub admin_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
}

/// A live (unexpired, unrevoked) session joined with its active admin.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub session_id: Uuid,
    pub admin_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDraft {
    pub patient_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub service_type: String,
    #[serde(default)]
    pub health_concern: String,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    pub patient_name: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub service_type: Option<String>,
    pub health_concern: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub preferred_date: String,
    pub preferred_time: String,
    pub service_type: String,
    #[serde(default)]
    pub health_concern: String,
    #[serde(default)]
    pub request_callback: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub admin: AdminProfile,
}

#[derive(Debug, Serialize)]
pub struct AdminProfile {
    pub admin_id: Uuid,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   Helpers
--------------------------*/

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // only reached when the field is present: null => Some(None)
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/// Parses a calendar date, dropping any time-of-day component.
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

/// Digits and `+` only, so "+1 (555) 010-2000" and "+15550102000" match.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_wire_names_and_underscore_variant() {
        for s in AppointmentStatus::ALL {
            assert_eq!(s.as_str().parse::<AppointmentStatus>(), Ok(s));
        }
        assert_eq!("in_progress".parse(), Ok(AppointmentStatus::InProgress));
        assert_eq!(" No-Show ".parse(), Ok(AppointmentStatus::NoShow));
        assert!("done".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let v = serde_json::to_value(AppointmentStatus::InProgress).unwrap();
        assert_eq!(v, serde_json::json!("in-progress"));
    }

    #[test]
    fn calendar_date_strips_time_of_day() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(parse_calendar_date("2026-03-14"), Some(d));
        assert_eq!(parse_calendar_date("2026-03-14T23:30:00Z"), Some(d));
        assert_eq!(parse_calendar_date("2026-03-14T09:15:00"), Some(d));
        assert_eq!(parse_calendar_date("14/03/2026"), None);
    }

    #[test]
    fn slot_trims_time() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(Slot::new(d, " 10:00 AM "), Slot::new(d, "10:00 AM"));
        assert_ne!(Slot::new(d, "10:00"), Slot::new(d, "10:00 AM"));
    }

    #[test]
    fn phone_normalisation_keeps_digits_and_plus() {
        assert_eq!(normalize_phone("+1 (555) 010-2000"), "+15550102000");
        assert_eq!(normalize_phone("071 234 5678"), "0712345678");
    }

    #[test]
    fn patch_distinguishes_null_from_missing() {
        let p: AppointmentPatch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(p.notes, Some(None));
        assert_eq!(p.email, None);
    }
}
