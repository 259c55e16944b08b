// src/store/mod.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    ActiveSession, AdminUser, Appointment, AppointmentChanges, AppointmentFilter,
    AppointmentStatus, Booking, BookingFilter, BookingStatus, NewAdmin, NewAppointment,
    NewBooking, Slot,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("slot {date} {time} is already held by an active appointment")]
    SlotTaken { date: NaiveDate, time: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("appointment {id} is now {found}, not {expected}")]
    StatusChanged {
        id: Uuid,
        expected: AppointmentStatus,
        found: AppointmentStatus,
    },
    #[error("booking {0} is already linked to an appointment")]
    AlreadyConverted(Uuid),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn slot_taken(slot: &Slot) -> Self {
        StoreError::SlotTaken {
            date: slot.date,
            time: slot.time.clone(),
        }
    }

    /// `Err(StatusChanged)` when `changes` was validated against a status the
    /// stored row no longer has.
    pub fn check_expected_status(
        current: &Appointment,
        changes: &AppointmentChanges,
    ) -> Result<(), Self> {
        match changes.expected_status {
            Some(expected) if expected != current.status => Err(StoreError::StatusChanged {
                id: current.id,
                expected,
                found: current.status,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError>;

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Ordered by date, then time.
    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// The scheduled/in-progress appointment holding `slot`, ignoring `exclude`.
    async fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError>;

    /// Honors `changes.expected_status` under the same lock as the write.
    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Appointment, StoreError>;

    /// `phone` must already be normalised.
    async fn appointments_by_phone(&self, phone: &str) -> Result<Vec<Appointment>, StoreError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, new: NewBooking) -> Result<Booking, StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Newest first.
    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError>;

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, StoreError>;

    /// Inserts `new` and links it with the booking in one unit: the booking
    /// gets `appointment_id` and moves from pending to confirmed.
    async fn convert_booking(
        &self,
        booking_id: Uuid,
        new: NewAppointment,
    ) -> Result<(Booking, Appointment), StoreError>;

    async fn bookings_by_phone(&self, phone: &str) -> Result<Vec<Booking>, StoreError>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_admin_by_username(&self, username: &str)
    -> Result<Option<AdminUser>, StoreError>;

    async fn insert_admin(&self, new: NewAdmin) -> Result<AdminUser, StoreError>;

    async fn create_session(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError>;

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveSession>, StoreError>;

    async fn revoke_session(&self, session_id: Uuid) -> Result<(), StoreError>;
}

pub trait Store: AppointmentStore + BookingStore + AdminStore + Send + Sync {}

impl<T> Store for T where T: AppointmentStore + BookingStore + AdminStore + Send + Sync {}
