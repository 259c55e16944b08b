// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AdminStore, AppointmentStore, BookingStore, StoreError};
use crate::models::{
    ActiveSession, AdminUser, Appointment, AppointmentChanges, AppointmentFilter, Booking,
    BookingFilter, BookingStatus, NewAdmin, NewAppointment, NewBooking, Slot, normalize_phone,
};

#[derive(Debug, Clone)]
struct SessionEntry {
    admin_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    bookings: HashMap<Uuid, Booking>,
    admins: HashMap<Uuid, AdminUser>,
    sessions: HashMap<Uuid, SessionEntry>,
}

impl Tables {
    fn active_holder(&self, slot: &Slot, exclude: Option<Uuid>) -> Option<&Appointment> {
        self.appointments.values().find(|a| {
            Some(a.id) != exclude
                && a.status.is_active()
                && a.appointment_date == slot.date
                && a.appointment_time == slot.time
        })
    }

    fn insert_appointment(&mut self, new: NewAppointment, now: DateTime<Utc>) -> Result<Appointment, StoreError> {
        if new.status.is_active() && self.active_holder(&new.slot, None).is_some() {
            return Err(StoreError::slot_taken(&new.slot));
        }
        let a = Appointment {
            id: Uuid::new_v4(),
            patient_name: new.patient_name,
            phone: new.phone,
            email: new.email,
            appointment_date: new.slot.date,
            appointment_time: new.slot.time,
            service_type: new.service_type,
            health_concern: new.health_concern,
            notes: new.notes,
            status: new.status,
            booking_id: new.booking_id,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.appointments.insert(a.id, a.clone());
        Ok(a)
    }
}

/// Process-local store with the same slot guarantee as the Postgres index:
/// every check-and-write happens under one write lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_by_slot(v: &mut [Appointment]) {
    v.sort_by(|a, b| {
        (a.appointment_date, &a.appointment_time).cmp(&(b.appointment_date, &b.appointment_time))
    });
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut t = self.tables.write().await;
        t.insert_appointment(new, Utc::now())
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Appointment> = t
            .appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        sort_by_slot(&mut out);
        Ok(out)
    }

    async fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.active_holder(slot, exclude).cloned())
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Appointment, StoreError> {
        let mut t = self.tables.write().await;
        let Some(current) = t.appointments.get(&id) else {
            return Err(StoreError::NotFound { entity: "appointment", id });
        };

        StoreError::check_expected_status(current, &changes)?;

        let mut next = current.clone();
        changes.apply_to(&mut next, Utc::now());

        if next.status.is_active() && t.active_holder(&next.slot(), Some(id)).is_some() {
            return Err(StoreError::slot_taken(&next.slot()));
        }

        t.appointments.insert(id, next.clone());
        Ok(next)
    }

    async fn appointments_by_phone(&self, phone: &str) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Appointment> = t
            .appointments
            .values()
            .filter(|a| normalize_phone(&a.phone) == phone)
            .cloned()
            .collect();
        sort_by_slot(&mut out);
        Ok(out)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, new: NewBooking) -> Result<Booking, StoreError> {
        let now = Utc::now();
        let b = Booking {
            id: Uuid::new_v4(),
            name: new.name,
            phone: new.phone,
            email: new.email,
            preferred_date: new.slot.date,
            preferred_time: new.slot.time,
            service_type: new.service_type,
            health_concern: new.health_concern,
            request_callback: new.request_callback,
            status: BookingStatus::Pending,
            appointment_id: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.bookings.insert(b.id, b.clone());
        Ok(b)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Booking> = t
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, StoreError> {
        let mut t = self.tables.write().await;
        let b = t
            .bookings
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "booking", id })?;
        b.status = status;
        b.updated_at = Utc::now();
        Ok(b.clone())
    }

    async fn convert_booking(
        &self,
        booking_id: Uuid,
        new: NewAppointment,
    ) -> Result<(Booking, Appointment), StoreError> {
        let mut t = self.tables.write().await;
        match t.bookings.get(&booking_id) {
            None => {
                return Err(StoreError::NotFound {
                    entity: "booking",
                    id: booking_id,
                });
            }
            Some(b) if b.appointment_id.is_some() => {
                return Err(StoreError::AlreadyConverted(booking_id));
            }
            Some(_) => {}
        }

        let now = Utc::now();
        let appointment = t.insert_appointment(new, now)?;

        let b = t
            .bookings
            .get_mut(&booking_id)
            .ok_or(StoreError::NotFound { entity: "booking", id: booking_id })?;
        b.appointment_id = Some(appointment.id);
        if b.status == BookingStatus::Pending {
            b.status = BookingStatus::Confirmed;
        }
        b.updated_at = now;
        Ok((b.clone(), appointment))
    }

    async fn bookings_by_phone(&self, phone: &str) -> Result<Vec<Booking>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Booking> = t
            .bookings
            .values()
            .filter(|b| normalize_phone(&b.phone) == phone)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn find_admin_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AdminUser>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.admins.values().find(|a| a.username == username).cloned())
    }

    async fn insert_admin(&self, new: NewAdmin) -> Result<AdminUser, StoreError> {
        let mut t = self.tables.write().await;
        if t.admins.values().any(|a| a.username == new.username) {
            return Err(StoreError::Duplicate(format!("admin {}", new.username)));
        }
        let admin = AdminUser {
            admin_id: Uuid::new_v4(),
            username: new.username,
            display_name: new.display_name,
            password_hash: new.password_hash,
            is_active: true,
        };
        t.admins.insert(admin.admin_id, admin.clone());
        Ok(admin)
    }

    async fn create_session(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.tables.write().await.sessions.insert(
            id,
            SessionEntry {
                admin_id,
                token_hash: token_hash.to_string(),
                expires_at,
                revoked: false,
            },
        );
        Ok(id)
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveSession>, StoreError> {
        let t = self.tables.read().await;
        let found = t.sessions.iter().find(|(_, s)| {
            s.token_hash == token_hash && !s.revoked && s.expires_at > now
        });
        let Some((session_id, s)) = found else {
            return Ok(None);
        };
        Ok(t.admins
            .get(&s.admin_id)
            .filter(|a| a.is_active)
            .map(|a| ActiveSession {
                session_id: *session_id,
                admin_id: a.admin_id,
                username: a.username.clone(),
                display_name: a.display_name.clone(),
                expires_at: s.expires_at,
            }))
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        if let Some(s) = self.tables.write().await.sessions.get_mut(&session_id) {
            s.revoked = true;
        }
        Ok(())
    }
}
