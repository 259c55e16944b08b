// src/lifecycle/lookup.rs

use chrono::NaiveDate;
use serde::Serialize;

use super::{LifecycleError, validate_phone};
use crate::models::{Appointment, AppointmentStatus, Booking, normalize_phone};
use crate::store::{AppointmentStore, BookingStore, Store};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatientStats {
    pub total: usize,
    pub upcoming: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientLookup {
    pub phone: String,
    pub appointments: Vec<Appointment>,
    pub bookings: Vec<Booking>,
    pub stats: PatientStats,
}

/// Upcoming means still holding a slot dated today or later.
pub fn stats_for(appointments: &[Appointment], today: NaiveDate) -> PatientStats {
    PatientStats {
        total: appointments.len(),
        upcoming: appointments
            .iter()
            .filter(|a| a.status.is_active() && a.appointment_date >= today)
            .count(),
        completed: appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed)
            .count(),
    }
}

pub async fn lookup_patient(
    store: &dyn Store,
    phone: &str,
    today: NaiveDate,
) -> Result<PatientLookup, LifecycleError> {
    let phone = normalize_phone(&validate_phone(phone)?);

    let appointments = store.appointments_by_phone(&phone).await?;
    let bookings = store.bookings_by_phone(&phone).await?;
    let stats = stats_for(&appointments, today);

    Ok(PatientLookup {
        phone,
        appointments,
        bookings,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{day, seed};
    use crate::models::AppointmentStatus::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn aggregates_by_phone() {
        let store = MemoryStore::new();
        seed(&store, "Ada", day(1), "09:00", Completed).await;
        seed(&store, "Ada", day(8), "09:00", Scheduled).await;
        seed(&store, "Ada", day(2), "09:00", Scheduled).await;
        seed(&store, "Ada", day(9), "09:00", Cancelled).await;

        let found = lookup_patient(&store, "(071) 234-5678", day(5)).await.unwrap();
        assert_eq!(found.phone, "0712345678");
        assert_eq!(
            found.stats,
            PatientStats {
                total: 4,
                upcoming: 1,
                completed: 1
            }
        );
        assert!(found.bookings.is_empty());
    }

    #[tokio::test]
    async fn short_phone_is_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            lookup_patient(&store, "123", day(5)).await,
            Err(LifecycleError::Validation(_))
        ));
    }
}
