// src/lifecycle/conversion.rs

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{LifecycleError, conflict};
use crate::models::{Appointment, AppointmentStatus, Booking, BookingStatus, NewAppointment, Slot};
use crate::store::{BookingStore, Store, StoreError};

const CALLBACK_NOTE: &str = "Patient asked for a callback before the visit.";

/// Admin adjustments applied while converting; unset parts come from the booking.
#[derive(Debug, Clone, Default)]
pub struct ConversionOverrides {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub booking: Booking,
    pub appointment: Appointment,
}

/// Turns a pending/confirmed booking into a scheduled appointment and links
/// the two. Nothing is written when the slot is taken.
pub async fn convert_booking(
    store: &dyn Store,
    booking_id: Uuid,
    overrides: ConversionOverrides,
) -> Result<Conversion, LifecycleError> {
    let booking = store
        .get_booking(booking_id)
        .await?
        .ok_or(LifecycleError::NotFound { entity: "booking", id: booking_id })?;

    if let Some(existing) = booking.appointment_id {
        return Err(LifecycleError::validation(format!(
            "booking is already linked to appointment {existing}"
        )));
    }
    if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Confirmed) {
        return Err(LifecycleError::validation(format!(
            "cannot convert a {} booking",
            booking.status
        )));
    }

    let slot = Slot::new(
        overrides.date.unwrap_or(booking.preferred_date),
        overrides.time.as_deref().unwrap_or(&booking.preferred_time),
    );
    conflict::ensure_slot_free(store, &slot, None).await?;

    let notes = overrides
        .notes
        .or_else(|| booking.request_callback.then(|| CALLBACK_NOTE.to_string()));

    let new = NewAppointment {
        patient_name: booking.name.clone(),
        phone: booking.phone.clone(),
        email: booking.email.clone(),
        slot,
        service_type: booking.service_type.clone(),
        health_concern: booking.health_concern.clone(),
        notes,
        status: AppointmentStatus::Scheduled,
        booking_id: Some(booking.id),
    };

    let (booking, appointment) = match store.convert_booking(booking_id, new).await {
        Ok(pair) => pair,
        Err(StoreError::AlreadyConverted(id)) => {
            warn!(booking = %id, "booking converted concurrently");
            return Err(LifecycleError::validation(
                "booking was converted by another request",
            ));
        }
        Err(e) => return Err(conflict::explain_store_error(store, e, None).await),
    };

    info!(
        booking = %booking.id,
        appointment = %appointment.id,
        slot = %appointment.slot(),
        "booking converted to appointment"
    );
    Ok(Conversion { booking, appointment })
}
