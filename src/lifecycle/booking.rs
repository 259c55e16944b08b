// src/lifecycle/booking.rs

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use super::{LifecycleError, optional, parse_date, required, status, validate_email, validate_phone};
use crate::models::{Booking, BookingDraft, BookingStatus, NewBooking, Slot};
use crate::store::{BookingStore, Store};

/// Public booking form. Preferred dates in the past are refused.
pub async fn submit_booking(
    store: &dyn Store,
    draft: BookingDraft,
    today: NaiveDate,
) -> Result<Booking, LifecycleError> {
    let date = parse_date("preferredDate", &draft.preferred_date)?;
    if date < today {
        return Err(LifecycleError::validation("preferredDate cannot be in the past"));
    }
    let time = required("preferredTime", &draft.preferred_time)?;

    let new = NewBooking {
        name: required("name", &draft.name)?,
        phone: validate_phone(&draft.phone)?,
        email: validate_email(draft.email.as_deref())?,
        slot: Slot::new(date, &time),
        service_type: required("serviceType", &draft.service_type)?,
        health_concern: optional(Some(&draft.health_concern)).unwrap_or_default(),
        request_callback: draft.request_callback,
    };

    let booking = store.insert_booking(new).await?;
    info!(id = %booking.id, slot = %booking.slot(), "booking received");
    Ok(booking)
}

pub async fn change_booking_status(
    store: &dyn Store,
    id: Uuid,
    to: BookingStatus,
) -> Result<Booking, LifecycleError> {
    let current = store
        .get_booking(id)
        .await?
        .ok_or(LifecycleError::NotFound { entity: "booking", id })?;

    status::validate_booking_transition(current.status, to)?;

    let updated = store.update_booking_status(id, to).await?;
    info!(%id, from = %current.status, to = %updated.status, "booking status changed");
    Ok(updated)
}
