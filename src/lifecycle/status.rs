// src/lifecycle/status.rs

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::{LifecycleError, conflict};
use crate::models::{Appointment, AppointmentChanges, AppointmentStatus, BookingStatus};
use crate::store::{AppointmentStore, Store};

impl AppointmentStatus {
    pub fn allowed_transitions(self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[InProgress, Completed, Cancelled, NoShow],
            InProgress => &[Completed, Cancelled, NoShow],
            Completed | Cancelled => &[],
            NoShow => &[Scheduled, Cancelled],
        }
    }

    pub fn can_transition_to(self, to: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// `completed` and `cancelled` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Statuses that hold their slot.
    pub fn is_active(self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::InProgress)
    }
}

impl BookingStatus {
    pub fn allowed_transitions(self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            Pending => &[Confirmed, Completed, Cancelled],
            Confirmed => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: BookingStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

fn article(s: &str) -> &'static str {
    match s.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

pub fn validate_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), LifecycleError> {
    if from.can_transition_to(to) {
        return Ok(());
    }

    let msg = if from.is_terminal() {
        format!("cannot change {} {from} appointment", article(from.as_str()))
    } else if from == to {
        format!("appointment is already {to}")
    } else {
        format!(
            "cannot move {} {from} appointment to {to}",
            article(from.as_str())
        )
    };
    Err(LifecycleError::Validation(msg))
}

pub fn validate_booking_transition(
    from: BookingStatus,
    to: BookingStatus,
) -> Result<(), LifecycleError> {
    if from.can_transition_to(to) {
        return Ok(());
    }
    if from == to {
        return Err(LifecycleError::validation(format!("booking is already {to}")));
    }
    Err(LifecycleError::validation(format!(
        "cannot move {} {from} booking to {to}",
        article(from.as_str())
    )))
}

/// The field changes a validated transition implies.
pub fn transition_changes(
    from: AppointmentStatus,
    to: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<AppointmentChanges, LifecycleError> {
    validate_transition(from, to)?;
    Ok(AppointmentChanges {
        status: Some(to),
        completed_at: (to == AppointmentStatus::Completed).then_some(now),
        expected_status: Some(from),
        ..Default::default()
    })
}

/// Moves one appointment to `to`. Re-entering an active status (a no-show
/// reopened as scheduled) must find its slot still free.
pub async fn change_status(
    store: &dyn Store,
    id: Uuid,
    to: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<Appointment, LifecycleError> {
    let current = store
        .get_appointment(id)
        .await?
        .ok_or(LifecycleError::NotFound { entity: "appointment", id })?;

    let changes = match transition_changes(current.status, to, now) {
        Ok(c) => c,
        Err(e) => {
            warn!(%id, from = %current.status, %to, "status transition denied");
            return Err(e);
        }
    };

    if !current.status.is_active() && to.is_active() {
        conflict::ensure_slot_free(store, &current.slot(), Some(id)).await?;
    }

    let updated = store.update_appointment(id, changes).await?;

    info!(%id, from = %current.status, to = %updated.status, "appointment status changed");
    Ok(updated)
}
