// src/lifecycle/appointment.rs

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::{
    LifecycleError, conflict, optional, parse_date, required, status, validate_email,
    validate_phone,
};
use crate::models::{
    Appointment, AppointmentChanges, AppointmentDraft, AppointmentPatch, AppointmentStatus,
    NewAppointment, Slot,
};
use crate::store::{AppointmentStore, Store};

fn parse_status(raw: &str) -> Result<AppointmentStatus, LifecycleError> {
    raw.parse()
        .map_err(|e| LifecycleError::validation(format!("{e}")))
}

/// Walk-in creation. New appointments start active, so the slot must be free.
pub async fn create_appointment(
    store: &dyn Store,
    draft: AppointmentDraft,
) -> Result<Appointment, LifecycleError> {
    let status = match draft.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => AppointmentStatus::Scheduled,
        Some(raw) => parse_status(raw)?,
    };
    if !status.is_active() {
        return Err(LifecycleError::validation(
            "new appointments must be scheduled or in-progress",
        ));
    }

    let date = parse_date("appointmentDate", &draft.appointment_date)?;
    let time = required("appointmentTime", &draft.appointment_time)?;
    let slot = Slot::new(date, &time);

    let new = NewAppointment {
        patient_name: required("patientName", &draft.patient_name)?,
        phone: validate_phone(&draft.phone)?,
        email: validate_email(draft.email.as_deref())?,
        slot,
        service_type: required("serviceType", &draft.service_type)?,
        health_concern: required("healthConcern", &draft.health_concern)?,
        notes: optional(draft.notes.as_deref()),
        status,
        booking_id: None,
    };

    conflict::ensure_slot_free(store, &new.slot, None).await?;

    let created = match store.insert_appointment(new).await {
        Ok(a) => a,
        Err(e) => return Err(conflict::explain_store_error(store, e, None).await),
    };

    info!(id = %created.id, slot = %created.slot(), "appointment created");
    Ok(created)
}

/// Field edits from the appointment editor. A status that differs from the
/// current one goes through the transition table; a reschedule of an active
/// appointment is conflict-checked against everyone but itself.
pub async fn update_appointment(
    store: &dyn Store,
    id: Uuid,
    patch: AppointmentPatch,
    now: DateTime<Utc>,
) -> Result<Appointment, LifecycleError> {
    let current = store
        .get_appointment(id)
        .await?
        .ok_or(LifecycleError::NotFound { entity: "appointment", id })?;

    let mut changes = AppointmentChanges::default();

    if let Some(raw) = patch.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let to = parse_status(raw)?;
        if to != current.status {
            changes = status::transition_changes(current.status, to, now)?;
        }
    }

    let date = match patch.appointment_date.as_deref() {
        Some(raw) => parse_date("appointmentDate", raw)?,
        None => current.appointment_date,
    };
    let time = match patch.appointment_time.as_deref() {
        Some(raw) => required("appointmentTime", raw)?,
        None => current.appointment_time.clone(),
    };
    let slot = Slot::new(date, &time);
    let moved = slot != current.slot();
    if moved {
        if current.status.is_terminal() {
            return Err(LifecycleError::validation(format!(
                "cannot reschedule a {} appointment",
                current.status
            )));
        }
        changes.slot = Some(slot.clone());
    }

    if let Some(v) = patch.patient_name.as_deref() {
        changes.patient_name = Some(required("patientName", v)?);
    }
    if let Some(v) = patch.phone.as_deref() {
        changes.phone = Some(validate_phone(v)?);
    }
    if let Some(v) = patch.email {
        changes.email = Some(validate_email(v.as_deref())?);
    }
    if let Some(v) = patch.service_type.as_deref() {
        changes.service_type = Some(required("serviceType", v)?);
    }
    if let Some(v) = patch.health_concern.as_deref() {
        changes.health_concern = Some(required("healthConcern", v)?);
    }
    if let Some(v) = patch.notes {
        changes.notes = Some(optional(v.as_deref()));
    }

    if changes.is_empty() {
        return Ok(current);
    }

    let final_status = changes.status.unwrap_or(current.status);
    let reactivated = !current.status.is_active() && final_status.is_active();
    if final_status.is_active() && (moved || reactivated) {
        conflict::ensure_slot_free(store, &slot, Some(id)).await?;
    }

    let updated = match store.update_appointment(id, changes).await {
        Ok(a) => a,
        Err(e) => return Err(conflict::explain_store_error(store, e, Some(id)).await),
    };

    info!(%id, status = %updated.status, moved, "appointment updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::lifecycle::testing::{day, seed};
    use crate::models::AppointmentStatus::*;
    use crate::store::{AppointmentStore, MemoryStore};

    fn draft(name: &str, date: &str, time: &str) -> AppointmentDraft {
        AppointmentDraft {
            patient_name: name.into(),
            phone: "0712 345 678".into(),
            email: Some("patient@example.org".into()),
            appointment_date: date.into(),
            appointment_time: time.into(),
            service_type: "physiotherapy".into(),
            health_concern: "knee".into(),
            notes: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn second_booking_for_same_slot_names_first_patient() {
        let store = MemoryStore::new();
        create_appointment(&store, draft("Patient X", "2026-11-05", "10:00"))
            .await
            .unwrap();

        let err = create_appointment(&store, draft("Patient Y", "2026-11-05", "10:00"))
            .await
            .unwrap_err();
        match err {
            LifecycleError::Conflict(c) => {
                assert_eq!(c.patient_name, "Patient X");
                assert_eq!(c.appointment_time, "10:00");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        let all = store.list_appointments(&Default::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_creates_for_one_slot_leave_one_winner() {
        let store = Arc::new(MemoryStore::new());

        let tasks: Vec<_> = ["Patient X", "Patient Y"]
            .into_iter()
            .map(|name| {
                let store = Arc::clone(&store);
                let d = draft(name, "2026-11-07", "16:00");
                tokio::spawn(async move { create_appointment(&*store, d).await })
            })
            .collect();

        let mut won = Vec::new();
        let mut lost = Vec::new();
        for t in tasks {
            match t.await.unwrap() {
                Ok(a) => won.push(a),
                Err(LifecycleError::Conflict(c)) => lost.push(c),
                Err(other) => panic!("unexpected {other:?}"),
            }
        }

        assert_eq!(won.len(), 1);
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].appointment_id, won[0].id);
        assert_eq!(lost[0].patient_name, won[0].patient_name);
    }

    #[tokio::test]
    async fn create_validates_required_fields_and_status() {
        let store = MemoryStore::new();

        let mut d = draft("", "2026-11-05", "10:00");
        assert!(matches!(
            create_appointment(&store, d).await,
            Err(LifecycleError::Validation(_))
        ));

        d = draft("Ada", "2026-11-05", "10:00");
        d.status = Some("completed".into());
        assert!(matches!(
            create_appointment(&store, d).await,
            Err(LifecycleError::Validation(_))
        ));

        d = draft("Ada", "2026-11-05T08:00:00Z", "10:00");
        d.status = Some("in-progress".into());
        let a = create_appointment(&store, d).await.unwrap();
        assert_eq!(a.status, InProgress);
        assert_eq!(a.appointment_date, day(5));
    }

    #[tokio::test]
    async fn reschedule_into_taken_slot_is_a_conflict() {
        let store = MemoryStore::new();
        seed(&store, "Ada", day(5), "10:00", Scheduled).await;
        let ben = seed(&store, "Ben", day(5), "11:00", Scheduled).await;

        let patch = AppointmentPatch {
            appointment_time: Some("10:00".into()),
            ..Default::default()
        };
        let err = update_appointment(&store, ben.id, patch, Utc::now()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Conflict(_)));
    }

    #[tokio::test]
    async fn resaving_same_slot_and_status_does_not_conflict_with_itself() {
        let store = MemoryStore::new();
        let ada = seed(&store, "Ada", day(5), "10:00", Scheduled).await;

        let patch = AppointmentPatch {
            appointment_date: Some("2026-11-05".into()),
            appointment_time: Some("10:00".into()),
            status: Some("scheduled".into()),
            notes: Some(Some("bring x-rays".into())),
            ..Default::default()
        };
        let a = update_appointment(&store, ada.id, patch, Utc::now()).await.unwrap();
        assert_eq!(a.notes.as_deref(), Some("bring x-rays"));
        assert_eq!(a.status, Scheduled);
    }

    #[tokio::test]
    async fn edit_status_goes_through_validator() {
        let store = MemoryStore::new();
        let ada = seed(&store, "Ada", day(5), "10:00", InProgress).await;

        let patch = AppointmentPatch {
            status: Some("scheduled".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_appointment(&store, ada.id, patch, Utc::now()).await,
            Err(LifecycleError::Validation(_))
        ));

        let patch = AppointmentPatch {
            status: Some("completed".into()),
            ..Default::default()
        };
        let done = update_appointment(&store, ada.id, patch, Utc::now()).await.unwrap();
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn terminal_appointment_cannot_be_rescheduled() {
        let store = MemoryStore::new();
        let ada = seed(&store, "Ada", day(5), "10:00", Cancelled).await;

        let patch = AppointmentPatch {
            appointment_date: Some("2026-11-06".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_appointment(&store, ada.id, patch, Utc::now()).await,
            Err(LifecycleError::Validation(_))
        ));

        // notes are still editable
        let patch = AppointmentPatch {
            notes: Some(Some("refund issued".into())),
            ..Default::default()
        };
        let a = update_appointment(&store, ada.id, patch, Utc::now()).await.unwrap();
        assert_eq!(a.status, Cancelled);
    }
}
