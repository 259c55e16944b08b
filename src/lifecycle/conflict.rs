// src/lifecycle/conflict.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::LifecycleError;
use crate::models::{Appointment, Slot};
use crate::store::{AppointmentStore, Store, StoreError};

/// Enough of the occupying appointment to tell the user which slot to avoid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSummary {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
}

impl From<&Appointment> for ConflictSummary {
    fn from(a: &Appointment) -> Self {
        Self {
            appointment_id: a.id,
            patient_name: a.patient_name.clone(),
            appointment_date: a.appointment_date,
            appointment_time: a.appointment_time.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCheck {
    pub conflict: bool,
    pub conflicting: Option<ConflictSummary>,
}

/// Read-only. Only scheduled and in-progress appointments occupy a slot.
pub async fn check_slot(
    store: &dyn Store,
    slot: &Slot,
    exclude: Option<Uuid>,
) -> Result<SlotCheck, LifecycleError> {
    let holder = store
        .find_active_in_slot(slot, exclude)
        .await?
        .filter(|a| a.status.is_active());

    debug!(%slot, ?exclude, occupied = holder.is_some(), "slot checked");

    Ok(SlotCheck {
        conflict: holder.is_some(),
        conflicting: holder.as_ref().map(ConflictSummary::from),
    })
}

pub async fn ensure_slot_free(
    store: &dyn Store,
    slot: &Slot,
    exclude: Option<Uuid>,
) -> Result<(), LifecycleError> {
    match check_slot(store, slot, exclude).await?.conflicting {
        None => Ok(()),
        Some(summary) => {
            warn!(%slot, holder = %summary.appointment_id, "slot conflict");
            Err(LifecycleError::Conflict(summary))
        }
    }
}

/// A write lost the race to the storage index after the pre-check passed.
/// Re-read the winner so the caller still gets a named conflict.
pub(crate) async fn explain_store_error(
    store: &dyn Store,
    err: StoreError,
    exclude: Option<Uuid>,
) -> LifecycleError {
    let StoreError::SlotTaken { date, time } = &err else {
        return err.into();
    };
    let slot = Slot::new(*date, time);
    match ensure_slot_free(store, &slot, exclude).await {
        Err(conflict @ LifecycleError::Conflict(_)) => conflict,
        _ => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{day, seed};
    use crate::models::AppointmentStatus::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn occupied_slot_reports_holder() {
        let store = MemoryStore::new();
        let ada = seed(&store, "Ada", day(3), "10:00", Scheduled).await;

        let check = check_slot(&store, &Slot::new(day(3), "10:00"), None).await.unwrap();
        assert!(check.conflict);
        let holder = check.conflicting.unwrap();
        assert_eq!(holder.appointment_id, ada.id);
        assert_eq!(holder.patient_name, "Ada");
    }

    #[tokio::test]
    async fn excluded_id_does_not_conflict_with_itself() {
        let store = MemoryStore::new();
        let ada = seed(&store, "Ada", day(3), "10:00", InProgress).await;

        let check = check_slot(&store, &ada.slot(), Some(ada.id)).await.unwrap();
        assert!(!check.conflict);
    }

    #[tokio::test]
    async fn terminal_and_no_show_never_conflict() {
        let store = MemoryStore::new();
        seed(&store, "Ada", day(3), "10:00", Completed).await;
        seed(&store, "Ben", day(3), "10:00", Cancelled).await;
        seed(&store, "Cy", day(3), "10:00", NoShow).await;

        assert!(ensure_slot_free(&store, &Slot::new(day(3), "10:00"), None).await.is_ok());
    }

    #[tokio::test]
    async fn different_time_string_is_a_different_slot() {
        let store = MemoryStore::new();
        seed(&store, "Ada", day(3), "10:00", Scheduled).await;

        assert!(ensure_slot_free(&store, &Slot::new(day(3), "10:30"), None).await.is_ok());
        assert!(ensure_slot_free(&store, &Slot::new(day(4), "10:00"), None).await.is_ok());
        assert!(ensure_slot_free(&store, &Slot::new(day(3), " 10:00 "), None).await.is_err());
    }

    #[tokio::test]
    async fn index_rejection_is_reported_as_named_conflict() {
        let store = MemoryStore::new();
        let ada = seed(&store, "Ada", day(6), "14:00", Scheduled).await;

        let lost = StoreError::slot_taken(&ada.slot());
        match explain_store_error(&store, lost, None).await {
            LifecycleError::Conflict(c) => {
                assert_eq!(c.appointment_id, ada.id);
                assert_eq!(c.patient_name, "Ada");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn index_rejection_without_visible_holder_stays_a_store_error() {
        let store = MemoryStore::new();
        let lost = StoreError::slot_taken(&Slot::new(day(6), "14:00"));

        let err = explain_store_error(&store, lost, None).await;
        assert!(matches!(err, LifecycleError::Store(StoreError::SlotTaken { .. })));

        let other = explain_store_error(&store, StoreError::Backend("down".into()), None).await;
        assert!(matches!(other, LifecycleError::Store(StoreError::Backend(_))));
    }
}
