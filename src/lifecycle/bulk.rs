// src/lifecycle/bulk.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::{LifecycleError, status};
use crate::models::AppointmentStatus;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedItem {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResult {
    pub updated_count: usize,
    pub skipped: Vec<Uuid>,
    pub skipped_reasons: Vec<SkippedItem>,
}

impl BulkUpdateResult {
    fn skip(&mut self, id: Uuid, reason: String) {
        self.skipped.push(id);
        self.skipped_reasons.push(SkippedItem { id, reason });
    }
}

/// Applies `target` to each id on its own. A refused id is reported in
/// `skipped` and never stops the rest of the batch.
pub async fn bulk_update_status(
    store: &dyn Store,
    ids: &[Uuid],
    target: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<BulkUpdateResult, LifecycleError> {
    if ids.is_empty() {
        return Err(LifecycleError::validation("appointmentIds must not be empty"));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    let mut result = BulkUpdateResult::default();

    for &id in ids {
        if !seen.insert(id) {
            continue;
        }
        match status::change_status(store, id, target, now).await {
            Ok(_) => result.updated_count += 1,
            Err(LifecycleError::Store(e @ StoreError::Backend(_))) => {
                error!(%id, error = %e, "bulk status update failed on store");
                result.skip(id, e.to_string());
            }
            Err(e) => result.skip(id, e.to_string()),
        }
    }

    info!(
        %target,
        requested = seen.len(),
        updated = result.updated_count,
        skipped = result.skipped.len(),
        "bulk status update finished"
    );
    Ok(result)
}
