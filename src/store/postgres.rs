// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{AdminStore, AppointmentStore, BookingStore, StoreError};
use crate::db::ACTIVE_SLOT_INDEX;
use crate::models::{
    ActiveSession, AdminUser, Appointment, AppointmentChanges, AppointmentFilter,
    AppointmentStatus, Booking, BookingFilter, BookingStatus, NewAdmin, NewAppointment,
    NewBooking, Slot,
};

pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Maps a unique violation on the active-slot index to `SlotTaken`.
fn slot_error(e: sqlx::Error, slot: &Slot) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() && db.constraint() == Some(ACTIVE_SLOT_INDEX) {
            return StoreError::slot_taken(slot);
        }
    }
    e.into()
}

/* -------------------------
   DB Row Models
--------------------------*/

const APPOINTMENT_COLUMNS: &str = r#"
    id, patient_name, phone, email, appointment_date, appointment_time,
    service_type, health_concern, notes, status, booking_id, completed_at,
    created_at, updated_at
"#;

const BOOKING_COLUMNS: &str = r#"
    id, name, phone, email, preferred_date, preferred_time, service_type,
    health_concern, request_callback, status, appointment_id, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    id: Uuid,
    patient_name: String,
    phone: String,
    email: Option<String>,
    appointment_date: NaiveDate,
    appointment_time: String,
    service_type: String,
    health_concern: String,
    notes: Option<String>,
    status: String,
    booking_id: Option<Uuid>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(r: AppointmentRow) -> Result<Self, Self::Error> {
        let status: AppointmentStatus = r
            .status
            .parse()
            .map_err(|e| StoreError::Backend(format!("appointment {}: {e}", r.id)))?;
        Ok(Appointment {
            id: r.id,
            patient_name: r.patient_name,
            phone: r.phone,
            email: r.email,
            appointment_date: r.appointment_date,
            appointment_time: r.appointment_time,
            service_type: r.service_type,
            health_concern: r.health_concern,
            notes: r.notes,
            status,
            booking_id: r.booking_id,
            completed_at: r.completed_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    preferred_date: NaiveDate,
    preferred_time: String,
    service_type: String,
    health_concern: String,
    request_callback: bool,
    status: String,
    appointment_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(r: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = r
            .status
            .parse()
            .map_err(|e| StoreError::Backend(format!("booking {}: {e}", r.id)))?;
        Ok(Booking {
            id: r.id,
            name: r.name,
            phone: r.phone,
            email: r.email,
            preferred_date: r.preferred_date,
            preferred_time: r.preferred_time,
            service_type: r.service_type,
            health_concern: r.health_concern,
            request_callback: r.request_callback,
            status,
            appointment_id: r.appointment_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    admin_id: Uuid,
    username: String,
    display_name: String,
    password_hash: String,
    is_active: bool,
}

impl From<AdminRow> for AdminUser {
    fn from(r: AdminRow) -> Self {
        AdminUser {
            admin_id: r.admin_id,
            username: r.username,
            display_name: r.display_name,
            password_hash: r.password_hash,
            is_active: r.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_id: Uuid,
    admin_id: Uuid,
    username: String,
    display_name: String,
    expires_at: DateTime<Utc>,
}

/// `%q%` for ILIKE with `\`, `%` and `_` in `q` taken literally.
fn contains_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

async fn insert_appointment_in<'e, E>(exec: E, new: &NewAppointment) -> Result<Appointment, StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row: AppointmentRow = sqlx::query_as(
        r#"
        INSERT INTO appointment (
          id, patient_name, phone, email, appointment_date, appointment_time,
          service_type, health_concern, notes, status, booking_id
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING id, patient_name, phone, email, appointment_date, appointment_time,
                  service_type, health_concern, notes, status, booking_id, completed_at,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.patient_name)
    .bind(&new.phone)
    .bind(new.email.as_deref())
    .bind(new.slot.date)
    .bind(&new.slot.time)
    .bind(&new.service_type)
    .bind(&new.health_concern)
    .bind(new.notes.as_deref())
    .bind(new.status.as_str())
    .bind(new.booking_id)
    .fetch_one(exec)
    .await
    .map_err(|e| slot_error(e, &new.slot))?;

    row.try_into()
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        insert_appointment_in(&self.db, &new).await
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Appointment::try_from).transpose()
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE TRUE"
        ));
        if let Some(s) = filter.status {
            qb.push(" AND status = ").push_bind(s.as_str());
        }
        if let Some(d) = filter.from {
            qb.push(" AND appointment_date >= ").push_bind(d);
        }
        if let Some(d) = filter.to {
            qb.push(" AND appointment_date <= ").push_bind(d);
        }
        if let Some(q) = filter.search.as_deref() {
            let like = contains_pattern(q);
            qb.push(" AND (patient_name ILIKE ")
                .push_bind(like.clone())
                .push(r" ESCAPE '\' OR phone ILIKE ")
                .push_bind(like.clone())
                .push(r" ESCAPE '\' OR email ILIKE ")
                .push_bind(like)
                .push(r" ESCAPE '\')");
        }
        qb.push(" ORDER BY appointment_date ASC, appointment_time ASC");

        let rows: Vec<AppointmentRow> = qb.build_query_as().fetch_all(&self.db).await?;
        collect(rows)
    }

    async fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE appointment_date = $1
              AND appointment_time = $2
              AND status IN ('scheduled', 'in-progress')
              AND ($3::uuid IS NULL OR id <> $3)
            LIMIT 1
            "#
        ))
        .bind(slot.date)
        .bind(&slot.time)
        .bind(exclude)
        .fetch_optional(&self.db)
        .await?;

        row.map(Appointment::try_from).transpose()
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Appointment, StoreError> {
        let mut tx = self.db.begin().await?;

        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(StoreError::NotFound { entity: "appointment", id });
        };

        let mut next = Appointment::try_from(row)?;
        StoreError::check_expected_status(&next, &changes)?;
        changes.apply_to(&mut next, Utc::now());
        let slot = next.slot();

        let row: AppointmentRow = sqlx::query_as(&format!(
            r#"
            UPDATE appointment
            SET patient_name = $2,
                phone = $3,
                email = $4,
                appointment_date = $5,
                appointment_time = $6,
                service_type = $7,
                health_concern = $8,
                notes = $9,
                status = $10,
                completed_at = $11,
                updated_at = now()
            WHERE id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&next.patient_name)
        .bind(&next.phone)
        .bind(next.email.as_deref())
        .bind(slot.date)
        .bind(&slot.time)
        .bind(&next.service_type)
        .bind(&next.health_concern)
        .bind(next.notes.as_deref())
        .bind(next.status.as_str())
        .bind(next.completed_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| slot_error(e, &slot))?;

        tx.commit().await?;
        row.try_into()
    }

    async fn appointments_by_phone(&self, phone: &str) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE regexp_replace(phone, '[^0-9+]', '', 'g') = $1
            ORDER BY appointment_date ASC, appointment_time ASC
            "#
        ))
        .bind(phone)
        .fetch_all(&self.db)
        .await?;

        collect(rows)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn insert_booking(&self, new: NewBooking) -> Result<Booking, StoreError> {
        let row: BookingRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO booking (
              id, name, phone, email, preferred_date, preferred_time,
              service_type, health_concern, request_callback, status
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,'pending')
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.phone)
        .bind(new.email.as_deref())
        .bind(new.slot.date)
        .bind(&new.slot.time)
        .bind(&new.service_type)
        .bind(&new.health_concern)
        .bind(new.request_callback)
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM booking WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {BOOKING_COLUMNS} FROM booking WHERE TRUE"));
        if let Some(s) = filter.status {
            qb.push(" AND status = ").push_bind(s.as_str());
        }
        if let Some(d) = filter.from {
            qb.push(" AND preferred_date >= ").push_bind(d);
        }
        if let Some(d) = filter.to {
            qb.push(" AND preferred_date <= ").push_bind(d);
        }
        qb.push(" ORDER BY created_at DESC");

        let rows: Vec<BookingRow> = qb.build_query_as().fetch_all(&self.db).await?;
        collect(rows)
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, StoreError> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE booking
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.db)
        .await?;

        row.ok_or(StoreError::NotFound { entity: "booking", id })?
            .try_into()
    }

    async fn convert_booking(
        &self,
        booking_id: Uuid,
        new: NewAppointment,
    ) -> Result<(Booking, Appointment), StoreError> {
        let mut tx = self.db.begin().await?;

        let linked: Option<Option<Uuid>> = sqlx::query_scalar(
            r#"
            SELECT appointment_id
            FROM booking
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        match linked {
            None => {
                return Err(StoreError::NotFound {
                    entity: "booking",
                    id: booking_id,
                });
            }
            Some(Some(_)) => return Err(StoreError::AlreadyConverted(booking_id)),
            Some(None) => {}
        }

        let appointment = insert_appointment_in(&mut *tx, &new).await?;

        let row: BookingRow = sqlx::query_as(&format!(
            r#"
            UPDATE booking
            SET appointment_id = $2,
                status = CASE WHEN status = 'pending' THEN 'confirmed' ELSE status END,
                updated_at = now()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking_id)
        .bind(appointment.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((row.try_into()?, appointment))
    }

    async fn bookings_by_phone(&self, phone: &str) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM booking
            WHERE regexp_replace(phone, '[^0-9+]', '', 'g') = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(phone)
        .fetch_all(&self.db)
        .await?;

        collect(rows)
    }
}

#[async_trait]
impl AdminStore for PgStore {
    async fn find_admin_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AdminUser>, StoreError> {
        let row: Option<AdminRow> = sqlx::query_as(
            r#"
            SELECT admin_id, username, display_name, password_hash, is_active
            FROM admin_user
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(AdminUser::from))
    }

    async fn insert_admin(&self, new: NewAdmin) -> Result<AdminUser, StoreError> {
        let row: AdminRow = sqlx::query_as(
            r#"
            INSERT INTO admin_user (admin_id, username, display_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING admin_id, username, display_name, password_hash, is_active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.display_name)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(format!("admin {}", new.username))
            }
            _ => e.into(),
        })?;

        Ok(row.into())
    }

    async fn create_session(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO admin_session (session_id, admin_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING session_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(admin_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveSession>, StoreError> {
        let row: Option<SessionLookupRow> = sqlx::query_as(
            r#"
            SELECT s.session_id, s.admin_id, u.username, u.display_name, s.expires_at
            FROM admin_session s
            JOIN admin_user u ON u.admin_id = s.admin_id
            WHERE s.token_hash = $1
              AND s.revoked_at IS NULL
              AND s.expires_at > $2
              AND u.is_active = true
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| ActiveSession {
            session_id: r.session_id,
            admin_id: r.admin_id,
            username: r.username,
            display_name: r.display_name,
            expires_at: r.expires_at,
        }))
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE admin_session
            SET revoked_at = now()
            WHERE session_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(session_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
