use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Partial unique index that keeps two active appointments out of one slot.
pub const ACTIVE_SLOT_INDEX: &str = "appointment_active_slot_uidx";

pub async fn connect_pg(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Idempotent schema bootstrap, run once at startup.
pub async fn init_schema(pool: &PgPool) -> anyhow::Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS appointment (
            id UUID PRIMARY KEY,
            patient_name TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT,
            appointment_date DATE NOT NULL,
            appointment_time TEXT NOT NULL,
            service_type TEXT NOT NULL,
            health_concern TEXT NOT NULL DEFAULT '',
            notes TEXT,
            status TEXT NOT NULL DEFAULT 'scheduled'
                CHECK (status IN ('scheduled', 'in-progress', 'completed', 'cancelled', 'no-show')),
            booking_id UUID,
            completed_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS appointment_active_slot_uidx
            ON appointment (appointment_date, appointment_time)
            WHERE status IN ('scheduled', 'in-progress')
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS appointment_date_idx
            ON appointment (appointment_date, appointment_time)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS booking (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT,
            preferred_date DATE NOT NULL,
            preferred_time TEXT NOT NULL,
            service_type TEXT NOT NULL,
            health_concern TEXT NOT NULL DEFAULT '',
            request_callback BOOLEAN NOT NULL DEFAULT false,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled')),
            appointment_id UUID UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS admin_user (
            admin_id UUID PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS admin_session (
            session_id UUID PRIMARY KEY,
            admin_id UUID NOT NULL REFERENCES admin_user (admin_id),
            token_hash TEXT NOT NULL UNIQUE,
            expires_at TIMESTAMPTZ NOT NULL,
            revoked_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    tracing::info!("database schema ready");
    Ok(())
}
