use std::env;

use anyhow::bail;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Non-persistent, for local development and demos.
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub cors_allow_any: bool,
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store_backend = match get("STORE_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND must be postgres or memory, got {other:?}"),
        };

        let database_url = get("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let db_max_connections = get("DB_MAX_CONNECTIONS")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let session_ttl_hours = get("SESSION_TTL_HOURS")
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);
        let cors_allow_any = get("CORS_ALLOW_ANY")
            .map(|s| !matches!(s.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        let bootstrap_admin = match (
            get("BOOTSTRAP_ADMIN_USERNAME"),
            get("BOOTSTRAP_ADMIN_PASSWORD_HASH"),
        ) {
            (Some(u), Some(h)) if !u.trim().is_empty() && !h.trim().is_empty() => {
                Some((u.trim().to_string(), h.trim().to_string()))
            }
            _ => None,
        };

        Ok(Self {
            store_backend,
            database_url,
            db_max_connections,
            bind_addr,
            session_ttl_hours,
            cors_allow_any,
            bootstrap_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn postgres_requires_database_url() {
        assert!(load(&[]).is_err());
        let cfg = load(&[("DATABASE_URL", "postgres://localhost/clinic")]).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Postgres);
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.session_ttl_hours, 24);
        assert!(cfg.bootstrap_admin.is_none());
    }

    #[test]
    fn memory_backend_and_overrides() {
        let cfg = load(&[
            ("STORE_BACKEND", "memory"),
            ("SESSION_TTL_HOURS", "8"),
            ("CORS_ALLOW_ANY", "false"),
            ("BOOTSTRAP_ADMIN_USERNAME", "director"),
            ("BOOTSTRAP_ADMIN_PASSWORD_HASH", "$argon2id$..."),
        ])
        .unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert_eq!(cfg.session_ttl_hours, 8);
        assert!(!cfg.cors_allow_any);
        assert_eq!(cfg.bootstrap_admin.unwrap().0, "director");
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(load(&[("STORE_BACKEND", "sqlite")]).is_err());
    }
}
