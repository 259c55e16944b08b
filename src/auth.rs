use argon2::{
    Argon2,
    PasswordHash,
    PasswordVerifier,
    PasswordHasher,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};

use crate::models::NewAdmin;
use crate::store::{AdminStore, Store, StoreError};

/// Checks a login password against the admin's stored argon2 PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Argon2id with a fresh salt; the PHC string goes into admin_user.password_hash.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut PHOsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| format!("argon2 hash error: {e}"))
}

/// Opaque bearer token handed to the back-office client.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Only this digest is stored in admin_session.token_hash.
pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Seeds the configured admin on first start. Existing accounts are left alone.
pub async fn ensure_bootstrap_admin(
    store: &dyn Store,
    username: &str,
    password_hash: &str,
) -> Result<(), StoreError> {
    if store.find_admin_by_username(username).await?.is_some() {
        return Ok(());
    }
    if PasswordHash::new(password_hash).is_err() {
        tracing::warn!(username, "bootstrap admin hash is not a PHC string; skipping");
        return Ok(());
    }

    match store
        .insert_admin(NewAdmin {
            username: username.to_string(),
            display_name: username.to_string(),
            password_hash: password_hash.to_string(),
        })
        .await
    {
        Ok(admin) => {
            tracing::info!(admin_id = %admin.admin_id, username, "bootstrap admin created");
            Ok(())
        }
        // another instance got there first
        Err(StoreError::Duplicate(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
