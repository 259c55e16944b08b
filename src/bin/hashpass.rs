//! Prints an argon2 PHC string for BOOTSTRAP_ADMIN_PASSWORD_HASH.
//!
//! Usage: hashpass <password> [username]

use argon2::{Argon2, PasswordHasher};
use argon2::password_hash::{SaltString, rand_core::OsRng};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(password) = args.next() else {
        eprintln!("Usage: hashpass <password> [username]");
        std::process::exit(2);
    };
    if password.len() < 8 {
        anyhow::bail!("refusing to hash a password shorter than 8 characters");
    }

    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 hash error: {e}"))?
        .to_string();

    match args.next() {
        Some(username) => {
            println!("BOOTSTRAP_ADMIN_USERNAME={username}");
            // single quotes keep dotenv from expanding the $ segments
            println!("BOOTSTRAP_ADMIN_PASSWORD_HASH='{phc}'");
        }
        None => println!("{phc}"),
    }
    Ok(())
}
