//! Local user store backing the login endpoint.
//!
//! Users live in a small JSON file with argon2 PHC password hashes. This is
//! the stand-in for the deployment's real identity provider; the rest of the
//! crate only ever sees the authenticated username.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserFile {
    users: Vec<UserEntry>,
}

fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

fn read_users(path: &Path) -> Result<UserFile> {
    if !path.exists() {
        return Ok(UserFile::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_users(path: &Path, file: &UserFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).ok();
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(file)?)?;
    Ok(())
}

/// Seed the user file with a default admin on first startup.
pub fn ensure_default_admin(users_file: &str) -> Result<()> {
    let p = Path::new(users_file);
    if p.exists() {
        return Ok(());
    }
    let file = UserFile {
        users: vec![UserEntry { username: "depot".to_string(), password_hash: hash_password("depot")? }],
    };
    write_users(p, &file)
}

/// Add a user, replacing any existing entry for the same username.
pub fn add_user(users_file: &str, username: &str, password: &str) -> Result<()> {
    let p = Path::new(users_file);
    let mut file = read_users(p)?;
    file.users.retain(|u| u.username != username);
    file.users.push(UserEntry { username: username.to_string(), password_hash: hash_password(password)? });
    write_users(p, &file)
}

/// Verify a username/password pair against the user file.
pub fn authenticate(users_file: &str, username: &str, password: &str) -> Result<bool> {
    let file = read_users(Path::new(users_file))?;
    Ok(file
        .users
        .iter()
        .find(|u| u.username == username)
        .map(|u| verify_password(&u.password_hash, password))
        .unwrap_or(false))
}
