//! Local account directory: email-keyed records with argon2 password hashes, loadable from
//! and savable to a JSON file. Backs `LocalAuthenticator` and the shell's `register` command.

use std::collections::HashMap;
use std::path::Path;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::principal::Role;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub password_hash: String,
}

#[derive(Debug, Default)]
pub struct UserDirectory {
    // keyed by normalized email
    users: HashMap<String, UserRecord>,
    next_id: u64,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal("rng_failed".to_string(), e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::internal("salt_failed".to_string(), e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal("hash_failed".to_string(), e.to_string()))?
        .to_string();
    Ok(phc)
}

pub(crate) fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

pub(crate) fn write_users_file(path: &Path, text: &str) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, text)?;
    Ok(())
}

impl UserDirectory {
    pub fn new() -> Self { Self::default() }

    /// Load a directory from a JSON array of records. A missing file is an empty directory.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            info!(target: "mealy::auth", "user directory {} not found, starting empty", path.display());
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path)?;
        let records: Vec<UserRecord> = serde_json::from_str(&text)?;
        let mut dir = Self::new();
        for rec in records {
            dir.insert(rec)?;
        }
        info!(target: "mealy::auth", "loaded {} users from {}", dir.len(), path.display());
        Ok(dir)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        write_users_file(path, &self.to_json()?)?;
        debug!(target: "mealy::auth", "saved {} users to {}", self.len(), path.display());
        Ok(())
    }

    /// Pretty JSON array of all records, ordered by id.
    pub fn to_json(&self) -> AppResult<String> {
        let mut records: Vec<&UserRecord> = self.users.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(serde_json::to_string_pretty(&records)?)
    }

    pub fn len(&self) -> usize { self.users.len() }
    pub fn is_empty(&self) -> bool { self.users.is_empty() }

    pub fn get(&self, email: &str) -> Option<&UserRecord> {
        self.users.get(&normalize_email(email))
    }

    fn insert(&mut self, rec: UserRecord) -> AppResult<()> {
        let key = normalize_email(&rec.email);
        if self.users.contains_key(&key) {
            return Err(AppError::conflict("user_exists".to_string(), format!("user with email {} already exists", key)));
        }
        // keep generated ids clear of numeric ids already on disk
        if let Some(n) = rec.id.strip_prefix('u').and_then(|s| s.parse::<u64>().ok()) {
            self.next_id = self.next_id.max(n);
        }
        self.users.insert(key, rec);
        Ok(())
    }

    /// Create an account. Email, password and name are required; a taken email is a conflict.
    pub fn register(&mut self, email: &str, password: &str, name: &str, role: Role) -> AppResult<&UserRecord> {
        self.check_new(email, password, name)?;
        let hash = hash_password(password)?;
        self.add(email, name, role, hash)
    }

    /// Field and conflict checks for a new account, without hashing anything.
    pub(crate) fn check_new(&self, email: &str, password: &str, name: &str) -> AppResult<()> {
        let key = normalize_email(email);
        if key.is_empty() || password.is_empty() || name.trim().is_empty() {
            return Err(AppError::user("missing_fields", "Email, password, and name are required"));
        }
        if self.users.contains_key(&key) {
            return Err(AppError::conflict("user_exists", "User with this email already exists"));
        }
        Ok(())
    }

    /// Insert an account whose password is already hashed.
    pub(crate) fn add(&mut self, email: &str, name: &str, role: Role, password_hash: String) -> AppResult<&UserRecord> {
        let key = normalize_email(email);
        if self.users.contains_key(&key) {
            return Err(AppError::conflict("user_exists", "User with this email already exists"));
        }
        self.next_id += 1;
        let rec = UserRecord {
            id: format!("u{}", self.next_id),
            email: key.clone(),
            name: name.trim().to_string(),
            role,
            password_hash,
        };
        info!(target: "mealy::auth", "registered user={} role={}", rec.email, rec.role);
        self.users.insert(key.clone(), rec);
        self.users.get(&key).ok_or_else(|| AppError::internal("register_lost", "record vanished after insert"))
    }

    /// Drop an account, handing its id back if it was the last one generated.
    pub(crate) fn remove(&mut self, email: &str) -> Option<UserRecord> {
        let rec = self.users.remove(&normalize_email(email))?;
        if rec.id == format!("u{}", self.next_id) {
            self.next_id -= 1;
        }
        Some(rec)
    }

    /// Returns the matching record when the email exists and the password verifies.
    pub fn verify(&self, email: &str, password: &str) -> Option<&UserRecord> {
        let rec = self.get(email)?;
        if verify_password(&rec.password_hash, password) { Some(rec) } else { None }
    }
}
