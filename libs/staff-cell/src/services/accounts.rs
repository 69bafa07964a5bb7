use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, Row};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{StaffError, StaffUser};

pub fn hash_password(password: &str) -> Result<String, StaffError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StaffError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, StaffError> {
    let parsed = PasswordHash::new(hash).map_err(|e| StaffError::Hash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(StaffError::Hash(e.to_string())),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<StaffUser> {
    let id: String = row.get("id")?;
    Ok(StaffUser {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        email: row.get("email")?,
        name: row.get("name")?,
        is_active: row.get::<_, i64>("is_active")? != 0,
        created_at: row.get("created_at")?,
    })
}

/// Account lookup and credential verification against the staff_users table.
/// Accounts are created by the provisioning tool, never by the web surface.
pub struct StaffAccountService {
    conn: Connection,
}

impl StaffAccountService {
    pub fn open(config: &AppConfig) -> Result<Self, StaffError> {
        Ok(Self {
            conn: shared_database::open(config)?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn create(&self, email: &str, name: &str, password: &str) -> Result<StaffUser, StaffError> {
        let email = normalize_email(email);
        let name = name.trim();
        if email.is_empty() {
            return Err(StaffError::Invalid("email is required".to_string()));
        }
        if name.is_empty() {
            return Err(StaffError::Invalid("name is required".to_string()));
        }
        if password.is_empty() {
            return Err(StaffError::Invalid("password is required".to_string()));
        }
        if self.find_by_email(&email)?.is_some() {
            return Err(StaffError::DuplicateEmail);
        }

        let id = Uuid::new_v4();
        let hash = hash_password(password)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.conn.execute(
            "INSERT INTO staff_users (id, email, name, password_hash, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![id.to_string(), email, name, hash, now],
        )?;
        debug!(staff = %email, "staff account created");

        self.get(id)?.ok_or(StaffError::NotFound)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<StaffUser>, StaffError> {
        match self.conn.query_row(
            "SELECT id, email, name, is_active, created_at FROM staff_users WHERE id = ?1",
            params![id.to_string()],
            map_user,
        ) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<StaffUser>, StaffError> {
        match self.conn.query_row(
            "SELECT id, email, name, is_active, created_at FROM staff_users WHERE email = ?1",
            params![normalize_email(email)],
            map_user,
        ) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_active(&self, email: &str, is_active: bool) -> Result<(), StaffError> {
        let changed = self.conn.execute(
            "UPDATE staff_users SET is_active = ?1 WHERE email = ?2",
            params![is_active as i64, normalize_email(email)],
        )?;
        if changed == 0 {
            return Err(StaffError::NotFound);
        }
        Ok(())
    }

    /// Authenticate with email and password. Unknown accounts, wrong
    /// passwords, and inactive accounts all come back as `None` - callers
    /// must not be able to tell them apart.
    pub fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<StaffUser>, StaffError> {
        let row = self.conn.query_row(
            "SELECT id, email, name, password_hash, is_active, created_at
             FROM staff_users WHERE email = ?1",
            params![normalize_email(email)],
            |row| {
                let hash: String = row.get("password_hash")?;
                Ok((map_user(row)?, hash))
            },
        );

        let (user, hash) = match row {
            Ok(found) => found,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !user.is_active {
            return Ok(None);
        }
        if !verify_password(password, &hash)? {
            return Ok(None);
        }
        Ok(Some(user))
    }
}
