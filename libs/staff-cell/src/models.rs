use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use reservation_cell::models::ReservationStatus;

/// A clinic staff member. The credential hash never leaves the account
/// service.
#[derive(Debug, Clone, Serialize)]
pub struct StaffUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Error, Debug)]
pub enum StaffError {
    #[error("a staff account with that email already exists")]
    DuplicateEmail,

    #[error("staff account not found")]
    NotFound,

    #[error("invalid staff account data: {0}")]
    Invalid(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Destination to return to after login, carried over from the gate's
    /// redirect.
    #[serde(default)]
    pub next: Option<String>,
}

/// A staff-driven status transition. The status is typed; everything else is
/// free text the staff member wrote.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReservationRequest {
    pub status: ReservationStatus,
    #[serde(default)]
    pub confirmed_datetime: String,
    #[serde(default)]
    pub staff_note: String,
    #[serde(default)]
    pub handled_by: String,
    /// The `updated_at` the dashboard last displayed.
    #[serde(default)]
    pub record_version: String,
}
