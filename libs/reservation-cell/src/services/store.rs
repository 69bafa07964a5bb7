use chrono::{SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, Row};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    ChoicePair, ChoiceSet, PatientDetails, Reservation, ReservationStatus, ReservationSummary,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The caller's `expected_version` no longer matches the row. The second
    /// writer loses instead of silently overwriting.
    #[error("stale record version")]
    Stale,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Reservation not found".to_string()),
            StoreError::Stale => AppError::Conflict(
                "This record was updated by someone else. Reload and try again.".to_string(),
            ),
            StoreError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

/// Durable CRUD surface over the reservations table. One instance per
/// request; the connection is released on drop, on every exit path.
pub struct ReservationStore {
    conn: Connection,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_id(value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn parse_status(value: &str) -> rusqlite::Result<ReservationStatus> {
    ReservationStatus::parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("unknown reservation status {:?}", value).into(),
        )
    })
}

fn optional_pair(date: Option<String>, slot: Option<String>) -> Option<ChoicePair> {
    match (date, slot) {
        (Some(date), Some(time_slot)) if !date.is_empty() && !time_slot.is_empty() => {
            Some(ChoicePair { date, time_slot })
        }
        _ => None,
    }
}

fn map_reservation(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    let id: String = row.get("id")?;
    let status: String = row.get("status")?;
    Ok(Reservation {
        id: parse_id(&id)?,
        email: row.get("email")?,
        chart_number: row.get("chart_number")?,
        referring_hospital: row.get("referring_hospital")?,
        last_name: row.get("last_name")?,
        first_name: row.get("first_name")?,
        last_name_kana: row.get("last_name_kana")?,
        first_name_kana: row.get("first_name_kana")?,
        birth_date: row.get("birth_date")?,
        sex: row.get("sex")?,
        first_choice: ChoicePair {
            date: row.get("first_choice_date")?,
            time_slot: row.get("first_choice_time_slot")?,
        },
        second_choice: optional_pair(
            row.get("second_choice_date")?,
            row.get("second_choice_time_slot")?,
        ),
        third_choice: optional_pair(
            row.get("third_choice_date")?,
            row.get("third_choice_time_slot")?,
        ),
        status: parse_status(&status)?,
        confirmed_datetime: row.get("confirmed_datetime")?,
        staff_note: row.get("staff_note")?,
        handled_by: row.get("handled_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn map_summary(row: &Row<'_>) -> rusqlite::Result<ReservationSummary> {
    let id: String = row.get("id")?;
    let status: String = row.get("status")?;
    Ok(ReservationSummary {
        id: parse_id(&id)?,
        email: row.get("email")?,
        last_name: row.get("last_name")?,
        first_name: row.get("first_name")?,
        referring_hospital: row.get("referring_hospital")?,
        first_choice: ChoicePair {
            date: row.get("first_choice_date")?,
            time_slot: row.get("first_choice_time_slot")?,
        },
        status: parse_status(&status)?,
        confirmed_datetime: row.get("confirmed_datetime")?,
        handled_by: row.get("handled_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const SUMMARY_COLUMNS: &str = "id, email, last_name, first_name, referring_hospital, \
     first_choice_date, first_choice_time_slot, status, confirmed_datetime, handled_by, \
     created_at, updated_at";

impl ReservationStore {
    pub fn open(config: &AppConfig) -> Result<Self, StoreError> {
        Ok(Self {
            conn: shared_database::open(config)?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Persist a new request. Records always enter the queue as `pending`;
    /// there is no way for a caller to supply a status.
    pub fn create(
        &self,
        email: &str,
        details: &PatientDetails,
        choices: &ChoiceSet,
    ) -> Result<Reservation, StoreError> {
        let id = Uuid::new_v4();
        let now = now_stamp();
        self.conn.execute(
            "INSERT INTO reservations (
                id, email, chart_number, referring_hospital,
                last_name, first_name, last_name_kana, first_name_kana,
                birth_date, sex,
                first_choice_date, first_choice_time_slot,
                second_choice_date, second_choice_time_slot,
                third_choice_date, third_choice_time_slot,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 'pending', ?17, ?18)",
            params![
                id.to_string(),
                email,
                details.chart_number,
                details.referring_hospital,
                details.last_name,
                details.first_name,
                details.last_name_kana,
                details.first_name_kana,
                details.birth_date,
                details.sex,
                choices.first.date,
                choices.first.time_slot,
                choices.second.as_ref().map(|c| c.date.clone()),
                choices.second.as_ref().map(|c| c.time_slot.clone()),
                choices.third.as_ref().map(|c| c.date.clone()),
                choices.third.as_ref().map(|c| c.time_slot.clone()),
                now,
                now,
            ],
        )?;
        debug!(reservation_id = %id, "reservation created");
        self.get(id)?.ok_or(StoreError::NotFound)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        match self.conn.query_row(
            "SELECT * FROM reservations WHERE id = ?1",
            params![id.to_string()],
            map_reservation,
        ) {
            Ok(reservation) => Ok(Some(reservation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Unhandled requests, oldest first, so staff work a FIFO queue.
    pub fn list_pending(&self) -> Result<Vec<ReservationSummary>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM reservations WHERE status = 'pending' ORDER BY created_at ASC",
            SUMMARY_COLUMNS
        ))?;
        let rows = stmt.query_map([], map_summary)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Latest requests across all statuses, newest first.
    pub fn list_recent(&self, limit: u32) -> Result<Vec<ReservationSummary>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM reservations ORDER BY created_at DESC LIMIT ?1",
            SUMMARY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit], map_summary)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rewrite the choice pairs and force the record back to `pending` — the
    /// `Resubmit` transition. Fails with `Stale` when `expected_version` no
    /// longer matches the row.
    pub fn update_choices(
        &self,
        id: Uuid,
        choices: &ChoiceSet,
        expected_version: &str,
    ) -> Result<Reservation, StoreError> {
        let now = now_stamp();
        let changed = self.conn.execute(
            "UPDATE reservations SET
                first_choice_date = ?1,
                first_choice_time_slot = ?2,
                second_choice_date = ?3,
                second_choice_time_slot = ?4,
                third_choice_date = ?5,
                third_choice_time_slot = ?6,
                status = 'pending',
                updated_at = ?7
             WHERE id = ?8 AND updated_at = ?9",
            params![
                choices.first.date,
                choices.first.time_slot,
                choices.second.as_ref().map(|c| c.date.clone()),
                choices.second.as_ref().map(|c| c.time_slot.clone()),
                choices.third.as_ref().map(|c| c.date.clone()),
                choices.third.as_ref().map(|c| c.time_slot.clone()),
                now,
                id.to_string(),
                expected_version,
            ],
        )?;
        if changed == 0 {
            return Err(self.missing_or_stale(id)?);
        }
        debug!(reservation_id = %id, "choices rewritten, back to pending");
        self.get(id)?.ok_or(StoreError::NotFound)
    }

    /// Overwrite the staff-owned fields. Transition legality and side
    /// effects are the lifecycle service's concern, not the store's.
    /// `confirmed_datetime` is kept only while the written status is
    /// `confirmed`.
    pub fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        confirmed_datetime: Option<&str>,
        staff_note: Option<&str>,
        handled_by: Option<&str>,
        expected_version: &str,
    ) -> Result<Reservation, StoreError> {
        let confirmed_datetime = match status {
            ReservationStatus::Confirmed => {
                confirmed_datetime.map(str::trim).filter(|v| !v.is_empty())
            }
            _ => None,
        };
        let now = now_stamp();
        let changed = self.conn.execute(
            "UPDATE reservations SET
                status = ?1,
                confirmed_datetime = ?2,
                staff_note = ?3,
                handled_by = ?4,
                updated_at = ?5
             WHERE id = ?6 AND updated_at = ?7",
            params![
                status.to_string(),
                confirmed_datetime,
                staff_note,
                handled_by,
                now,
                id.to_string(),
                expected_version,
            ],
        )?;
        if changed == 0 {
            return Err(self.missing_or_stale(id)?);
        }
        debug!(reservation_id = %id, status = %status, "status updated");
        self.get(id)?.ok_or(StoreError::NotFound)
    }

    fn missing_or_stale(&self, id: Uuid) -> Result<StoreError, StoreError> {
        if self.get(id)?.is_some() {
            Ok(StoreError::Stale)
        } else {
            Ok(StoreError::NotFound)
        }
    }
}
