use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE RESERVATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    NeedReschedule,
    Cancelled,
}

impl ReservationStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ReservationStatus::Pending),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "need_reschedule" => Some(ReservationStatus::NeedReschedule),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "pending"),
            ReservationStatus::Confirmed => write!(f, "confirmed"),
            ReservationStatus::NeedReschedule => write!(f, "need_reschedule"),
            ReservationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One preferred (date, time slot) pair. A pair is atomic: a date without a
/// slot or a slot without a date never reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoicePair {
    pub date: String,
    pub time_slot: String,
}

/// Up to three choices ordered by preference. The first is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceSet {
    pub first: ChoicePair,
    pub second: Option<ChoicePair>,
    pub third: Option<ChoicePair>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub id: Uuid,
    pub email: String,
    pub chart_number: Option<String>,
    pub referring_hospital: Option<String>,
    pub last_name: String,
    pub first_name: String,
    pub last_name_kana: Option<String>,
    pub first_name_kana: Option<String>,
    pub birth_date: String,
    pub sex: String,
    pub first_choice: ChoicePair,
    pub second_choice: Option<ChoicePair>,
    pub third_choice: Option<ChoicePair>,
    pub status: ReservationStatus,
    pub confirmed_datetime: Option<String>,
    pub staff_note: Option<String>,
    pub handled_by: Option<String>,
    pub created_at: String,
    /// Doubles as the optimistic-concurrency version token for updates.
    pub updated_at: String,
}

/// Listing row for the staff dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationSummary {
    pub id: Uuid,
    pub email: String,
    pub last_name: String,
    pub first_name: String,
    pub referring_hospital: Option<String>,
    pub first_choice: ChoicePair,
    pub status: ReservationStatus,
    pub confirmed_datetime: Option<String>,
    pub handled_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Patient demographics, validated at the boundary. Free text beyond
/// presence checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientDetails {
    pub chart_number: Option<String>,
    pub referring_hospital: Option<String>,
    pub last_name: String,
    pub first_name: String,
    pub last_name_kana: Option<String>,
    pub first_name_kana: Option<String>,
    pub birth_date: String,
    pub sex: String,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

/// The full patient submission. Serialize is kept so a rejected form can be
/// echoed back with the errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitReservationRequest {
    #[serde(default)]
    pub chart_number: String,
    #[serde(default)]
    pub referring_hospital: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name_kana: String,
    #[serde(default)]
    pub first_name_kana: String,
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub first_choice_date: String,
    #[serde(default)]
    pub first_choice_time_slot: String,
    #[serde(default)]
    pub second_choice_date: String,
    #[serde(default)]
    pub second_choice_time_slot: String,
    #[serde(default)]
    pub third_choice_date: String,
    #[serde(default)]
    pub third_choice_time_slot: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleRequest {
    #[serde(default)]
    pub first_choice_date: String,
    #[serde(default)]
    pub first_choice_time_slot: String,
    #[serde(default)]
    pub second_choice_date: String,
    #[serde(default)]
    pub second_choice_time_slot: String,
    #[serde(default)]
    pub third_choice_date: String,
    #[serde(default)]
    pub third_choice_time_slot: String,
    /// The `updated_at` the client last saw; a mismatch fails the write.
    #[serde(default)]
    pub record_version: String,
}

// ==============================================================================
// VALIDATION
// ==============================================================================

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn optional_pair(
    label: &str,
    date: &str,
    slot: &str,
    errors: &mut Vec<String>,
) -> Option<ChoicePair> {
    let date = date.trim();
    let slot = slot.trim();
    match (date.is_empty(), slot.is_empty()) {
        (true, true) => None,
        (false, false) => Some(ChoicePair {
            date: date.to_string(),
            time_slot: slot.to_string(),
        }),
        (false, true) => {
            errors.push(format!(
                "Your {} choice needs a time slot when a date is entered.",
                label
            ));
            None
        }
        (true, false) => {
            errors.push(format!(
                "Your {} choice needs a date when a time slot is selected.",
                label
            ));
            None
        }
    }
}

pub(crate) fn build_choice_set(
    first_date: &str,
    first_slot: &str,
    second_date: &str,
    second_slot: &str,
    third_date: &str,
    third_slot: &str,
    errors: &mut Vec<String>,
) -> Option<ChoiceSet> {
    let before = errors.len();

    let first_date = first_date.trim();
    let first_slot = first_slot.trim();
    if first_date.is_empty() {
        errors.push("Please enter a date for your first choice.".to_string());
    }
    if first_slot.is_empty() {
        errors.push("Please select a time slot for your first choice.".to_string());
    }

    let second = optional_pair("second", second_date, second_slot, errors);
    let third = optional_pair("third", third_date, third_slot, errors);

    if errors.len() > before {
        return None;
    }

    Some(ChoiceSet {
        first: ChoicePair {
            date: first_date.to_string(),
            time_slot: first_slot.to_string(),
        },
        second,
        third,
    })
}

impl SubmitReservationRequest {
    /// Validate the submission, collecting every failure so the form can be
    /// re-shown with all of them at once. Nothing is persisted on failure.
    pub fn validate(&self) -> Result<(PatientDetails, ChoiceSet), Vec<String>> {
        let mut errors = Vec::new();

        let last_name = self.last_name.trim();
        let first_name = self.first_name.trim();
        if last_name.is_empty() || first_name.is_empty() {
            errors.push("Please enter your name (family and given).".to_string());
        }

        let birth_date = self.birth_date.trim();
        if birth_date.is_empty() {
            errors.push("Please enter your birth date.".to_string());
        }

        let sex = self.sex.trim();
        if sex.is_empty() {
            errors.push("Please select your sex.".to_string());
        }

        let choices = build_choice_set(
            &self.first_choice_date,
            &self.first_choice_time_slot,
            &self.second_choice_date,
            &self.second_choice_time_slot,
            &self.third_choice_date,
            &self.third_choice_time_slot,
            &mut errors,
        );

        let details = PatientDetails {
            chart_number: optional(&self.chart_number),
            referring_hospital: optional(&self.referring_hospital),
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            last_name_kana: optional(&self.last_name_kana),
            first_name_kana: optional(&self.first_name_kana),
            birth_date: birth_date.to_string(),
            sex: sex.to_string(),
        };

        match choices {
            Some(choices) if errors.is_empty() => Ok((details, choices)),
            _ => Err(errors),
        }
    }
}

impl RescheduleRequest {
    pub fn validate(&self) -> Result<ChoiceSet, Vec<String>> {
        let mut errors = Vec::new();
        let choices = build_choice_set(
            &self.first_choice_date,
            &self.first_choice_time_slot,
            &self.second_choice_date,
            &self.second_choice_time_slot,
            &self.third_choice_date,
            &self.third_choice_time_slot,
            &mut errors,
        );
        match choices {
            Some(choices) if errors.is_empty() => Ok(choices),
            _ => Err(errors),
        }
    }
}
