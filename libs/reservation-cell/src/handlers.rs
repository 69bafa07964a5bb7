use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::{error, info};
use uuid::Uuid;

use notification_cell::{messages, Mailer, SmtpMailer};
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::tokens::{
    self, FORM_TOKEN_MAX_AGE_SECS, RESCHEDULE_TOKEN_MAX_AGE_SECS, RESERVATION_FORM_PURPOSE,
};

use crate::models::{EmailRequest, RescheduleRequest, Reservation, SubmitReservationRequest};
use crate::services::store::ReservationStore;

// ==============================================================================
// MAGIC-LINK ISSUANCE
// ==============================================================================

pub async fn email_entry() -> Json<Value> {
    Json(json!({ "email": "" }))
}

/// Send the patient a signed, one-hour form-access link. Unlike transition
/// notifications, a failed send here fails the whole operation — the link is
/// the only thing this endpoint produces.
#[axum::debug_handler]
pub async fn request_form_link(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let email = request.email.trim().to_string();
    if email.is_empty() {
        return Err(AppError::Validation(vec![
            "Please enter your email address.".to_string(),
        ]));
    }

    let mut payload = Map::new();
    payload.insert("email".to_string(), Value::String(email.clone()));
    let token = tokens::issue_token(&config.secret_key, RESERVATION_FORM_PURPOSE, payload);

    let link = messages::form_link(&config.base_url, &token);
    let mail = messages::form_access_mail(&link);

    let mailer = SmtpMailer::from_config(&config)
        .map_err(|e| AppError::ExternalService(e.to_string()))?;
    match mailer.send(&email, &mail.subject, &mail.body).await {
        Ok(()) => {
            info!(recipient = %email, "magic link sent");
            Ok(Json(json!({ "success": true, "email": email })))
        }
        Err(e) => {
            error!("failed to send magic link: {}", e);
            Err(AppError::ExternalService(
                "Failed to send the email. Please try again later.".to_string(),
            ))
        }
    }
}

// ==============================================================================
// RESERVATION SUBMISSION
// ==============================================================================

/// Pull the verified email out of a form-access token. Every failure mode
/// collapses into the one generic link-invalid response.
fn verified_email(config: &AppConfig, token: &str, max_age_secs: i64) -> Result<String, AppError> {
    let data = tokens::verify_token(&config.secret_key, RESERVATION_FORM_PURPOSE, token, max_age_secs)
        .map_err(|_| AppError::LinkInvalid)?;
    data.get("email")
        .and_then(Value::as_str)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .ok_or(AppError::LinkInvalid)
}

#[axum::debug_handler]
pub async fn reservation_form(
    State(config): State<Arc<AppConfig>>,
    Path(token): Path<String>,
) -> Result<Json<Value>, AppError> {
    let email = verified_email(&config, &token, FORM_TOKEN_MAX_AGE_SECS)?;
    Ok(Json(json!({ "email": email })))
}

#[axum::debug_handler]
pub async fn submit_reservation(
    State(config): State<Arc<AppConfig>>,
    Path(token): Path<String>,
    Json(form): Json<SubmitReservationRequest>,
) -> Result<Response, AppError> {
    // The email comes from the verified token, never from the form body.
    let email = verified_email(&config, &token, FORM_TOKEN_MAX_AGE_SECS)?;

    let (details, choices) = match form.validate() {
        Ok(validated) => validated,
        Err(errors) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors, "form": form })),
            )
                .into_response());
        }
    };

    let store = ReservationStore::open(&config)?;
    let reservation = store.create(&email, &details, &choices)?;
    info!(reservation_id = %reservation.id, "reservation request created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "reservation_id": reservation.id })),
    )
        .into_response())
}

pub async fn reservation_done() -> Json<Value> {
    Json(json!({
        "message": "Your request has been received. The clinic will contact you once it has been reviewed."
    }))
}

// ==============================================================================
// RESCHEDULE SELF-SERVICE
// ==============================================================================

/// Verify a reschedule token and load its reservation.
///
/// Ownership is part of verification: a token whose embedded email does not
/// match the stored record is treated exactly like a forged one, so a valid
/// token for one reservation cannot be replayed against another.
fn reschedule_access(
    config: &AppConfig,
    token: &str,
) -> Result<(ReservationStore, Reservation), Response> {
    let data = tokens::verify_token(
        &config.secret_key,
        RESERVATION_FORM_PURPOSE,
        token,
        RESCHEDULE_TOKEN_MAX_AGE_SECS,
    )
    .map_err(|_| AppError::LinkInvalid.into_response())?;

    let email = data
        .get("email")
        .and_then(Value::as_str)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::LinkInvalid.into_response())?;
    let reservation_id = data
        .get("reservation_id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| AppError::LinkInvalid.into_response())?;

    let store =
        ReservationStore::open(config).map_err(|e| AppError::from(e).into_response())?;
    let reservation = match store.get(reservation_id) {
        Ok(Some(reservation)) => reservation,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "The reservation could not be found.",
                    "redirect": "/reservations/email/"
                })),
            )
                .into_response());
        }
        Err(e) => return Err(AppError::from(e).into_response()),
    };

    if reservation.email != email {
        return Err(AppError::LinkInvalid.into_response());
    }

    Ok((store, reservation))
}

#[axum::debug_handler]
pub async fn reschedule_form(
    State(config): State<Arc<AppConfig>>,
    Path(token): Path<String>,
) -> Response {
    let (_store, reservation) = match reschedule_access(&config, &token) {
        Ok(access) => access,
        Err(response) => return response,
    };

    // Demographics come prefilled from the record; the choices start empty
    // so the patient enters a fresh set.
    Json(json!({
        "email": reservation.email,
        "form": {
            "chart_number": reservation.chart_number,
            "referring_hospital": reservation.referring_hospital,
            "last_name": reservation.last_name,
            "first_name": reservation.first_name,
            "last_name_kana": reservation.last_name_kana,
            "first_name_kana": reservation.first_name_kana,
            "birth_date": reservation.birth_date,
            "sex": reservation.sex,
            "first_choice_date": "",
            "first_choice_time_slot": "",
            "second_choice_date": "",
            "second_choice_time_slot": "",
            "third_choice_date": "",
            "third_choice_time_slot": "",
        },
        "record_version": reservation.updated_at,
    }))
    .into_response()
}

#[axum::debug_handler]
pub async fn submit_reschedule(
    State(config): State<Arc<AppConfig>>,
    Path(token): Path<String>,
    Json(form): Json<RescheduleRequest>,
) -> Response {
    let (store, reservation) = match reschedule_access(&config, &token) {
        Ok(access) => access,
        Err(response) => return response,
    };

    let choices = match form.validate() {
        Ok(choices) => choices,
        Err(errors) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors, "form": form })),
            )
                .into_response();
        }
    };

    if form.record_version.is_empty() {
        return AppError::BadRequest("Missing record version.".to_string()).into_response();
    }

    // The email and demographics stay fixed; only the choices are rewritten,
    // and the record re-enters the review queue.
    match store.update_choices(reservation.id, &choices, &form.record_version) {
        Ok(updated) => {
            info!(reservation_id = %updated.id, "reschedule submitted, back in review queue");
            Json(json!({ "success": true })).into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
