use serde_json::{Map, Value};
use tracing::{error, info};

use notification_cell::messages::{self, MailContent};
use notification_cell::Mailer;
use reservation_cell::models::Reservation;
use reservation_cell::services::lifecycle::{ReservationLifecycle, TransitionEffect};
use reservation_cell::services::store::ReservationStore;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::tokens::{self, RESERVATION_FORM_PURPOSE};

use crate::models::UpdateReservationRequest;

/// Outcome of a staff transition. The reservation write always committed;
/// `notification_warning` is set when the follow-up mail could not be sent.
pub struct TransitionReport {
    pub reservation: Reservation,
    pub notification_warning: Option<String>,
}

fn optional(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Apply a staff-driven status change and its planned side effects.
///
/// The status write commits before any notification attempt. A failed send
/// is reported back to the actor as a warning; it never rolls back or
/// retries the committed change.
pub async fn apply_reservation_update(
    config: &AppConfig,
    store: &ReservationStore,
    mailer: &dyn Mailer,
    current: &Reservation,
    request: &UpdateReservationRequest,
) -> Result<TransitionReport, AppError> {
    if request.record_version.is_empty() {
        return Err(AppError::BadRequest("Missing record version.".to_string()));
    }

    let confirmed_datetime = optional(&request.confirmed_datetime);
    let effect = ReservationLifecycle::new().plan_transition(
        &current.status,
        &request.status,
        confirmed_datetime,
    );

    let updated = store.update_status(
        current.id,
        request.status,
        confirmed_datetime,
        optional(&request.staff_note),
        optional(&request.handled_by),
        &request.record_version,
    )?;
    info!(
        reservation_id = %updated.id,
        from = %current.status,
        to = %updated.status,
        "reservation status updated"
    );

    let notification_warning = match effect {
        TransitionEffect::None => None,
        TransitionEffect::SendConfirmation => {
            // The effect is only planned when a datetime was supplied.
            let datetime = updated.confirmed_datetime.clone().unwrap_or_default();
            deliver(mailer, &updated.email, messages::confirmation_mail(&datetime)).await
        }
        TransitionEffect::SendRescheduleLink => {
            let mut payload = Map::new();
            payload.insert("email".to_string(), Value::String(updated.email.clone()));
            payload.insert(
                "reservation_id".to_string(),
                Value::String(updated.id.to_string()),
            );
            let token = tokens::issue_token(&config.secret_key, RESERVATION_FORM_PURPOSE, payload);
            let link = messages::reschedule_link(&config.base_url, &token);
            deliver(mailer, &updated.email, messages::reschedule_request_mail(&link)).await
        }
    };

    Ok(TransitionReport {
        reservation: updated,
        notification_warning,
    })
}

async fn deliver(mailer: &dyn Mailer, to: &str, mail: MailContent) -> Option<String> {
    match mailer.send(to, &mail.subject, &mail.body).await {
        Ok(()) => {
            info!(recipient = %to, subject = %mail.subject, "notification sent");
            None
        }
        Err(e) => {
            error!("notification send failed: {}", e);
            Some(
                "The status was saved, but the notification email could not be sent.".to_string(),
            )
        }
    }
}
