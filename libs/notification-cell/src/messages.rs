//! Mail texts and the links they embed. Kept together so the wording of every
//! outbound message lives in one place.

pub struct MailContent {
    pub subject: String,
    pub body: String,
}

pub fn form_link(base_url: &str, token: &str) -> String {
    format!(
        "{}/reservations/form/{}/",
        base_url.trim_end_matches('/'),
        token
    )
}

pub fn reschedule_link(base_url: &str, token: &str) -> String {
    format!(
        "{}/reservations/reschedule/{}/",
        base_url.trim_end_matches('/'),
        token
    )
}

/// Magic-link mail for first-time form access.
pub fn form_access_mail(link: &str) -> MailContent {
    MailContent {
        subject: "Appointment request form (link valid for 1 hour)".to_string(),
        body: format!(
            "Here is your link to the appointment request form (valid for 1 hour):\n\
             {}\n\
             \n\
             If you did not request this email, please disregard it.\n",
            link
        ),
    }
}

/// Sent when staff confirm a reservation.
pub fn confirmation_mail(confirmed_datetime: &str) -> MailContent {
    MailContent {
        subject: "Your appointment has been confirmed".to_string(),
        body: format!(
            "Your appointment has been confirmed for:\n\
             {}\n\
             \n\
             If this time does not work for you, please contact the clinic.\n",
            confirmed_datetime
        ),
    }
}

/// Sent when staff ask the patient to pick new times.
pub fn reschedule_request_mail(link: &str) -> MailContent {
    MailContent {
        subject: "Please choose new appointment times (link valid for 48 hours)".to_string(),
        body: format!(
            "We could not accommodate your requested times. Please use the link\n\
             below to submit new preferences (valid for 48 hours):\n\
             {}\n\
             \n\
             If you did not expect this email, please disregard it.\n",
            link
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_normalize_trailing_slash() {
        assert_eq!(
            form_link("http://localhost:3000/", "tok"),
            "http://localhost:3000/reservations/form/tok/"
        );
        assert_eq!(
            reschedule_link("http://localhost:3000", "tok"),
            "http://localhost:3000/reservations/reschedule/tok/"
        );
    }
}
