use tracing::debug;

use crate::models::ReservationStatus;

/// Side effect carried by a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    None,
    /// Notify the patient of the confirmed datetime.
    SendConfirmation,
    /// Issue a fresh reschedule token and mail the link.
    SendRescheduleLink,
}

/// Transition rules for the reservation status.
///
/// Staff may move a record to any status; the machine does not enumerate
/// legal successor sets. What it owns is which transitions carry a
/// notification, and the named `resubmit` transition for patient
/// re-submissions.
pub struct ReservationLifecycle;

impl ReservationLifecycle {
    pub fn new() -> Self {
        Self
    }

    /// Plan the side effects of a staff-driven status change.
    ///
    /// A confirmation is sent only when the record was not already confirmed
    /// and a confirmed datetime was supplied, so an incidental re-save of a
    /// confirmed record never emails the patient twice. A reschedule request
    /// always sends, whatever the prior status.
    pub fn plan_transition(
        &self,
        current: &ReservationStatus,
        next: &ReservationStatus,
        confirmed_datetime: Option<&str>,
    ) -> TransitionEffect {
        match next {
            ReservationStatus::Confirmed => {
                let newly_confirmed = *current != ReservationStatus::Confirmed;
                let has_datetime = confirmed_datetime
                    .map(|value| !value.trim().is_empty())
                    .unwrap_or(false);
                if newly_confirmed && has_datetime {
                    debug!(from = %current, "planning confirmation notification");
                    TransitionEffect::SendConfirmation
                } else {
                    TransitionEffect::None
                }
            }
            ReservationStatus::NeedReschedule => {
                debug!(from = %current, "planning reschedule notification");
                TransitionEffect::SendRescheduleLink
            }
            // Cancellation is a plain status value: no notification, no lock.
            _ => TransitionEffect::None,
        }
    }

    /// The status any patient re-submission of choices re-enters, whatever
    /// the record's prior status. The store's choice update applies this.
    pub fn resubmit(&self, current: &ReservationStatus) -> ReservationStatus {
        debug!(from = %current, "resubmission re-enters the review queue");
        ReservationStatus::Pending
    }
}

impl Default for ReservationLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReservationStatus::*;

    const ALL: [ReservationStatus; 4] = [Pending, Confirmed, NeedReschedule, Cancelled];

    #[test]
    fn confirming_with_datetime_sends_once() {
        let lifecycle = ReservationLifecycle::new();
        for from in [Pending, NeedReschedule, Cancelled] {
            assert_eq!(
                lifecycle.plan_transition(&from, &Confirmed, Some("2025-06-01 10:00")),
                TransitionEffect::SendConfirmation,
                "from {}",
                from
            );
        }
    }

    #[test]
    fn re_saving_a_confirmed_record_sends_nothing() {
        let lifecycle = ReservationLifecycle::new();
        assert_eq!(
            lifecycle.plan_transition(&Confirmed, &Confirmed, Some("2025-06-01 10:00")),
            TransitionEffect::None
        );
    }

    #[test]
    fn confirming_without_a_datetime_sends_nothing() {
        let lifecycle = ReservationLifecycle::new();
        assert_eq!(
            lifecycle.plan_transition(&Pending, &Confirmed, None),
            TransitionEffect::None
        );
        assert_eq!(
            lifecycle.plan_transition(&Pending, &Confirmed, Some("   ")),
            TransitionEffect::None
        );
    }

    #[test]
    fn reschedule_request_always_sends() {
        let lifecycle = ReservationLifecycle::new();
        for from in ALL {
            assert_eq!(
                lifecycle.plan_transition(&from, &NeedReschedule, None),
                TransitionEffect::SendRescheduleLink,
                "from {}",
                from
            );
        }
    }

    #[test]
    fn cancellation_and_requeue_are_silent() {
        let lifecycle = ReservationLifecycle::new();
        for from in ALL {
            assert_eq!(
                lifecycle.plan_transition(&from, &Cancelled, None),
                TransitionEffect::None
            );
            assert_eq!(
                lifecycle.plan_transition(&from, &Pending, None),
                TransitionEffect::None
            );
        }
    }

    #[test]
    fn resubmit_always_re_enters_pending() {
        let lifecycle = ReservationLifecycle::new();
        for from in ALL {
            assert_eq!(lifecycle.resubmit(&from), Pending);
        }
    }
}
