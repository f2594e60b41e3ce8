use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, RefundStatus, Tour};
use crate::services::refund::RefundCalculation;
use crate::services::payment::RefundOutcome;

/// Creates a pending booking for one of the tour's published departures, or
/// hands back the caller's existing unpaid booking for the same departure so
/// repeat payment attempts don't pile up duplicates. Returns the booking and
/// whether it was newly created.
pub fn create_or_reuse(
    conn: &Connection,
    tour: &Tour,
    user_id: &str,
    start_date: &NaiveDateTime,
    number_of_people: i64,
    now: NaiveDateTime,
) -> Result<(Booking, bool), AppError> {
    if number_of_people < 1 {
        return Err(AppError::Validation(
            "numberOfPeople must be at least 1".to_string(),
        ));
    }

    if !tour.has_departure(start_date) {
        return Err(AppError::Validation(
            "startDate is not a published departure date for this tour".to_string(),
        ));
    }

    let available = crate::services::slots::availability(conn, tour, &start_date.date())?;
    if number_of_people > available.remaining_slots {
        return Err(AppError::Conflict(format!(
            "not enough remaining slots for this departure ({} left)",
            available.remaining_slots.max(0)
        )));
    }

    if let Some(existing) = queries::find_reusable_booking(conn, &tour.id, user_id, start_date)? {
        return Ok((existing, false));
    }

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        tour_id: tour.id.clone(),
        user_id: user_id.to_string(),
        start_date: *start_date,
        number_of_people,
        price: tour.unit_price * number_of_people,
        paid: false,
        status: BookingStatus::Pending,
        momo_trans_id: None,
        momo_request_id: None,
        cancelled_at: None,
        refund_status: RefundStatus::None,
        refund_amount: 0,
        refund_date: None,
        created_at: now,
    };
    queries::insert_booking(conn, &booking)?;

    Ok((booking, true))
}

/// Order ids are `{booking_id}_{millis}`; booking ids are UUIDs and never
/// contain the separator, so the prefix is unambiguous.
pub fn booking_id_from_order(order_id: &str) -> &str {
    match order_id.split_once('_') {
        Some((id, _)) => id,
        None => order_id,
    }
}

/// What a verified callback means for a booking.
#[derive(Debug)]
pub enum CallbackAction {
    /// First successful confirmation: persist the returned booking.
    Confirmed(Booking),
    /// Duplicate delivery for an already-confirmed booking: nothing to write.
    Replayed,
    /// Gateway reported failure: persist the returned booking (stays pending).
    Rejected(Booking),
}

/// Pure decision for the confirm step. The booking status machine is
/// monotonic: cancelled bookings accept no callback, confirmed bookings
/// absorb duplicates without a second write.
pub fn apply_callback(
    booking: &Booking,
    result_code: i64,
    trans_id: i64,
    request_id: &str,
) -> Result<CallbackAction, AppError> {
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::Conflict(
            "booking has been cancelled".to_string(),
        ));
    }

    if booking.status == BookingStatus::Confirmed {
        return Ok(CallbackAction::Replayed);
    }

    if result_code == 0 {
        let mut confirmed = booking.clone();
        confirmed.paid = true;
        confirmed.status = BookingStatus::Confirmed;
        confirmed.momo_trans_id = Some(trans_id.to_string());
        confirmed.momo_request_id = Some(request_id.to_string());
        Ok(CallbackAction::Confirmed(confirmed))
    } else {
        let mut rejected = booking.clone();
        rejected.paid = false;
        Ok(CallbackAction::Rejected(rejected))
    }
}

/// Only the booking's owner or an administrator may cancel it.
pub fn authorize_cancel(booking: &Booking, user_id: &str, is_admin: bool) -> Result<(), AppError> {
    if booking.user_id != user_id && !is_admin {
        return Err(AppError::Forbidden(
            "you do not have permission to cancel this booking".to_string(),
        ));
    }
    Ok(())
}

/// Cancellation transition. A paid booking with a non-zero refund moves its
/// refund to `pending`; the gateway call happens after this value is persisted.
pub fn cancel(booking: &Booking, refund: &RefundCalculation, now: NaiveDateTime) -> Booking {
    let mut cancelled = booking.clone();
    cancelled.status = BookingStatus::Cancelled;
    cancelled.cancelled_at = Some(now);
    cancelled.refund_amount = refund.refund_amount;
    if booking.paid && refund.refund_amount > 0 {
        cancelled.refund_status = RefundStatus::Pending;
    }
    cancelled
}

/// Records the gateway's answer to a refund request. Failure never unwinds
/// the cancellation; it is kept on the booking for the caller to surface.
pub fn apply_refund_outcome(
    booking: &Booking,
    outcome: &RefundOutcome,
    now: NaiveDateTime,
) -> Booking {
    let mut updated = booking.clone();
    if outcome.success {
        updated.refund_status = RefundStatus::Processing;
        updated.refund_date = Some(now);
    } else {
        updated.refund_status = RefundStatus::Failed;
    }
    updated
}

/// An unpaid booking whose departure has passed can never be paid or taken;
/// listing a user's bookings sweeps such rows into `cancelled`.
pub fn expire_unpaid(booking: &Booking, now: NaiveDateTime) -> Option<Booking> {
    if booking.paid || booking.status == BookingStatus::Cancelled || booking.start_date >= now {
        return None;
    }

    let mut expired = booking.clone();
    expired.status = BookingStatus::Cancelled;
    expired.cancelled_at = Some(now);
    Some(expired)
}
