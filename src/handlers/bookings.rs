use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, RefundStatus};
use crate::services::booking as lifecycle;
use crate::services::booking::CallbackAction;
use crate::services::payment::{GatewayCallback, PaymentRequest};
use crate::services::refund;
use crate::state::AppState;

pub struct AuthUser {
    pub id: String,
    pub is_admin: bool,
}

/// Authentication is an upstream concern; the proxy in front of this service
/// strips and re-sets these headers after validating the session.
pub fn require_user(headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if id.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let is_admin = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .map(|role| role == "admin")
        .unwrap_or(false);

    Ok(AuthUser {
        id: id.to_string(),
        is_admin,
    })
}

pub fn parse_start_date(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| {
                d.and_hms_opt(0, 0, 0)
                    .unwrap_or_else(|| Utc::now().naive_utc())
            })
        })
        .map_err(|_| AppError::Validation(format!("invalid startDate: {s}")))
}

// ── POST /api/bookings ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub tour_id: String,
    pub start_date: String,
    pub number_of_people: i64,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&headers)?;
    let start_date = parse_start_date(&body.start_date)?;
    let now = Utc::now().naive_utc();

    let (booking, created) = {
        let db = state.db.lock().unwrap();
        let tour = queries::get_tour(&db, &body.tour_id)?
            .ok_or_else(|| AppError::NotFound("tour".to_string()))?;

        lifecycle::create_or_reuse(
            &db,
            &tour,
            &user.id,
            &start_date,
            body.number_of_people,
            now,
        )?
    };

    if created {
        tracing::info!(booking_id = %booking.id, tour_id = %booking.tour_id, "booking created");
    }

    Ok((StatusCode::CREATED, Json(booking)))
}

// ── GET /api/bookings/my ──

pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    let user = require_user(&headers)?;
    let now = Utc::now().naive_utc();

    let db = state.db.lock().unwrap();
    let mut bookings = queries::get_bookings_for_user(&db, &user.id)?;

    // Unpaid bookings whose departure has passed are dead weight; sweep them
    // into cancelled while listing.
    for booking in bookings.iter_mut() {
        if let Some(expired) = lifecycle::expire_unpaid(booking, now) {
            queries::save_booking(&db, &expired)?;
            *booking = expired;
        }
    }

    Ok(Json(bookings))
}

// ── POST /api/bookings/payment ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub tour_id: String,
    pub number_of_people: i64,
    pub start_date: String,
    pub booking_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub pay_url: String,
    pub qr_code_url: Option<String>,
    pub deeplink: Option<String>,
    pub booking_id: String,
}

pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<InitiatePaymentRequest>,
) -> Result<Json<InitiatePaymentResponse>, AppError> {
    let user = require_user(&headers)?;
    let start_date = parse_start_date(&body.start_date)?;
    let now = Utc::now().naive_utc();

    let (booking, tour_name, newly_created) = {
        let db = state.db.lock().unwrap();
        let tour = queries::get_tour(&db, &body.tour_id)?
            .ok_or_else(|| AppError::NotFound("tour".to_string()))?;

        match &body.booking_id {
            Some(booking_id) => {
                // Retry of an earlier payment attempt against a known booking.
                let booking = queries::get_booking(&db, booking_id)?
                    .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

                if booking.user_id != user.id {
                    return Err(AppError::Forbidden(
                        "you do not have permission to pay for this booking".to_string(),
                    ));
                }
                if booking.paid {
                    return Err(AppError::Conflict(
                        "this booking has already been paid".to_string(),
                    ));
                }
                if booking.status == BookingStatus::Cancelled {
                    return Err(AppError::Conflict(
                        "this booking has been cancelled".to_string(),
                    ));
                }

                (booking, tour.name.clone(), false)
            }
            None => {
                let (booking, created) = lifecycle::create_or_reuse(
                    &db,
                    &tour,
                    &user.id,
                    &start_date,
                    body.number_of_people,
                    now,
                )?;
                (booking, tour.name.clone(), created)
            }
        }
    };

    // Fresh timestamp suffix per attempt so retries get distinct gateway
    // order ids. The price is the booking's snapshot, never recomputed.
    let order_id = format!("{}_{}", booking.id, Utc::now().timestamp_millis());
    let request = PaymentRequest {
        order_id,
        amount: booking.price,
        order_info: format!("Thanh toan tour {tour_name}"),
    };

    match state.gateway.create_payment(&request).await {
        Ok(session) => Ok(Json(InitiatePaymentResponse {
            pay_url: session.pay_url,
            qr_code_url: session.qr_code_url,
            deeplink: session.deeplink,
            booking_id: booking.id,
        })),
        Err(e) => {
            // Roll back only what this request created; a reused pending
            // booking outlives the failed attempt.
            if newly_created {
                let db = state.db.lock().unwrap();
                let _ = queries::delete_booking(&db, &booking.id);
            }
            tracing::error!(error = %e, booking_id = %booking.id, "payment session creation failed");
            Err(AppError::PaymentGateway(e.to_string()))
        }
    }
}

// ── POST /api/bookings/momo-return ──

pub async fn gateway_return(
    State(state): State<Arc<AppState>>,
    Json(callback): Json<GatewayCallback>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.gateway.verify_callback(&callback) {
        tracing::warn!(order_id = %callback.order_id, "rejecting callback with invalid signature");
        return Err(AppError::InvalidSignature);
    }

    let booking_id = lifecycle::booking_id_from_order(&callback.order_id);

    let db = state.db.lock().unwrap();
    let booking = queries::get_booking(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

    let action = lifecycle::apply_callback(
        &booking,
        callback.result_code,
        callback.trans_id,
        &callback.request_id,
    )?;

    match action {
        CallbackAction::Confirmed(confirmed) => {
            queries::save_booking(&db, &confirmed)?;
            tracing::info!(booking_id = %confirmed.id, trans_id = callback.trans_id, "payment confirmed");
            Ok(Json(serde_json::json!({
                "status": "success",
                "message": "Payment confirmed",
                "data": { "booking": confirmed },
            })))
        }
        CallbackAction::Replayed => {
            tracing::info!(booking_id = %booking.id, "duplicate payment callback ignored");
            Ok(Json(serde_json::json!({
                "status": "success",
                "message": "Payment confirmed",
                "data": { "booking": booking },
            })))
        }
        CallbackAction::Rejected(rejected) => {
            queries::save_booking(&db, &rejected)?;
            tracing::warn!(booking_id = %rejected.id, result_code = callback.result_code, message = %callback.message, "payment failed");
            Ok(Json(serde_json::json!({
                "status": "failed",
                "message": "Payment failed",
            })))
        }
    }
}

// ── PATCH /api/bookings/:id/cancel ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundInfo {
    pub refund_amount: i64,
    pub refund_percentage: i64,
    pub days_diff: i64,
    pub refund_status: RefundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_error: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = require_user(&headers)?;
    let now = Utc::now().naive_utc();

    let (cancelled, calc) = {
        let db = state.db.lock().unwrap();
        let booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

        lifecycle::authorize_cancel(&booking, &user.id, user.is_admin)?;

        if booking.status == BookingStatus::Cancelled {
            return Err(AppError::Conflict(
                "booking is already cancelled".to_string(),
            ));
        }

        let calc = refund::calculate_refund(&booking.start_date, booking.price, &now);
        if calc.days_diff < 0 {
            return Err(AppError::TourAlreadyStarted);
        }

        let cancelled = lifecycle::cancel(&booking, &calc, now);
        queries::save_booking(&db, &cancelled)?;
        (cancelled, calc)
    };

    // The cancellation is committed; money movement happens after and its
    // failure is recorded, never propagated.
    let (booking, refund_error) = if cancelled.refund_status == RefundStatus::Pending {
        let outcome = state.gateway.refund(&cancelled, calc.refund_amount).await;
        if let Some(error) = &outcome.error {
            tracing::error!(booking_id = %cancelled.id, error = %error, "refund attempt failed");
        }

        let db = state.db.lock().unwrap();
        let updated =
            lifecycle::apply_refund_outcome(&cancelled, &outcome, Utc::now().naive_utc());
        queries::save_booking(&db, &updated)?;
        (updated, outcome.error)
    } else {
        (cancelled, None)
    };

    tracing::info!(booking_id = %booking.id, refund_amount = calc.refund_amount, "booking cancelled");

    let refund_info = RefundInfo {
        refund_amount: calc.refund_amount,
        refund_percentage: calc.refund_percentage,
        days_diff: calc.days_diff,
        refund_status: booking.refund_status,
        refund_error,
    };

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": { "booking": booking, "refundInfo": refund_info },
    })))
}
