use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::bookings::parse_start_date;
use crate::services::slots::{self, SlotAvailability};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    pub start_date: String,
}

pub async fn tour_slots(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<String>,
    Json(body): Json<SlotRequest>,
) -> Result<Json<SlotAvailability>, AppError> {
    let start_date = parse_start_date(&body.start_date)?;

    let db = state.db.lock().unwrap();
    let tour = queries::get_tour(&db, &tour_id)?
        .ok_or_else(|| AppError::NotFound("tour".to_string()))?;

    let availability = slots::availability(&db, &tour, &start_date.date())?;
    Ok(Json(availability))
}
