use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Read-side projection of a tour. Tour management lives elsewhere; the booking
/// lifecycle only needs pricing, capacity and the published departure dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: String,
    pub name: String,
    pub unit_price: i64,
    pub max_group_size: i64,
    pub start_dates: Vec<NaiveDateTime>,
}

impl Tour {
    /// A booking may only target one of the published departures, compared
    /// exactly (date and time).
    pub fn has_departure(&self, start_date: &NaiveDateTime) -> bool {
        self.start_dates.iter().any(|d| d == start_date)
    }
}
