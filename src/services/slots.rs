use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::Tour;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub booked_slots: i64,
    pub remaining_slots: i64,
    pub max_group_size: i64,
}

/// Remaining capacity for one departure date, recomputed from paid bookings on
/// every call. `remaining_slots` can go to zero or below; callers must treat
/// anything <= 0 as no space.
pub fn availability(
    conn: &Connection,
    tour: &Tour,
    date: &NaiveDate,
) -> anyhow::Result<SlotAvailability> {
    let booked_slots = queries::paid_people_for_date(conn, &tour.id, date)?;

    Ok(SlotAvailability {
        booked_slots,
        remaining_slots: tour.max_group_size - booked_slots,
        max_group_size: tour.max_group_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus, RefundStatus};
    use chrono::{NaiveDateTime, Utc};

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn test_tour() -> Tour {
        Tour {
            id: "tour-1".to_string(),
            name: "Ha Long Bay".to_string(),
            unit_price: 2_000_000,
            max_group_size: 10,
            start_dates: vec![dt("2025-07-01 08:00")],
        }
    }

    fn paid_booking(id: &str, people: i64, start: &str) -> Booking {
        Booking {
            id: id.to_string(),
            tour_id: "tour-1".to_string(),
            user_id: "user-1".to_string(),
            start_date: dt(start),
            number_of_people: people,
            price: people * 2_000_000,
            paid: true,
            status: BookingStatus::Confirmed,
            momo_trans_id: Some("12345".to_string()),
            momo_request_id: None,
            cancelled_at: None,
            refund_status: RefundStatus::None,
            refund_amount: 0,
            refund_date: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_empty_tour_has_full_capacity() {
        let conn = db::init_db(":memory:").unwrap();
        let tour = test_tour();
        queries::insert_tour(&conn, &tour).unwrap();

        let avail = availability(&conn, &tour, &dt("2025-07-01 08:00").date()).unwrap();
        assert_eq!(avail.booked_slots, 0);
        assert_eq!(avail.remaining_slots, 10);
    }

    #[test]
    fn test_paid_bookings_consume_capacity() {
        let conn = db::init_db(":memory:").unwrap();
        let tour = test_tour();
        queries::insert_tour(&conn, &tour).unwrap();
        queries::insert_booking(&conn, &paid_booking("b1", 4, "2025-07-01 08:00")).unwrap();
        queries::insert_booking(&conn, &paid_booking("b2", 6, "2025-07-01 08:00")).unwrap();

        let avail = availability(&conn, &tour, &dt("2025-07-01 08:00").date()).unwrap();
        assert_eq!(avail.booked_slots, 10);
        assert_eq!(avail.remaining_slots, 0);
    }

    #[test]
    fn test_unpaid_bookings_do_not_consume_capacity() {
        let conn = db::init_db(":memory:").unwrap();
        let tour = test_tour();
        queries::insert_tour(&conn, &tour).unwrap();

        let mut unpaid = paid_booking("b1", 5, "2025-07-01 08:00");
        unpaid.paid = false;
        unpaid.status = BookingStatus::Pending;
        unpaid.momo_trans_id = None;
        queries::insert_booking(&conn, &unpaid).unwrap();

        let avail = availability(&conn, &tour, &dt("2025-07-01 08:00").date()).unwrap();
        assert_eq!(avail.booked_slots, 0);
    }

    #[test]
    fn test_comparison_ignores_time_of_day() {
        let conn = db::init_db(":memory:").unwrap();
        let tour = test_tour();
        queries::insert_tour(&conn, &tour).unwrap();
        // Booked at a different clock time on the same calendar date.
        queries::insert_booking(&conn, &paid_booking("b1", 3, "2025-07-01 14:30")).unwrap();

        let avail = availability(&conn, &tour, &dt("2025-07-01 08:00").date()).unwrap();
        assert_eq!(avail.booked_slots, 3);
        assert_eq!(avail.remaining_slots, 7);
    }

    #[test]
    fn test_other_dates_do_not_count() {
        let conn = db::init_db(":memory:").unwrap();
        let tour = test_tour();
        queries::insert_tour(&conn, &tour).unwrap();
        queries::insert_booking(&conn, &paid_booking("b1", 8, "2025-08-01 08:00")).unwrap();

        let avail = availability(&conn, &tour, &dt("2025-07-01 08:00").date()).unwrap();
        assert_eq!(avail.booked_slots, 0);
        assert_eq!(avail.remaining_slots, 10);
    }
}
