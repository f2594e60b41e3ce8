use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, RefundStatus, Tour};

const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DT_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Tours ──

pub fn get_tour(conn: &Connection, id: &str) -> anyhow::Result<Option<Tour>> {
    let result = conn.query_row(
        "SELECT id, name, unit_price, max_group_size, start_dates FROM tours WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );

    match result {
        Ok((id, name, unit_price, max_group_size, dates_json)) => {
            let raw: Vec<String> = serde_json::from_str(&dates_json).unwrap_or_default();
            let start_dates = raw
                .iter()
                .filter_map(|s| NaiveDateTime::parse_from_str(s, DT_FORMAT).ok())
                .collect();

            Ok(Some(Tour {
                id,
                name,
                unit_price,
                max_group_size,
                start_dates,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_tour(conn: &Connection, tour: &Tour) -> anyhow::Result<()> {
    let dates: Vec<String> = tour.start_dates.iter().map(fmt_dt).collect();
    let dates_json = serde_json::to_string(&dates)?;

    conn.execute(
        "INSERT INTO tours (id, name, unit_price, max_group_size, start_dates)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           unit_price = excluded.unit_price,
           max_group_size = excluded.max_group_size,
           start_dates = excluded.start_dates",
        params![
            tour.id,
            tour.name,
            tour.unit_price,
            tour.max_group_size,
            dates_json,
        ],
    )?;
    Ok(())
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, tour_id, user_id, start_date, number_of_people, price, paid, \
     status, momo_trans_id, momo_request_id, cancelled_at, refund_status, refund_amount, \
     refund_date, created_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, tour_id, user_id, start_date, number_of_people, price, paid,
             status, momo_trans_id, momo_request_id, cancelled_at, refund_status, refund_amount,
             refund_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            booking.id,
            booking.tour_id,
            booking.user_id,
            fmt_dt(&booking.start_date),
            booking.number_of_people,
            booking.price,
            booking.paid as i32,
            booking.status.as_str(),
            booking.momo_trans_id,
            booking.momo_request_id,
            booking.cancelled_at.as_ref().map(fmt_dt),
            booking.refund_status.as_str(),
            booking.refund_amount,
            booking.refund_date.as_ref().map(fmt_dt),
            fmt_dt(&booking.created_at),
        ],
    )?;
    Ok(())
}

/// Persists the mutable half of a booking in one write. Transition functions
/// produce the new value; this is the only way it reaches storage.
pub fn save_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE bookings SET paid = ?1, status = ?2, momo_trans_id = ?3, momo_request_id = ?4,
             cancelled_at = ?5, refund_status = ?6, refund_amount = ?7, refund_date = ?8
         WHERE id = ?9",
        params![
            booking.paid as i32,
            booking.status.as_str(),
            booking.momo_trans_id,
            booking.momo_request_id,
            booking.cancelled_at.as_ref().map(fmt_dt),
            booking.refund_status.as_str(),
            booking.refund_amount,
            booking.refund_date.as_ref().map(fmt_dt),
            booking.id,
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// An unpaid pending booking for the same tour, user and departure. Repeat
/// payment attempts reuse this row instead of piling up duplicates.
pub fn find_reusable_booking(
    conn: &Connection,
    tour_id: &str,
    user_id: &str,
    start_date: &NaiveDateTime,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE tour_id = ?1 AND user_id = ?2 AND start_date = ?3
               AND paid = 0 AND status = 'pending'
             ORDER BY created_at DESC LIMIT 1"
        ),
        params![tour_id, user_id, fmt_dt(start_date)],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

/// Sum of seats across paid bookings for one departure date of a tour.
/// Date-only comparison; the time of day on the stored start_date is ignored.
pub fn paid_people_for_date(
    conn: &Connection,
    tour_id: &str,
    date: &NaiveDate,
) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COALESCE(SUM(number_of_people), 0) FROM bookings
         WHERE tour_id = ?1 AND paid = 1 AND date(start_date) = ?2",
        params![tour_id, date.format("%Y-%m-%d").to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let tour_id: String = row.get(1)?;
    let user_id: String = row.get(2)?;
    let start_date_str: String = row.get(3)?;
    let number_of_people: i64 = row.get(4)?;
    let price: i64 = row.get(5)?;
    let paid: bool = row.get::<_, i32>(6)? != 0;
    let status_str: String = row.get(7)?;
    let momo_trans_id: Option<String> = row.get(8)?;
    let momo_request_id: Option<String> = row.get(9)?;
    let cancelled_at_str: Option<String> = row.get(10)?;
    let refund_status_str: String = row.get(11)?;
    let refund_amount: i64 = row.get(12)?;
    let refund_date_str: Option<String> = row.get(13)?;
    let created_at_str: String = row.get(14)?;

    Ok(Booking {
        id,
        tour_id,
        user_id,
        start_date: parse_dt(&start_date_str),
        number_of_people,
        price,
        paid,
        status: BookingStatus::parse(&status_str),
        momo_trans_id,
        momo_request_id,
        cancelled_at: cancelled_at_str.as_deref().map(parse_dt),
        refund_status: RefundStatus::parse(&refund_status_str),
        refund_amount,
        refund_date: refund_date_str.as_deref().map(parse_dt),
        created_at: parse_dt(&created_at_str),
    })
}
