use chrono::NaiveDateTime;
use serde::Serialize;

const DAY_SECS: i64 = 86_400;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefundCalculation {
    pub refund_amount: i64,
    pub refund_percentage: i64,
    pub days_diff: i64,
}

/// Tiered refund policy: the closer the departure, the smaller the refund.
/// Tiers are evaluated on the exact distance to departure; `days_diff` is
/// reported floored, so a departure that passed less than a day ago comes out
/// as -1. Callers treat negative `days_diff` as "too late to cancel".
pub fn calculate_refund(
    start_date: &NaiveDateTime,
    price: i64,
    now: &NaiveDateTime,
) -> RefundCalculation {
    let secs = (*start_date - *now).num_seconds();

    let refund_percentage = if secs >= 30 * DAY_SECS {
        100
    } else if secs >= 15 * DAY_SECS {
        75
    } else if secs >= 7 * DAY_SECS {
        50
    } else if secs >= 3 * DAY_SECS {
        25
    } else {
        0
    };

    RefundCalculation {
        refund_amount: ((price * refund_percentage) as f64 / 100.0).round() as i64,
        refund_percentage,
        days_diff: secs.div_euclid(DAY_SECS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn calc(days_out: i64, price: i64) -> RefundCalculation {
        let start = now() + Duration::days(days_out);
        calculate_refund(&start, price, &now())
    }

    #[test]
    fn test_full_refund_at_thirty_days() {
        let r = calc(30, 1_000_000);
        assert_eq!(r.refund_percentage, 100);
        assert_eq!(r.refund_amount, 1_000_000);
        assert_eq!(r.days_diff, 30);
    }

    #[test]
    fn test_seventy_five_percent_between_fifteen_and_thirty() {
        let r = calc(20, 4_000_000);
        assert_eq!(r.refund_percentage, 75);
        assert_eq!(r.refund_amount, 3_000_000);
    }

    #[test]
    fn test_half_refund_between_seven_and_fifteen() {
        let r = calc(10, 1_000_000);
        assert_eq!(r.refund_percentage, 50);
        assert_eq!(r.refund_amount, 500_000);
        assert_eq!(r.days_diff, 10);
    }

    #[test]
    fn test_quarter_refund_between_three_and_seven() {
        let r = calc(3, 1_000_000);
        assert_eq!(r.refund_percentage, 25);
        assert_eq!(r.refund_amount, 250_000);
    }

    #[test]
    fn test_no_refund_under_three_days() {
        let r = calc(2, 1_000_000);
        assert_eq!(r.refund_percentage, 0);
        assert_eq!(r.refund_amount, 0);
    }

    #[test]
    fn test_tiers_use_exact_distance_not_floored_days() {
        // 29 days and 12 hours out: floored days_diff is 29 but the tier is
        // still 75, matching the un-floored comparison.
        let start = now() + Duration::days(29) + Duration::hours(12);
        let r = calculate_refund(&start, 1_000_000, &now());
        assert_eq!(r.refund_percentage, 75);
        assert_eq!(r.days_diff, 29);
    }

    #[test]
    fn test_boundary_just_under_thirty_days() {
        let start = now() + Duration::days(30) - Duration::seconds(1);
        let r = calculate_refund(&start, 1_000_000, &now());
        assert_eq!(r.refund_percentage, 75);
    }

    #[test]
    fn test_departure_in_the_past_reports_negative_days() {
        let start = now() - Duration::hours(6);
        let r = calculate_refund(&start, 1_000_000, &now());
        assert_eq!(r.days_diff, -1);
        assert_eq!(r.refund_percentage, 0);
    }

    #[test]
    fn test_departure_later_today_is_day_zero() {
        let start = now() + Duration::hours(6);
        let r = calculate_refund(&start, 1_000_000, &now());
        assert_eq!(r.days_diff, 0);
        assert_eq!(r.refund_percentage, 0);
    }

    #[test]
    fn test_rounding_of_refund_amount() {
        // 25% of 999 is 249.75, rounds to 250.
        let r = calc(5, 999);
        assert_eq!(r.refund_amount, 250);
    }
}
