use chrono::{Duration, NaiveDate, Utc};

/// Activity rows are keyed by the UTC calendar day.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Default display window for the activity calendar.
pub fn default_activity_window(to: Option<NaiveDate>, from: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    let to = to.unwrap_or_else(today_utc);
    let from = from.unwrap_or(to - Duration::days(29));
    if from > to {
        (to, from)
    } else {
        (from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_defaults_to_thirty_days() {
        let to = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let (from, end) = default_activity_window(Some(to), None);
        assert_eq!(end, to);
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn window_swaps_reversed_bounds() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(default_activity_window(Some(b), Some(a)), (b, a));
    }
}
