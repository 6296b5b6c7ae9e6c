use crate::domain::financial::DISPLAY_DATE_FORMAT;
use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Calendar day of `ts` in the display timezone.
pub fn local_day(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

pub fn today(now_utc: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    local_day(now_utc, offset)
}

/// The `window` calendar days ending at `today`, oldest first.
pub fn window_days(today: NaiveDate, window: u32) -> Vec<NaiveDate> {
    let Some(first) = today.checked_sub_signed(Duration::days(i64::from(window) - 1)) else {
        return Vec::new();
    };
    first.iter_days().take(window as usize).collect()
}

/// UTC instants for the first and last millisecond of `day` in the display timezone.
pub fn day_bounds_utc(
    day: NaiveDate,
    offset: FixedOffset,
) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = offset
        .from_local_datetime(&day.and_time(NaiveTime::MIN))
        .single()
        .with_context(|| format!("no unique local midnight for {day}"))?
        .with_timezone(&Utc);
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    Ok((start, end))
}

/// UTC range covering every day of the window, both ends inclusive.
pub fn window_bounds_utc(
    today: NaiveDate,
    window: u32,
    offset: FixedOffset,
) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let days = window_days(today, window);
    let (first, last) = days
        .first()
        .zip(days.last())
        .context("window must cover at least one day")?;
    let (start, _) = day_bounds_utc(*first, offset)?;
    let (_, end) = day_bounds_utc(*last, offset)?;
    Ok((start, end))
}

/// Accepts `YYYY-MM-DD` or the display form `dd/mm/YYYY`.
pub fn parse_day(s: &str) -> anyhow::Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, DISPLAY_DATE_FORMAT))
        .with_context(|| format!("invalid date: {s} (expected YYYY-MM-DD or dd/mm/YYYY)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc7() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    #[test]
    fn late_utc_evening_is_next_local_day() {
        // 2026-01-05 18:30 UTC = 2026-01-06 01:30 at UTC+7
        let ts = Utc.with_ymd_and_hms(2026, 1, 5, 18, 30, 0).unwrap();
        assert_eq!(local_day(ts, utc7()), NaiveDate::from_ymd_opt(2026, 1, 6).unwrap());
    }

    #[test]
    fn window_covers_exact_day_count_across_month_end() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let days = window_days(today, 4);
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2026, 2, 27).unwrap(),
                NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                today,
            ]
        );
        assert_eq!(window_days(today, 90).len(), 90);
    }

    #[test]
    fn day_bounds_are_local_midnight_to_last_millisecond() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let (start, end) = day_bounds_utc(day, utc7()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 5, 17, 0, 0).unwrap());
        assert_eq!(end - start, Duration::days(1) - Duration::milliseconds(1));
    }

    #[test]
    fn window_bounds_span_first_to_last_day() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let (start, end) = window_bounds_utc(today, 3, utc7()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 3, 17, 0, 0).unwrap());
        assert_eq!(local_day(end, utc7()), today);
        assert!(window_bounds_utc(today, 0, utc7()).is_err());
    }

    #[test]
    fn parses_iso_and_display_dates() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 27).unwrap();
        assert_eq!(parse_day("2026-01-27").unwrap(), expected);
        assert_eq!(parse_day("27/01/2026").unwrap(), expected);
        assert!(parse_day("27/01").is_err());
    }
}
