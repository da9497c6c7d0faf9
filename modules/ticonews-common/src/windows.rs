use std::time::Duration;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Map a local wall-clock time to an instant in `tz`.
///
/// Costa Rica has no DST, so the mapping is total there. For zones that do:
/// an ambiguous local time (clock fold) resolves to the earliest instant, a
/// skipped local time rolls forward one hour.
pub fn local_instant(tz: Tz, day: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let naive = day.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => match tz.from_local_datetime(&(naive + chrono::Duration::hours(1))) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => tz.from_utc_datetime(&naive),
        },
    }
}

/// The next trigger instant strictly after `now`. `times` must be sorted.
/// Returns `None` when no trigger times are configured.
pub fn next_trigger(times: &[NaiveTime], tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if times.is_empty() {
        return None;
    }
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();

    for time in times {
        let candidate = local_instant(tz, today, *time);
        if candidate > local_now {
            return Some(candidate.with_timezone(&Utc));
        }
    }
    let tomorrow = today.succ_opt()?;
    Some(local_instant(tz, tomorrow, times[0]).with_timezone(&Utc))
}

/// The trigger instant strictly before `at`. `times` must be sorted.
pub fn previous_trigger(times: &[NaiveTime], tz: Tz, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if times.is_empty() {
        return None;
    }
    let local_at = at.with_timezone(&tz);
    let today = local_at.date_naive();

    for time in times.iter().rev() {
        let candidate = local_instant(tz, today, *time);
        if candidate < local_at {
            return Some(candidate.with_timezone(&Utc));
        }
    }
    let yesterday = today.pred_opt()?;
    Some(local_instant(tz, yesterday, *times.last()?).with_timezone(&Utc))
}

/// Selection window for the cycle firing at `trigger`: half-open
/// `[previous trigger - shift, trigger)`. The backward shift tolerates
/// analysis lag: an article published just before the previous trigger but
/// analyzed just after it is picked up by the next cycle.
pub fn selection_window(
    times: &[NaiveTime],
    tz: Tz,
    trigger: DateTime<Utc>,
    shift: Duration,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let previous = previous_trigger(times, tz, trigger)?;
    let shift = chrono::Duration::from_std(shift).unwrap_or_else(|_| chrono::Duration::zero());
    Some((previous - shift, trigger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Costa_Rica;

    fn times(list: &[&str]) -> Vec<NaiveTime> {
        list.iter().map(|t| t.parse().unwrap()).collect()
    }

    fn cr_instant(day: &str, time: &str) -> DateTime<Utc> {
        local_instant(Costa_Rica, day.parse().unwrap(), time.parse().unwrap())
            .with_timezone(&Utc)
    }

    #[test]
    fn next_trigger_same_day() {
        let t = times(&["06:00", "12:00", "16:30"]);
        let now = cr_instant("2024-06-01", "10:00");
        assert_eq!(
            next_trigger(&t, Costa_Rica, now),
            Some(cr_instant("2024-06-01", "12:00"))
        );
    }

    #[test]
    fn next_trigger_wraps_to_tomorrow() {
        let t = times(&["06:00", "12:00", "16:30"]);
        let now = cr_instant("2024-06-01", "20:00");
        assert_eq!(
            next_trigger(&t, Costa_Rica, now),
            Some(cr_instant("2024-06-02", "06:00"))
        );
    }

    #[test]
    fn next_trigger_is_strictly_after_now() {
        // Waking exactly at a trigger must schedule the following one.
        let t = times(&["06:00", "12:00"]);
        let now = cr_instant("2024-06-01", "06:00");
        assert_eq!(
            next_trigger(&t, Costa_Rica, now),
            Some(cr_instant("2024-06-01", "12:00"))
        );
    }

    #[test]
    fn previous_trigger_crosses_midnight() {
        let t = times(&["06:00", "12:00", "16:30"]);
        let at = cr_instant("2024-06-02", "06:00");
        assert_eq!(
            previous_trigger(&t, Costa_Rica, at),
            Some(cr_instant("2024-06-01", "16:30"))
        );
    }

    #[test]
    fn shifted_window_extends_behind_previous_trigger() {
        // Triggers 06:00 and 12:00, shift 30 min: the 12:00 window is
        // [05:30, 12:00), so an article from 05:45 analyzed late is caught.
        let t = times(&["06:00", "12:00"]);
        let trigger = cr_instant("2024-06-01", "12:00");
        let (start, end) =
            selection_window(&t, Costa_Rica, trigger, Duration::from_secs(1800)).unwrap();
        assert_eq!(start, cr_instant("2024-06-01", "05:30"));
        assert_eq!(end, trigger);

        let article = cr_instant("2024-06-01", "05:45");
        assert!(article >= start && article < end);
    }

    #[test]
    fn window_end_is_exclusive() {
        let t = times(&["06:00", "12:00"]);
        let trigger = cr_instant("2024-06-01", "12:00");
        let (start, end) =
            selection_window(&t, Costa_Rica, trigger, Duration::from_secs(1800)).unwrap();

        // An article timestamped exactly at the trigger belongs to the next
        // window, not this one.
        let at_trigger = cr_instant("2024-06-01", "12:00");
        assert!(!(at_trigger >= start && at_trigger < end));

        let next = next_trigger(&t, Costa_Rica, trigger).unwrap();
        let (next_start, next_end) =
            selection_window(&t, Costa_Rica, next, Duration::from_secs(1800)).unwrap();
        assert!(at_trigger >= next_start && at_trigger < next_end);
    }

    #[test]
    fn empty_trigger_list_yields_nothing() {
        assert_eq!(next_trigger(&[], Costa_Rica, Utc::now()), None);
        assert_eq!(previous_trigger(&[], Costa_Rica, Utc::now()), None);
    }

    #[test]
    fn single_trigger_spans_a_full_day() {
        let t = times(&["12:00"]);
        let trigger = cr_instant("2024-06-02", "12:00");
        let (start, end) =
            selection_window(&t, Costa_Rica, trigger, Duration::from_secs(0)).unwrap();
        assert_eq!(start, cr_instant("2024-06-01", "12:00"));
        assert_eq!(end, trigger);
    }
}
