use chrono::{
    DateTime, Datelike, Days, Duration, Local, Months, NaiveDate, NaiveTime, TimeZone, Timelike,
    Utc,
};

use crate::schedule::cron::{CronExpr, CRON_SCAN_MINUTES};
use crate::schedule::tz::adjust_to_timezone;
use crate::schedule::types::Timing;

/// Day-by-day scan bound for weekly schedules: a full week plus wraparound.
pub const WEEKLY_SCAN_DAYS: u64 = 8;

/// Month-by-month scan bound for monthly schedules: a year plus buffer.
pub const MONTHLY_SCAN_MONTHS: u32 = 13;

/// Compute the next due instant strictly after `after`, or `None` when the
/// schedule is exhausted or its timing is inactionable.
///
/// Malformed configuration (unparseable time/date/cron, out-of-range day,
/// unknown timezone) never errors; it yields `None` so a batch computation
/// over many schedules cannot be taken down by one bad record.
pub fn next_run(timing: &Timing, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match timing {
        Timing::Once {
            date,
            time,
            timezone,
        } => {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let time = parse_hhmm(time)?;
            let candidate = adjust_to_timezone(local_instant(date, time)?, timezone.as_deref())?;
            (candidate > after).then_some(candidate)
        }

        Timing::Daily { time, timezone } => {
            let time = parse_hhmm(time)?;
            let today = after.with_timezone(&Local).date_naive();
            // Today's slot, or the first following day whose slot is still
            // ahead. Two extra days cover any timezone shift.
            for offset in 0..3 {
                let date = today.checked_add_days(Days::new(offset))?;
                let candidate =
                    adjust_to_timezone(local_instant(date, time)?, timezone.as_deref())?;
                if candidate > after {
                    return Some(candidate);
                }
            }
            None
        }

        Timing::Weekly {
            time,
            days_of_week,
            timezone,
        } => {
            if days_of_week.is_empty() || days_of_week.iter().any(|d| *d > 6) {
                return None;
            }
            let time = parse_hhmm(time)?;
            let start = after.with_timezone(&Local).date_naive();
            for offset in 0..WEEKLY_SCAN_DAYS {
                let date = start.checked_add_days(Days::new(offset))?;
                let weekday = date.weekday().num_days_from_sunday() as u8;
                if !days_of_week.contains(&weekday) {
                    continue;
                }
                let candidate =
                    adjust_to_timezone(local_instant(date, time)?, timezone.as_deref())?;
                if candidate > after {
                    return Some(candidate);
                }
            }
            None
        }

        Timing::Monthly {
            date,
            time,
            timezone,
        } => {
            if *date < 1 || *date > 31 {
                return None;
            }
            let time = parse_hhmm(time)?;
            let start = after.with_timezone(&Local).date_naive().with_day(1)?;
            for offset in 0..MONTHLY_SCAN_MONTHS {
                let month_start = start.checked_add_months(Months::new(offset))?;
                // Clamp to the month's last valid day; day 31 in February
                // becomes the 28th (or 29th), never a March rollover.
                let day = (*date as u32).min(days_in_month(month_start.year(), month_start.month()));
                let candidate_date = month_start.with_day(day)?;
                let candidate =
                    adjust_to_timezone(local_instant(candidate_date, time)?, timezone.as_deref())?;
                if candidate > after {
                    return Some(candidate);
                }
            }
            None
        }

        Timing::Cron {
            cron_expression, ..
        } => {
            // The cron search runs in host-local time; the timezone field is
            // not applied on this branch. Existing documents depend on that,
            // so changing it would silently move their recurrence times.
            let expr = CronExpr::parse(cron_expression).ok()?;
            let mut candidate = (after + Duration::minutes(1))
                .with_timezone(&Local)
                .with_second(0)?
                .with_nanosecond(0)?;
            for _ in 0..CRON_SCAN_MINUTES {
                if expr.matches(
                    candidate.minute(),
                    candidate.hour(),
                    candidate.day(),
                    candidate.month(),
                    candidate.weekday().num_days_from_sunday(),
                ) {
                    return Some(candidate.with_timezone(&Utc));
                }
                candidate += Duration::minutes(1);
            }
            None
        }
    }
}

/// Up to `count` upcoming occurrences, advancing one minute past each
/// result. Stops early once the schedule is exhausted.
pub fn next_runs(timing: &Timing, count: usize, after: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut runs = Vec::with_capacity(count);
    let mut cursor = after;
    for _ in 0..count {
        let Some(next) = next_run(timing, cursor) else {
            break;
        };
        cursor = next + Duration::minutes(1);
        runs.push(next);
    }
    runs
}

/// Parse a 24h "HH:MM" wall-clock time.
pub(crate) fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

/// Interpret a wall-clock date/time in the host's local zone. During a DST
/// fold the earlier instant wins; inside a spring-forward gap there is no
/// instant to return.
fn local_instant(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an instant from a host-local wall-clock reading, matching how
    /// the calculator itself constructs candidates.
    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn daily(time: &str) -> Timing {
        Timing::Daily {
            time: time.into(),
            timezone: None,
        }
    }

    // --- once ---

    #[test]
    fn test_once_future() {
        let timing = Timing::Once {
            date: "2026-06-15".into(),
            time: "09:00".into(),
            timezone: None,
        };
        let after = local(2026, 6, 1, 12, 0);
        assert_eq!(next_run(&timing, after), Some(local(2026, 6, 15, 9, 0)));
    }

    #[test]
    fn test_once_past_is_exhausted() {
        let timing = Timing::Once {
            date: "2026-06-15".into(),
            time: "09:00".into(),
            timezone: None,
        };
        assert_eq!(next_run(&timing, local(2026, 6, 15, 9, 0)), None);
        assert_eq!(next_run(&timing, local(2026, 7, 1, 0, 0)), None);
    }

    #[test]
    fn test_once_malformed_date() {
        let timing = Timing::Once {
            date: "June 15th".into(),
            time: "09:00".into(),
            timezone: None,
        };
        assert_eq!(next_run(&timing, local(2026, 1, 1, 0, 0)), None);
    }

    // --- daily ---

    #[test]
    fn test_daily_same_day_when_before_slot() {
        let after = local(2026, 3, 10, 7, 0);
        assert_eq!(next_run(&daily("08:00"), after), Some(local(2026, 3, 10, 8, 0)));
    }

    #[test]
    fn test_daily_advances_when_at_or_past_slot() {
        assert_eq!(
            next_run(&daily("08:00"), local(2026, 3, 10, 8, 0)),
            Some(local(2026, 3, 11, 8, 0))
        );
        assert_eq!(
            next_run(&daily("08:00"), local(2026, 3, 10, 22, 30)),
            Some(local(2026, 3, 11, 8, 0))
        );
    }

    #[test]
    fn test_daily_malformed_time() {
        assert_eq!(next_run(&daily("25:99"), local(2026, 3, 10, 7, 0)), None);
        assert_eq!(next_run(&daily("eight"), local(2026, 3, 10, 7, 0)), None);
    }

    // --- weekly ---

    #[test]
    fn test_weekly_wraparound_from_saturday() {
        // 2026-03-14 is a Saturday; Friday-only must land on the 20th,
        // six days later, never the same day.
        let timing = Timing::Weekly {
            time: "09:00".into(),
            days_of_week: vec![5],
            timezone: None,
        };
        let after = local(2026, 3, 14, 10, 0);
        assert_eq!(next_run(&timing, after), Some(local(2026, 3, 20, 9, 0)));
    }

    #[test]
    fn test_weekly_same_day_slot_not_yet_passed() {
        // 2026-03-13 is a Friday.
        let timing = Timing::Weekly {
            time: "09:00".into(),
            days_of_week: vec![5],
            timezone: None,
        };
        assert_eq!(
            next_run(&timing, local(2026, 3, 13, 8, 0)),
            Some(local(2026, 3, 13, 9, 0))
        );
        // At 09:00 exactly the slot is spent; next Friday.
        assert_eq!(
            next_run(&timing, local(2026, 3, 13, 9, 0)),
            Some(local(2026, 3, 20, 9, 0))
        );
    }

    #[test]
    fn test_weekly_picks_earliest_allowed_day() {
        // Sunday the 15th, allowed {Tue, Thu} -> Tuesday the 17th.
        let timing = Timing::Weekly {
            time: "12:00".into(),
            days_of_week: vec![4, 2],
            timezone: None,
        };
        assert_eq!(
            next_run(&timing, local(2026, 3, 15, 0, 0)),
            Some(local(2026, 3, 17, 12, 0))
        );
    }

    #[test]
    fn test_weekly_invalid_day_set() {
        let empty = Timing::Weekly {
            time: "09:00".into(),
            days_of_week: vec![],
            timezone: None,
        };
        assert_eq!(next_run(&empty, local(2026, 3, 14, 0, 0)), None);

        let out_of_range = Timing::Weekly {
            time: "09:00".into(),
            days_of_week: vec![7],
            timezone: None,
        };
        assert_eq!(next_run(&out_of_range, local(2026, 3, 14, 0, 0)), None);
    }

    // --- monthly ---

    #[test]
    fn test_monthly_february_clamps_day_31() {
        let timing = Timing::Monthly {
            date: 31,
            time: "09:00".into(),
            timezone: None,
        };
        // 2026 is not a leap year.
        let after = local(2026, 2, 1, 10, 0);
        assert_eq!(next_run(&timing, after), Some(local(2026, 2, 28, 9, 0)));
        // And after February's clamped run, back to a real 31st.
        let after = local(2026, 2, 28, 9, 0);
        assert_eq!(next_run(&timing, after), Some(local(2026, 3, 31, 9, 0)));
    }

    #[test]
    fn test_monthly_leap_year_clamp() {
        let timing = Timing::Monthly {
            date: 30,
            time: "09:00".into(),
            timezone: None,
        };
        let after = local(2028, 2, 1, 0, 0);
        assert_eq!(next_run(&timing, after), Some(local(2028, 2, 29, 9, 0)));
    }

    #[test]
    fn test_monthly_advances_past_spent_slot() {
        let timing = Timing::Monthly {
            date: 1,
            time: "09:00".into(),
            timezone: None,
        };
        assert_eq!(
            next_run(&timing, local(2026, 4, 1, 9, 0)),
            Some(local(2026, 5, 1, 9, 0))
        );
    }

    #[test]
    fn test_monthly_out_of_range_day() {
        let timing = Timing::Monthly {
            date: 0,
            time: "09:00".into(),
            timezone: None,
        };
        assert_eq!(next_run(&timing, local(2026, 4, 1, 0, 0)), None);
        let timing = Timing::Monthly {
            date: 32,
            time: "09:00".into(),
            timezone: None,
        };
        assert_eq!(next_run(&timing, local(2026, 4, 1, 0, 0)), None);
    }

    // --- cron ---

    fn cron(expr: &str) -> Timing {
        Timing::Cron {
            cron_expression: expr.into(),
            timezone: None,
        }
    }

    #[test]
    fn test_cron_daily_expression() {
        let after = local(2026, 3, 10, 14, 0);
        assert_eq!(
            next_run(&cron("30 14 * * *"), after),
            Some(local(2026, 3, 10, 14, 30))
        );
        assert_eq!(
            next_run(&cron("30 14 * * *"), local(2026, 3, 10, 14, 30)),
            Some(local(2026, 3, 11, 14, 30))
        );
    }

    #[test]
    fn test_cron_or_semantics_for_dual_day_fields() {
        // 9:00 on the 1st OR on Mondays. 2026-03-02 is a Monday that is not
        // the 1st; 2026-04-01 is a Wednesday that is the 1st.
        let timing = cron("0 9 1 * 1");
        assert_eq!(
            next_run(&timing, local(2026, 3, 2, 0, 0)),
            Some(local(2026, 3, 2, 9, 0))
        );
        assert_eq!(
            next_run(&timing, local(2026, 3, 31, 23, 0)),
            Some(local(2026, 4, 1, 9, 0))
        );
        // From a Monday just past 9:00, the following Monday comes before
        // the next 1st.
        assert_eq!(
            next_run(&timing, local(2026, 3, 2, 9, 0)),
            Some(local(2026, 3, 9, 9, 0))
        );
    }

    #[test]
    fn test_cron_strictly_after_reference() {
        let at = local(2026, 3, 10, 14, 30);
        let next = next_run(&cron("30 14 * * *"), at).unwrap();
        assert!(next > at);
    }

    #[test]
    fn test_cron_invalid_expression() {
        assert_eq!(next_run(&cron("not a cron"), local(2026, 1, 1, 0, 0)), None);
        assert_eq!(next_run(&cron("*/5 * * * *"), local(2026, 1, 1, 0, 0)), None);
    }

    // --- next_runs ---

    #[test]
    fn test_next_runs_daily_sequence() {
        let after = local(2026, 3, 10, 7, 0);
        let runs = next_runs(&daily("08:00"), 3, after);
        assert_eq!(
            runs,
            vec![
                local(2026, 3, 10, 8, 0),
                local(2026, 3, 11, 8, 0),
                local(2026, 3, 12, 8, 0),
            ]
        );
    }

    #[test]
    fn test_next_runs_stops_on_exhaustion() {
        let timing = Timing::Once {
            date: "2026-06-15".into(),
            time: "09:00".into(),
            timezone: None,
        };
        let runs = next_runs(&timing, 5, local(2026, 6, 1, 0, 0));
        assert_eq!(runs, vec![local(2026, 6, 15, 9, 0)]);

        let exhausted = next_runs(&timing, 5, local(2026, 7, 1, 0, 0));
        assert!(exhausted.is_empty());
    }

    // --- cross-cutting ---

    #[test]
    fn test_never_returns_past_instant() {
        let after = local(2026, 3, 14, 10, 0);
        let timings = [
            daily("08:00"),
            Timing::Weekly {
                time: "09:00".into(),
                days_of_week: vec![0, 3, 5],
                timezone: None,
            },
            Timing::Monthly {
                date: 14,
                time: "10:00".into(),
                timezone: None,
            },
            cron("0 10 14 * *"),
        ];
        for timing in &timings {
            let next = next_run(timing, after).unwrap();
            assert!(next > after, "{timing:?} produced non-future {next}");
        }
    }

    #[test]
    fn test_unknown_timezone_yields_none() {
        let timing = Timing::Daily {
            time: "08:00".into(),
            timezone: Some("Mars/Olympus_Mons".into()),
        };
        assert_eq!(next_run(&timing, local(2026, 3, 10, 7, 0)), None);
    }

    #[test]
    fn test_timezone_shifts_daily_candidate() {
        // Anchoring the same wall-clock time in New York vs Chicago keeps a
        // fixed one-hour spread regardless of the host zone.
        let after = local(2026, 1, 10, 0, 0);
        let ny = next_run(
            &Timing::Daily {
                time: "08:00".into(),
                timezone: Some("America/New_York".into()),
            },
            after,
        )
        .unwrap();
        let chi = next_run(
            &Timing::Daily {
                time: "08:00".into(),
                timezone: Some("America/Chicago".into()),
            },
            after,
        )
        .unwrap();
        assert_eq!(chi - ny, Duration::hours(1));
    }
}
