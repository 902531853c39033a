use chrono::{DateTime, Datelike, Days, Local, NaiveTime, Timelike, Utc};

use crate::schedule::recurrence::parse_hhmm;
use crate::schedule::types::Timing;

/// Human-readable description of a timing configuration, e.g.
/// "Daily at 8:00 AM" or "Weekdays at 8:30 AM".
pub fn format_timing(timing: &Timing) -> String {
    match timing {
        Timing::Once { date, time, .. } => {
            format!("Once on {} at {}", date, display_time(time))
        }
        Timing::Daily { time, .. } => format!("Daily at {}", display_time(time)),
        Timing::Weekly {
            time, days_of_week, ..
        } => {
            let mut days: Vec<u8> = days_of_week.iter().copied().filter(|d| *d <= 6).collect();
            days.sort_unstable();
            days.dedup();
            let when = display_time(time);
            match days.as_slice() {
                [] => format!("Weekly at {when}"),
                [0, 1, 2, 3, 4, 5, 6] => format!("Every day at {when}"),
                [1, 2, 3, 4, 5] => format!("Weekdays at {when}"),
                [0, 6] => format!("Weekends at {when}"),
                days => {
                    let names: Vec<&str> = days.iter().map(|d| day_name(*d)).collect();
                    format!("Weekly on {} at {when}", names.join(", "))
                }
            }
        }
        Timing::Monthly { date, time, .. } => {
            format!("Monthly on the {} at {}", ordinal(*date), display_time(time))
        }
        Timing::Cron {
            cron_expression, ..
        } => format!("Cron ({cron_expression})"),
    }
}

/// Human-readable rendering of a next-run instant relative to `now`, e.g.
/// "Today at 8:00 AM", "Tomorrow at 8:00 AM", "Friday at 9:00 AM".
pub fn format_next_run(next_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(next) = next_run_at else {
        return "Not scheduled".to_string();
    };

    let next_local = next.with_timezone(&Local);
    let now_local = now.with_timezone(&Local);
    let time = format_time_12h(next_local.time());

    let next_date = next_local.date_naive();
    let today = now_local.date_naive();
    if next_date == today {
        return format!("Today at {time}");
    }
    if Some(next_date) == today.checked_add_days(Days::new(1)) {
        return format!("Tomorrow at {time}");
    }
    let days_ahead = (next_date - today).num_days();
    if (0..7).contains(&days_ahead) {
        return format!("{} at {time}", day_name(next_date.weekday().num_days_from_sunday() as u8));
    }
    format!("{} at {time}", next_local.format("%b %-d"))
}

/// 12-hour clock rendering without a leading zero: "8:05 AM", "12:30 PM".
pub fn format_time_12h(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    format!(
        "{}:{:02} {}",
        hour,
        time.minute(),
        if is_pm { "PM" } else { "AM" }
    )
}

fn display_time(raw: &str) -> String {
    match parse_hhmm(raw) {
        Some(time) => format_time_12h(time),
        None => raw.to_string(),
    }
}

fn day_name(day: u8) -> &'static str {
    match day {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        _ => "Saturday",
    }
}

fn ordinal(day: u8) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}
