use thiserror::Error;

/// Upper bound on the minute-by-minute forward search: one year of minutes.
/// Hitting the cap means "no match" rather than looping forever.
pub const CRON_SCAN_MINUTES: u32 = 366 * 24 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum CronParseError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid value '{value}' in {field} field")]
    InvalidValue { field: &'static str, value: String },
    #[error("value {value} out of range {min}-{max} in {field} field")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// One parsed cron field: a sorted, deduplicated set of allowed values.
#[derive(Debug, Clone, PartialEq)]
pub struct CronField {
    values: Vec<u32>,
    /// False when the field was `*`. Needed for the POSIX day rule, which
    /// treats an explicit full range `0-6` differently from a bare `*`.
    restricted: bool,
}

impl CronField {
    pub fn contains(&self, value: u32) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }
}

/// A parsed 5-field cron expression: minute hour day-of-month month day-of-week.
///
/// Supports `*`, comma lists, and inclusive `a-b` ranges. Step values,
/// month/day names, and `@`-macros are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct CronExpr {
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_month: CronField,
    pub month: CronField,
    pub day_of_week: CronField,
}

impl CronExpr {
    pub fn parse(expression: &str) -> Result<Self, CronParseError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError::FieldCount(fields.len()));
        }
        Ok(Self {
            minute: parse_field(fields[0], "minute", 0, 59)?,
            hour: parse_field(fields[1], "hour", 0, 23)?,
            day_of_month: parse_field(fields[2], "day-of-month", 1, 31)?,
            month: parse_field(fields[3], "month", 1, 12)?,
            day_of_week: parse_field(fields[4], "day-of-week", 0, 6)?,
        })
    }

    /// Whether a candidate minute matches. `weekday` is Sunday-based (0–6).
    pub fn matches(&self, minute: u32, hour: u32, day: u32, month: u32, weekday: u32) -> bool {
        self.minute.contains(minute)
            && self.hour.contains(hour)
            && self.month.contains(month)
            && self.day_matches(day, weekday)
    }

    /// POSIX day rule: when both day fields are restricted a day qualifies
    /// if it matches either one; when only one is restricted only that one
    /// is checked; when neither is, every day qualifies.
    fn day_matches(&self, day: u32, weekday: u32) -> bool {
        match (
            self.day_of_month.is_restricted(),
            self.day_of_week.is_restricted(),
        ) {
            (true, true) => self.day_of_month.contains(day) || self.day_of_week.contains(weekday),
            (true, false) => self.day_of_month.contains(day),
            (false, true) => self.day_of_week.contains(weekday),
            (false, false) => true,
        }
    }
}

fn parse_field(
    spec: &str,
    field: &'static str,
    min: u32,
    max: u32,
) -> Result<CronField, CronParseError> {
    if spec == "*" {
        return Ok(CronField {
            values: (min..=max).collect(),
            restricted: false,
        });
    }

    let mut values = Vec::new();
    for part in spec.split(',') {
        if let Some((lo, hi)) = part.split_once('-') {
            let lo = parse_value(lo, field, part, min, max)?;
            let hi = parse_value(hi, field, part, min, max)?;
            if lo > hi {
                return Err(CronParseError::InvalidValue {
                    field,
                    value: part.to_string(),
                });
            }
            values.extend(lo..=hi);
        } else {
            values.push(parse_value(part, field, part, min, max)?);
        }
    }
    values.sort_unstable();
    values.dedup();
    Ok(CronField {
        values,
        restricted: true,
    })
}

fn parse_value(
    raw: &str,
    field: &'static str,
    part: &str,
    min: u32,
    max: u32,
) -> Result<u32, CronParseError> {
    let value: u32 = raw.parse().map_err(|_| CronParseError::InvalidValue {
        field,
        value: part.to_string(),
    })?;
    if value < min || value > max {
        return Err(CronParseError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}
