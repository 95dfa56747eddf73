use std::fmt::Display;
use std::iter;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};

use super::error::ConfigurationError;

const FIELD: &str = "schedule";

/// Predefined schedules understood by the CronJob controller.
const MACROS: &[(&str, &str)] = &[
    ("@yearly", "0 0 1 1 *"),
    ("@annually", "0 0 1 1 *"),
    ("@monthly", "0 0 1 * *"),
    ("@weekly", "0 0 * * 0"),
    ("@daily", "0 0 * * *"),
    ("@midnight", "0 0 * * *"),
    ("@hourly", "0 * * * *"),
];

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAYS: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// A validated 5-field cron expression.
///
/// The expression is kept verbatim for rendering; the parsed form is only used
/// to compute upcoming fire times. When both day-of-month and day-of-week are
/// restricted a run is due when either matches, so such expressions are parsed
/// into one schedule per day field.
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    parsed: Vec<cron::Schedule>,
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Schedule, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidSchedule {
            field: FIELD,
            value: expression.to_string(),
            reason,
        };

        let trimmed = expression.trim();
        if trimmed.starts_with("TZ=") || trimmed.starts_with("CRON_TZ=") {
            return Err(ConfigurationError::ScheduleTimeZonePrefix {
                field: FIELD,
                value: expression.to_string(),
            });
        }

        let standard = match trimmed.strip_prefix('@') {
            Some(_) => MACROS
                .iter()
                .find(|(name, _)| *name == trimmed)
                .map(|(_, standard)| *standard)
                .ok_or_else(|| invalid(format!("unknown predefined schedule '{trimmed}'")))?,
            None => trimmed,
        };

        let fields: Vec<&str> = standard.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields[..] else {
            return Err(invalid(format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), found {}",
                fields.len()
            )));
        };

        let either_day = !is_wildcard(day_of_month) && !is_wildcard(day_of_week);

        // The cron crate wants seconds and year, and numbers weekdays from 1 (Sunday).
        let month = numeric_field(month, MONTHS, 1, 0).map_err(&invalid)?;
        let day_of_week = numeric_field(day_of_week, WEEKDAYS, 0, 1).map_err(&invalid)?;
        let day_combinations = if either_day {
            vec![(day_of_month, "*"), ("*", day_of_week.as_str())]
        } else {
            vec![(day_of_month, day_of_week.as_str())]
        };

        let parsed = day_combinations
            .into_iter()
            .map(|(day_of_month, day_of_week)| {
                let extended = format!("0 {minute} {hour} {day_of_month} {month} {day_of_week} *");
                cron::Schedule::from_str(&extended).map_err(|e| invalid(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Schedule {
            expression: expression.to_string(),
            parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Fire times after now, evaluated in `tz`.
    pub fn upcoming<'a, Z: TimeZone + 'a>(
        &'a self,
        tz: Z,
    ) -> impl Iterator<Item = DateTime<Z>> + 'a {
        self.after(Utc::now().with_timezone(&tz))
    }

    /// Fire times strictly after `start`, in ascending order.
    pub fn after<'a, Z: TimeZone + 'a>(
        &'a self,
        start: DateTime<Z>,
    ) -> impl Iterator<Item = DateTime<Z>> + 'a {
        let mut runs: Vec<_> = self
            .parsed
            .iter()
            .map(|schedule| schedule.after(&start).peekable())
            .collect();

        iter::from_fn(move || {
            let next = runs
                .iter_mut()
                .filter_map(|run| run.peek().cloned())
                .min()?;
            for run in runs.iter_mut() {
                if run.peek() == Some(&next) {
                    run.next();
                }
            }
            Some(next)
        })
    }
}

/// Whether a day field matches every day, which makes the other day field decide alone.
fn is_wildcard(field: &str) -> bool {
    field
        .split(',')
        .any(|part| part.starts_with('*') || part.starts_with('?'))
}

/// Rewrites the values of a field to numbers, replacing names and adding `offset`.
///
/// `names[0]` stands for `first`, which is also the lowest accepted number.
fn numeric_field(field: &str, names: &[&str], first: u32, offset: u32) -> Result<String, String> {
    let last = first + names.len() as u32 - 1;
    let value = |token: &str| -> Result<String, String> {
        if token.starts_with('*') || token.starts_with('?') {
            return Ok(token.to_string());
        }
        let number = match names.iter().position(|name| name.eq_ignore_ascii_case(token)) {
            Some(index) => first + index as u32,
            None => token
                .parse::<u32>()
                .map_err(|_| format!("invalid value '{token}'"))?,
        };
        if !(first..=last).contains(&number) {
            return Err(format!("{number} is out of range {first}-{last}"));
        }
        Ok((number + offset).to_string())
    };

    field
        .split(',')
        .map(|part| -> Result<String, String> {
            let (base, step) = match part.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (part, None),
            };
            let base = match base.split_once('-') {
                Some((start, end)) => format!("{}-{}", value(start)?, value(end)?),
                None => value(base)?,
            };
            Ok(match step {
                Some(step) => format!("{base}/{step}"),
                None => base,
            })
        })
        .collect::<Result<Vec<_>, String>>()
        .map(|parts| parts.join(","))
}

impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for Schedule {}

impl Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for Schedule {
    type Err = ConfigurationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schedule::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, Timelike, Weekday};

    use super::*;

    #[test]
    fn test_schedule_accepts_standard_expressions() {
        for expr in [
            "0 0 * * *",
            "*/15 * * * *",
            "30 2 1,15 * *",
            "0 9-17 * * 1-5",
            "0 0 * Jan,Jul Sun",
            "0 0 * * 0",
            "5 4 * * 6",
            "0 0 * * SUN-5",
            "0 0 * * mon-5",
            "0 0 * jan-6 *",
        ] {
            assert!(Schedule::parse(expr).is_ok(), "expected '{expr}' to parse");
        }
    }

    #[test]
    fn test_schedule_keeps_expression_verbatim() {
        let schedule = Schedule::parse("0 0 * * *").unwrap();
        assert_eq!(schedule.as_str(), "0 0 * * *");
        assert_eq!(Schedule::parse("@hourly").unwrap().to_string(), "@hourly");
    }

    #[test]
    fn test_schedule_sunday_is_zero() {
        let schedule = Schedule::parse("0 12 * * 0").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.weekday(), Weekday::Sun);
        assert_eq!(next.hour(), 12);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_schedule_macros() {
        let daily = Schedule::parse("@daily").unwrap();
        let next = daily.upcoming(Utc).next().unwrap();
        assert_eq!((next.hour(), next.minute()), (0, 0));

        let weekly = Schedule::parse("@weekly").unwrap();
        assert_eq!(weekly.upcoming(Utc).next().unwrap().weekday(), Weekday::Sun);

        assert!(Schedule::parse("@every 5m").is_err());
    }

    #[test]
    fn test_schedule_rejects_invalid_expressions() {
        for expr in [
            "not-a-cron",
            "",
            "* * * *",
            "0 0 0 * * *",
            "60 * * * *",
            "0 24 * * *",
            "0 0 32 * *",
            "0 0 * 13 *",
            "0 0 * * 7",
        ] {
            let err = Schedule::parse(expr).unwrap_err();
            assert_eq!(err.field(), Some("schedule"), "'{expr}'");
            assert!(
                matches!(err, ConfigurationError::InvalidSchedule { .. }),
                "'{expr}' -> {err}"
            );
        }
    }

    #[test]
    fn test_schedule_rejects_time_zone_prefix() {
        let err = Schedule::parse("CRON_TZ=Europe/Berlin 0 0 * * *").unwrap_err();
        assert!(matches!(err, ConfigurationError::ScheduleTimeZonePrefix { .. }));
        assert!(Schedule::parse("TZ=UTC 0 0 * * *").is_err());
    }

    fn run_dates(expression: &str, count: usize) -> Vec<NaiveDate> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Schedule::parse(expression)
            .unwrap()
            .after(start)
            .take(count)
            .map(|run| run.date_naive())
            .collect()
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    #[test]
    fn test_schedule_restricted_days_match_either() {
        // 2026-01-01 is a Thursday
        assert_eq!(
            run_dates("0 0 13 * 5", 5),
            vec![date(1, 2), date(1, 9), date(1, 13), date(1, 16), date(1, 23)]
        );
        assert_eq!(
            run_dates("0 0 1,15 * MON", 4),
            vec![date(1, 5), date(1, 12), date(1, 15), date(1, 19)]
        );
    }

    #[test]
    fn test_schedule_wildcard_day_defers_to_other() {
        assert_eq!(
            run_dates("0 0 * * 5", 3),
            vec![date(1, 2), date(1, 9), date(1, 16)]
        );
        assert_eq!(run_dates("0 0 13 * *", 2), vec![date(1, 13), date(2, 13)]);
        // a stepped wildcard still counts as a wildcard, so both fields must match
        assert_eq!(
            run_dates("0 0 13 * */3", 3),
            vec![date(5, 13), date(6, 13), date(9, 13)]
        );
    }

    #[test]
    fn test_schedule_after_is_strict_and_distinct() {
        let start = Utc.with_ymd_and_hms(2026, 2, 13, 0, 0, 0).unwrap();
        let runs: Vec<_> = Schedule::parse("0 0 13 * 5")
            .unwrap()
            .after(start)
            .take(2)
            .collect();

        // Friday the 13th is due under both day fields but fires once
        assert_eq!(runs[0], Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap());
        assert_eq!(runs[1], Utc.with_ymd_and_hms(2026, 2, 27, 0, 0, 0).unwrap());

        let from_thursday = Utc.with_ymd_and_hms(2026, 3, 12, 0, 0, 0).unwrap();
        let runs: Vec<_> = Schedule::parse("0 0 13 * 5")
            .unwrap()
            .after(from_thursday)
            .take(2)
            .map(|run| run.date_naive())
            .collect();
        assert_eq!(runs, vec![date(3, 13), date(3, 20)]);
    }

    #[test]
    fn test_numeric_field() {
        let weekday = |field| numeric_field(field, WEEKDAYS, 0, 1);
        assert_eq!(weekday("*").unwrap(), "*");
        assert_eq!(weekday("0").unwrap(), "1");
        assert_eq!(weekday("1-5").unwrap(), "2-6");
        assert_eq!(weekday("0,3,6").unwrap(), "1,4,7");
        assert_eq!(weekday("1-5/2").unwrap(), "2-6/2");
        assert_eq!(weekday("*/2").unwrap(), "*/2");
        assert_eq!(weekday("MON-FRI").unwrap(), "2-6");
        assert_eq!(weekday("sun-5").unwrap(), "1-6");
        assert!(weekday("7").is_err());
        assert!(weekday("Funday").is_err());

        let month = |field| numeric_field(field, MONTHS, 1, 0);
        assert_eq!(month("Jan,jul").unwrap(), "1,7");
        assert_eq!(month("JAN-6").unwrap(), "1-6");
        assert!(month("0").is_err());
        assert!(month("13").is_err());
    }
}
