//! The temporal function family: `date`, `time`, `datetime`, `localdatetime`,
//! `duration`, and their `.between`/component accessors, plus date/time
//! subtraction (`date('b') - date('a')` -> `Duration`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::model::{Duration, PropertyMap, Value};
use crate::{Error, Result};

pub fn call(name: &str, args: &[Value]) -> Result<Option<Value>> {
    let result = match name {
        "date" => Some(date(args)?),
        "time" => Some(time(args)?),
        "datetime" => Some(datetime(args)?),
        "localdatetime" => Some(localdatetime(args)?),
        "localtime" => Some(localtime(args)?),
        "timestamp" => Some(timestamp(args)?),
        "duration" => Some(duration(args)?),
        "duration.between" => Some(duration_between(args)?),
        "duration.inseconds" => Some(duration_in_seconds(args)?),
        "duration.indays" => Some(duration_in_days(args)?),
        "duration.inmonths" => Some(duration_in_months(args)?),
        _ => None,
    };
    Ok(result)
}

/// `date('b') - date('a')`, `datetime - datetime`, etc. `None` if the pair
/// isn't a recognized temporal subtraction.
pub fn subtract(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Date(a), Value::Date(b)) => {
            let days = (*a - *b).num_days();
            Some(Value::Duration(Duration::from_days(days)))
        }
        (Value::DateTime(a), Value::DateTime(b)) => {
            let secs = (*a - *b).num_seconds();
            Some(Value::Duration(Duration::from_seconds(secs)))
        }
        (Value::LocalDateTime(a), Value::LocalDateTime(b)) => {
            let secs = (*a - *b).num_seconds();
            Some(Value::Duration(Duration::from_seconds(secs)))
        }
        (Value::Time(a), Value::Time(b)) => {
            let secs = (*a - *b).num_seconds();
            Some(Value::Duration(Duration::from_seconds(secs)))
        }
        _ => None,
    }
}

fn date(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::Date(Utc::now().date_naive())),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| Error::ArgumentError(format!("invalid date string: {s}"))),
        Some(Value::Map(m)) => date_from_map(m),
        Some(other) => Err(Error::TypeError { expected: "String or Map".into(), got: other.type_name().into() }),
    }
}

fn date_from_map(m: &PropertyMap) -> Result<Value> {
    let year = field_i32(m, "year")?.ok_or_else(|| Error::ArgumentError("date() map requires 'year'".into()))?;
    let month = field_i32(m, "month")?.unwrap_or(1);
    let day = field_i32(m, "day")?.unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .map(Value::Date)
        .ok_or_else(|| Error::ArgumentError("invalid year/month/day combination".into()))
}

fn time(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::Time(Utc::now().time())),
        Some(Value::String(s)) => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Value::Time)
            .map_err(|_| Error::ArgumentError(format!("invalid time string: {s}"))),
        Some(other) => Err(Error::TypeError { expected: "String".into(), got: other.type_name().into() }),
    }
}

/// `localtime` is `time` without a timezone offset; both share the same
/// wall-clock `Value::Time` representation here.
fn localtime(args: &[Value]) -> Result<Value> {
    time(args)
}

/// Milliseconds since the Unix epoch, current instant only (no parsing form).
fn timestamp(_args: &[Value]) -> Result<Value> {
    Ok(Value::Int(Utc::now().timestamp_millis()))
}

fn datetime(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::DateTime(Utc::now())),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
            .map_err(|_| Error::ArgumentError(format!("invalid datetime string: {s}"))),
        Some(other) => Err(Error::TypeError { expected: "String".into(), got: other.type_name().into() }),
    }
}

fn localdatetime(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::LocalDateTime(Utc::now().naive_utc())),
        Some(Value::String(s)) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(Value::LocalDateTime)
            .map_err(|_| Error::ArgumentError(format!("invalid local datetime string: {s}"))),
        Some(other) => Err(Error::TypeError { expected: "String".into(), got: other.type_name().into() }),
    }
}

/// Parse an ISO-8601 duration string (`P1Y2M3DT4H5M6S`) preserving each
/// component instead of normalizing into a single unit.
fn duration(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::String(s)) => parse_iso8601_duration(s).map(Value::Duration),
        Some(Value::Map(m)) => duration_from_map(m),
        other => Err(Error::TypeError {
            expected: "String or Map".into(),
            got: other.map(|v| v.type_name()).unwrap_or("nothing").into(),
        }),
    }
}

fn duration_from_map(m: &PropertyMap) -> Result<Value> {
    Ok(Value::Duration(Duration {
        years: field_i64(m, "years")?.unwrap_or(0),
        months: field_i64(m, "months")?.unwrap_or(0),
        days: field_i64(m, "days")?.unwrap_or(0),
        hours: field_i64(m, "hours")?.unwrap_or(0),
        minutes: field_i64(m, "minutes")?.unwrap_or(0),
        seconds: field_i64(m, "seconds")?.unwrap_or(0),
        nanos: 0,
    }))
}

fn parse_iso8601_duration(s: &str) -> Result<Duration> {
    let err = || Error::ArgumentError(format!("invalid ISO-8601 duration: {s}"));
    let s = s.strip_prefix('P').ok_or_else(err)?;
    let (date_part, time_part) = match s.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (s, None),
    };

    let mut dur = Duration::ZERO;
    let mut num = String::new();
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let n: i64 = num.parse().map_err(|_| err())?;
        num.clear();
        match c {
            'Y' => dur.years = n,
            'M' => dur.months = n,
            'D' => dur.days = n,
            _ => return Err(err()),
        }
    }

    if let Some(time_part) = time_part {
        for c in time_part.chars() {
            if c.is_ascii_digit() || c == '.' {
                num.push(c);
                continue;
            }
            match c {
                'H' => {
                    dur.hours = num.parse().map_err(|_| err())?;
                    num.clear();
                }
                'M' => {
                    dur.minutes = num.parse().map_err(|_| err())?;
                    num.clear();
                }
                'S' => {
                    let secs: f64 = num.parse().map_err(|_| err())?;
                    dur.seconds = secs.trunc() as i64;
                    dur.nanos = (secs.fract() * 1_000_000_000.0).round() as i32;
                    num.clear();
                }
                _ => return Err(err()),
            }
        }
    }

    Ok(dur)
}

fn duration_between(args: &[Value]) -> Result<Value> {
    let (a, b) = (args.first(), args.get(1));
    match (a, b) {
        (Some(a), Some(b)) => subtract(b, a).ok_or_else(|| Error::TypeError {
            expected: "two comparable temporal values".into(),
            got: format!("{}, {}", a.type_name(), b.type_name()),
        }),
        _ => Err(Error::ArgumentError("duration.between requires two temporal arguments".into())),
    }
}

fn duration_in_seconds(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Duration(d)) => Ok(Value::Int(d.to_seconds_approx())),
        other => Err(Error::TypeError { expected: "Duration".into(), got: other.map(|v| v.type_name()).unwrap_or("nothing").into() }),
    }
}

fn duration_in_days(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Duration(d)) => Ok(Value::Int(d.to_seconds_approx() / 86_400)),
        other => Err(Error::TypeError { expected: "Duration".into(), got: other.map(|v| v.type_name()).unwrap_or("nothing").into() }),
    }
}

fn duration_in_months(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Duration(d)) => Ok(Value::Int(d.total_months())),
        other => Err(Error::TypeError { expected: "Duration".into(), got: other.map(|v| v.type_name()).unwrap_or("nothing").into() }),
    }
}

fn field_i32(m: &PropertyMap, key: &str) -> Result<Option<i32>> {
    match m.get(key) {
        Some(v) => v.as_int().map(|i| Some(i as i32)).ok_or_else(|| Error::TypeError { expected: "Integer".into(), got: v.type_name().into() }),
        None => Ok(None),
    }
}

fn field_i64(m: &PropertyMap, key: &str) -> Result<Option<i64>> {
    match m.get(key) {
        Some(v) => v.as_int().map(Some).ok_or_else(|| Error::TypeError { expected: "Integer".into(), got: v.type_name().into() }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_subtraction_yields_duration() {
        let a = date(&[Value::String("2025-01-01".into())]).unwrap();
        let b = date(&[Value::String("2025-01-10".into())]).unwrap();
        let diff = subtract(&b, &a).unwrap();
        assert_eq!(diff, Value::Duration(Duration::from_days(9)));
    }

    #[test]
    fn test_localtime_parses_same_as_time() {
        let a = localtime(&[Value::String("14:30:00".into())]).unwrap();
        let b = time(&[Value::String("14:30:00".into())]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_timestamp_is_positive_milliseconds() {
        match timestamp(&[]).unwrap() {
            Value::Int(ms) => assert!(ms > 0),
            other => panic!("expected Int, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_iso8601_duration() {
        let d = parse_iso8601_duration("P1Y2M3DT4H5M6S").unwrap();
        assert_eq!(d.years, 1);
        assert_eq!(d.months, 2);
        assert_eq!(d.days, 3);
        assert_eq!(d.hours, 4);
        assert_eq!(d.minutes, 5);
        assert_eq!(d.seconds, 6);
    }
}
