use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};

/// Format used for `getTime` in every table we write.
pub const OUTPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Pseudo-format selecting chrono's RFC 3339 parser.
pub const RFC3339: &str = "rfc3339";

/// Pseudo-format for epoch milliseconds.
pub const UNIX_MS: &str = "unix_ms";

pub fn default_timestamp_formats() -> Vec<String> {
    [
        RFC3339,
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d",
        UNIX_MS,
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

/// Tries each format in order. Offsets are parsed but dropped: the wall
/// clock time as written is what gets bucketed.
pub fn parse_timestamp(value: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    formats.iter().find_map(|format| parse_with_format(value, format))
}

fn parse_with_format(value: &str, format: &str) -> Option<NaiveDateTime> {
    if format == UNIX_MS {
        // Short digit runs are more likely junk than 1970 timestamps.
        if value.len() < 10 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        return value
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc());
    }
    if format == RFC3339 {
        return DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_local());
    }
    if format.contains("%z") || format.contains("%:z") || format.contains("%#z") {
        return DateTime::parse_from_str(value, format).ok().map(|dt| dt.naive_local());
    }
    NaiveDateTime::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn floor_to_hour(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    dt.with_minute(0)?.with_second(0)?.with_nanosecond(0)
}

pub fn format_time(dt: &NaiveDateTime) -> String {
    dt.format(OUTPUT_TIME_FORMAT).to_string()
}

/// Empty string for absent values, shortest round-trip form otherwise.
pub fn format_optional_float(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_common_layouts() {
        let formats = default_timestamp_formats();
        assert_eq!(parse_timestamp("2024-05-01T13:45:10", &formats), Some(at(2024, 5, 1, 13, 45, 10)));
        assert_eq!(parse_timestamp("2024-05-01 13:45:10.250", &formats).map(|t| t.minute()), Some(45));
        assert_eq!(parse_timestamp("2024-05-01T13:45:10+07:00", &formats), Some(at(2024, 5, 1, 13, 45, 10)));
        assert_eq!(parse_timestamp("2024-05-01T13:45:10.000+0000", &formats), Some(at(2024, 5, 1, 13, 45, 10)));
        assert_eq!(parse_timestamp("2024-05-01 13:45", &formats), Some(at(2024, 5, 1, 13, 45, 0)));
        assert_eq!(parse_timestamp("01/05/2024 13:45:10", &formats), Some(at(2024, 5, 1, 13, 45, 10)));
        assert_eq!(parse_timestamp("2024-05-01", &formats), Some(at(2024, 5, 1, 0, 0, 0)));
        assert_eq!(parse_timestamp("1714571110000", &formats), Some(at(2024, 5, 1, 13, 45, 10)));
    }

    #[test]
    fn test_slash_dates_are_day_first() {
        let formats = default_timestamp_formats();
        assert_eq!(parse_timestamp("13/05/2024 08:15:00", &formats), Some(at(2024, 5, 13, 8, 15, 0)));
        assert_eq!(parse_timestamp("05/13/2024 08:15:00", &formats), None);
    }

    #[test]
    fn test_parse_rejects_junk() {
        let formats = default_timestamp_formats();
        assert_eq!(parse_timestamp("", &formats), None);
        assert_eq!(parse_timestamp("yesterday", &formats), None);
        assert_eq!(parse_timestamp("2024", &formats), None);
        assert_eq!(parse_timestamp("2024-13-45 99:00:00", &formats), None);
    }

    #[test]
    fn test_floor_to_hour() {
        let floored = floor_to_hour(at(2024, 5, 1, 13, 59, 59)).unwrap();
        assert_eq!(floored, at(2024, 5, 1, 13, 0, 0));
        assert_eq!(floor_to_hour(floored), Some(floored));
    }

    #[test]
    fn test_format_optional_float() {
        assert_eq!(format_optional_float(None), "");
        assert_eq!(format_optional_float(Some(50.0)), "50");
        assert_eq!(format_optional_float(Some(12.25)), "12.25");
    }
}
