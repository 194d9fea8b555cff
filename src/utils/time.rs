use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt::Display;

/// Display format used in the alert and the JSON report.
pub const STAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

pub fn format_stamp<T: TimeZone>(dt: &DateTime<T>) -> String
where
    T::Offset: Display,
{
    dt.format(STAMP_FORMAT).to_string()
}

/// Parses an HTTP `Last-Modified` value.
///
/// Servers should send IMF-fixdate, which is RFC 2822 compatible; RFC 850 and
/// asctime forms are still accepted.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parses an ISO-8601 timestamp. Timestamps without an offset are local to `tz`.
pub fn parse_iso_in_zone(value: &str, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Jerusalem;

    #[test]
    fn test_parse_imf_fixdate() {
        let dt = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(dt.to_rfc3339(), "2015-10-21T07:28:00+00:00");
    }

    #[test]
    fn test_parse_rfc850_and_asctime() {
        let rfc850 = parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
        let asctime = parse_http_date("Sun Nov  6 08:49:37 1994").unwrap();
        assert_eq!(rfc850, asctime);
    }

    #[test]
    fn test_parse_http_date_rejects_garbage() {
        assert!(parse_http_date("").is_none());
        assert!(parse_http_date("last tuesday").is_none());
    }

    #[test]
    fn test_format_stamp_in_israel_time() {
        let utc = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(format_stamp(&utc.with_timezone(&Jerusalem)), "21.10.2015 10:28");
    }

    #[test]
    fn test_parse_iso_with_and_without_offset() {
        let with_offset = parse_iso_in_zone("2025-01-10T08:00:00+02:00", &Jerusalem).unwrap();
        let naive = parse_iso_in_zone("2025-01-10T08:00:00", &Jerusalem).unwrap();
        assert_eq!(with_offset, naive);
        assert_eq!(naive.offset().local_minus_utc(), 2 * 3600);
    }
}
