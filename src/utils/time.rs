use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

/// Parses a client-supplied instant into naive UTC.
///
/// Accepts RFC 3339, a bare `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC) and a
/// plain `YYYY-MM-DD`, which resolves to midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .unwrap()
    }

    #[test]
    fn parses_rfc3339_with_offset_into_utc() {
        assert_eq!(
            parse_timestamp("2024-03-01T09:00:00-03:00"),
            Some(at(2024, 3, 1, 12, 0, 0))
        );
    }

    #[test]
    fn parses_naive_datetime_as_utc() {
        assert_eq!(
            parse_timestamp("2024-03-01T12:30:00"),
            Some(at(2024, 3, 1, 12, 30, 0))
        );
        assert_eq!(
            parse_timestamp("2024-03-01 12:30:00"),
            Some(at(2024, 3, 1, 12, 30, 0))
        );
    }

    #[test]
    fn bare_date_means_midnight() {
        assert_eq!(parse_timestamp(" 2024-12-31 "), Some(at(2024, 12, 31, 0, 0, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("tomorrow"), None);
        assert_eq!(parse_timestamp("2024-02-30"), None);
    }

    #[test]
    fn iso_output_is_utc() {
        assert_eq!(to_iso(at(2024, 3, 1, 12, 0, 0)), "2024-03-01T12:00:00+00:00");
    }
}
