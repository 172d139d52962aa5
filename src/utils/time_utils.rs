use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub type AppInstant = std::time::Instant;

pub struct TimeUtils;

impl TimeUtils {
    pub const MS_IN_S: i64 = 1000;
    pub const MS_IN_MIN: i64 = Self::MS_IN_S * 60;
    pub const MS_IN_3_MIN: i64 = Self::MS_IN_S * 60 * 3;
    pub const MS_IN_5_MIN: i64 = Self::MS_IN_S * 60 * 5;
    pub const MS_IN_15_MIN: i64 = Self::MS_IN_S * 60 * 15;
    pub const MS_IN_30_MIN: i64 = Self::MS_IN_S * 60 * 30;
    pub const MS_IN_H: i64 = Self::MS_IN_MIN * 60;
    pub const MS_IN_2_H: i64 = Self::MS_IN_MIN * 60 * 2;
    pub const MS_IN_4_H: i64 = Self::MS_IN_MIN * 60 * 4;
    pub const MS_IN_6_H: i64 = Self::MS_IN_MIN * 60 * 6;
    pub const MS_IN_8_H: i64 = Self::MS_IN_MIN * 60 * 8;
    pub const MS_IN_12_H: i64 = Self::MS_IN_MIN * 60 * 12;
    pub const MS_IN_D: i64 = Self::MS_IN_H * 24;
    pub const MS_IN_3_D: i64 = Self::MS_IN_H * 24 * 3;
    pub const MS_IN_W: i64 = Self::MS_IN_D * 7;
    pub const MS_IN_1_M: i64 = Self::MS_IN_D * 30;
    pub const STANDARD_TIME_FORMAT: &str = "%Y-%m-%d";
    pub const FULL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

/// Parse `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` as a UTC instant.
pub fn parse_utc(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, TimeUtils::FULL_TIME_FORMAT) {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, TimeUtils::STANDARD_TIME_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub fn epoch_ms_to_utc(epoch_ms: i64) -> String {
    // Used for display purposes
    match DateTime::from_timestamp_millis(epoch_ms) {
        Some(dt) => dt.format(TimeUtils::STANDARD_TIME_FORMAT).to_string(),
        None => format!("{}ms", epoch_ms),
    }
}

pub fn now_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_formats_as_utc() {
        let day = parse_utc("2017-08-01").unwrap();
        assert_eq!(day.timestamp_millis(), 1_501_545_600_000);

        let with_time = parse_utc("2017-08-01 12:00:00").unwrap();
        assert_eq!(
            with_time.timestamp_millis() - day.timestamp_millis(),
            12 * TimeUtils::MS_IN_H
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_utc("01/08/2017").is_none());
        assert!(parse_utc("").is_none());
    }

    #[test]
    fn formats_epoch_ms_as_date() {
        assert_eq!(epoch_ms_to_utc(1_501_545_600_000), "2017-08-01");
    }
}
