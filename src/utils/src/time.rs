use chrono::format::StrftimeItems;
use chrono::{DateTime, NaiveDateTime};
use std::time::{SystemTime, UNIX_EPOCH};

/// unix_millis_to_time converts milliseconds since the Unix epoch into a naive UTC
/// date time. Out of range values collapse to the epoch.
pub fn unix_millis_to_time(unix_millis: i64) -> NaiveDateTime {
    DateTime::from_timestamp_millis(unix_millis)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

/// system_time_to_millis returns the milliseconds between the Unix epoch and `t`, or 0 if
/// `t` lies before the epoch.
pub fn system_time_to_millis(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub fn time_format(dt: NaiveDateTime) -> String {
    let fmt = StrftimeItems::new("%Y-%m-%d %H:%M:%S");
    format!("{}", dt.format_with_items(fmt))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use crate::time::{system_time_to_millis, time_format, unix_millis_to_time};

    #[test]
    fn test_epoch_format() {
        assert_eq!(time_format(unix_millis_to_time(0)), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_system_time_millis() {
        let t = UNIX_EPOCH + Duration::from_millis(1_500);
        assert_eq!(system_time_to_millis(t), 1_500);
        assert_eq!(time_format(unix_millis_to_time(86_400_000)), "1970-01-02 00:00:00");
    }
}
