//! Fixed UTC+9 calendar helpers.
//!
//! The backend labels every sample in Korea Standard Time without an offset,
//! so all parsing and display here pins that offset instead of using the
//! caller's local timezone.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

use crate::model::XKey;

const KST_OFFSET_SECS: i32 = 9 * 3600;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Parse an x-axis label into epoch seconds.
///
/// Daily buckets are midnight UTC+9; hourly and raw labels are local
/// date-times in the same offset. Empty or malformed input yields `None`.
pub fn parse_x_to_epoch(val: &str, x_key: XKey) -> Option<f64> {
    let val = val.trim();
    if val.is_empty() {
        return None;
    }

    let naive = match x_key {
        XKey::Day => NaiveDate::parse_from_str(val, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?,
        XKey::Hour | XKey::Ts => {
            let normalized = val.replacen(' ', "T", 1);
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())?
        }
    };

    let local = kst().from_local_datetime(&naive).single()?;
    Some(local.timestamp() as f64 + f64::from(local.timestamp_subsec_millis()) / 1000.0)
}

/// Today's date on the UTC+9 calendar
pub fn today_kst(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&kst()).date_naive()
}

/// "YYYY-MM-DD HH:MM:SS" in UTC+9, used for the last-updated stamp
pub fn format_stamp(now: DateTime<Utc>) -> String {
    now.with_timezone(&kst())
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn epoch_to_kst(epoch: f64) -> Option<DateTime<FixedOffset>> {
    if !epoch.is_finite() {
        return None;
    }
    let secs = epoch.floor() as i64;
    let nanos = ((epoch - epoch.floor()) * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.with_timezone(&kst()))
}

/// Tooltip timestamp for a sample
pub fn format_epoch(epoch: f64) -> String {
    epoch_to_kst(epoch)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// X-axis tick label: MM-DD:HH for hourly buckets, MM-DD otherwise
pub fn axis_label(epoch: f64, x_key: XKey) -> String {
    let Some(dt) = epoch_to_kst(epoch) else {
        return String::new();
    };
    match x_key {
        XKey::Hour => dt.format("%m-%d:%H").to_string(),
        XKey::Day | XKey::Ts => dt.format("%m-%d").to_string(),
    }
}
