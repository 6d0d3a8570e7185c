//! userAccountControl flags and Windows FILETIME conversion

use chrono::{DateTime, Utc};
use std::fmt;

/// The `userAccountControl` bitfield of a user or computer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountControl(pub u32);

impl AccountControl {
    pub const ACCOUNTDISABLE: u32 = 0x2;
    pub const NORMAL_ACCOUNT: u32 = 0x200;
    pub const SERVER_TRUST_ACCOUNT: u32 = 0x2000;

    /// Enabled normal user account (512)
    pub fn enabled_user() -> Self {
        Self(Self::NORMAL_ACCOUNT)
    }

    /// Parse the decimal string AD returns; negative values are two's complement
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        value
            .parse::<u32>()
            .ok()
            .or_else(|| value.parse::<i32>().ok().map(|v| v as u32))
            .map(Self)
    }

    pub fn is_disabled(&self) -> bool {
        self.0 & Self::ACCOUNTDISABLE != 0
    }

    pub fn is_domain_controller(&self) -> bool {
        self.0 & Self::SERVER_TRUST_ACCOUNT != 0
    }

    pub fn disabled(self) -> Self {
        Self(self.0 | Self::ACCOUNTDISABLE)
    }
}

impl fmt::Display for AccountControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Windows FILETIME is 100-nanosecond intervals since January 1, 1601
// Unix epoch is January 1, 1970
// Difference is 11644473600 seconds
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert Windows FILETIME to a UTC timestamp
pub fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime <= 0 || filetime == i64::MAX {
        return None;
    }

    let seconds_since_1601 = filetime / TICKS_PER_SECOND;
    let unix_timestamp = seconds_since_1601 - FILETIME_UNIX_DIFF;

    if unix_timestamp < 0 {
        return None;
    }

    DateTime::from_timestamp(unix_timestamp, 0)
}

/// Convert a UTC timestamp to Windows FILETIME.
///
/// None when the instant falls outside the FILETIME range.
pub fn datetime_to_filetime(datetime: DateTime<Utc>) -> Option<i64> {
    datetime
        .timestamp()
        .checked_add(FILETIME_UNIX_DIFF)
        .filter(|seconds| *seconds >= 0)?
        .checked_mul(TICKS_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_filetime_known_value() {
        // 2024-01-01T00:00:00Z
        let ft = 133_485_408_000_000_000;
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(filetime_to_datetime(ft), Some(dt));
        assert_eq!(datetime_to_filetime(dt), Some(ft));
        // Sub-second ticks are truncated
        assert_eq!(filetime_to_datetime(ft + 9_999_999), Some(dt));
    }

    #[test]
    fn test_filetime_out_of_range() {
        let before_1601 = Utc.with_ymd_and_hms(1500, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(datetime_to_filetime(before_1601), None);
        let far_future = DateTime::<Utc>::MAX_UTC;
        assert_eq!(datetime_to_filetime(far_future), None);
    }

    #[test]
    fn test_filetime_never_values() {
        assert_eq!(filetime_to_datetime(0), None);
        assert_eq!(filetime_to_datetime(i64::MAX), None);
        assert_eq!(filetime_to_datetime(-1), None);
    }

    #[test]
    fn test_account_control_flags() {
        let uac = AccountControl::parse("512").unwrap();
        assert!(!uac.is_disabled());
        assert_eq!(uac.disabled(), AccountControl(514));
        assert!(AccountControl::parse("532480").unwrap().is_domain_controller());
        assert_eq!(AccountControl::parse("-2147483646"), Some(AccountControl(0x8000_0002)));
        assert_eq!(AccountControl::parse("abc"), None);
    }
}
