//! 交易日历
//!
//! 判断给定时刻是否处于 A 股交易时段（北京时间）：
//! - 周末休市
//! - 上午 09:15 - 11:30（含集合竞价）
//! - 下午 12:59 - 15:00
//!
//! 区间两端均包含，按分钟粒度比较。节假日不在判断范围内。

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::{Asia::Shanghai, Tz};

/// 交易时段，HHMM 形式的闭区间
const SESSIONS: [(u32, u32); 2] = [(915, 1130), (1259, 1500)];

/// 获取当前北京时间
pub fn beijing_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&Shanghai)
}

/// 给定时刻是否处于交易时段，任意时区的时间都会先换算为北京时间
pub fn is_in_session<T: TimeZone>(now: &DateTime<T>) -> bool {
    let local = now.with_timezone(&Shanghai);
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let hhmm = local.hour() * 100 + local.minute();
    SESSIONS
        .iter()
        .any(|&(start, end)| (start..=end).contains(&hhmm))
}

/// 当前是否处于交易时段
pub fn is_in_session_now() -> bool {
    is_in_session(&Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-06 为周六，2024-01-08 为周一
    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        Shanghai.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_weekend_closed() {
        assert!(!is_in_session(&at(6, 10, 0)));
        assert!(!is_in_session(&at(7, 14, 0)));
    }

    #[test]
    fn test_morning_session_bounds() {
        assert!(is_in_session(&at(8, 9, 15)));
        assert!(!is_in_session(&at(8, 9, 14)));
        assert!(is_in_session(&at(8, 11, 30)));
        assert!(!is_in_session(&at(8, 11, 31)));
    }

    #[test]
    fn test_lunch_break_and_afternoon() {
        assert!(!is_in_session(&at(8, 12, 0)));
        assert!(!is_in_session(&at(8, 12, 58)));
        assert!(is_in_session(&at(8, 12, 59)));
        assert!(is_in_session(&at(8, 14, 59)));
        assert!(is_in_session(&at(8, 15, 0)));
        assert!(!is_in_session(&at(8, 15, 1)));
    }

    #[test]
    fn test_converts_from_utc() {
        // 周一 01:30 UTC = 09:30 北京时间
        let utc = Utc.with_ymd_and_hms(2024, 1, 8, 1, 30, 0).unwrap();
        assert!(is_in_session(&utc));
        // 周五 23:00 UTC = 周六 07:00 北京时间
        let utc = Utc.with_ymd_and_hms(2024, 1, 5, 23, 0, 0).unwrap();
        assert!(!is_in_session(&utc));
    }

    #[test]
    fn test_beijing_now_offset() {
        assert!(beijing_now().to_rfc3339().contains("+08:00"));
    }
}
