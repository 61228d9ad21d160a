//! Time utilities: timezone-aware month/year lookups and year key checks.

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid year key '{0}': expected four digits")]
pub struct YearKeyError(pub String);

fn year_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{4}$").expect("static regex"))
}

/// Year keys are exactly four ASCII digits ("2025").
pub fn validate_year_key(key: &str) -> Result<(), YearKeyError> {
    if year_key_re().is_match(key) {
        Ok(())
    } else {
        Err(YearKeyError(key.to_string()))
    }
}

/// Parse an IANA timezone like "Asia/Shanghai".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Month index (0 = January) of `now` in `tz`.
pub fn month_index_at(now: DateTime<Utc>, tz: Tz) -> usize {
    now.with_timezone(&tz).month0() as usize
}

/// Month index (0 = January) of the wall clock in `tz`.
pub fn current_month(tz: Tz) -> usize {
    month_index_at(Utc::now(), tz)
}

/// Year key of the wall clock in `tz`.
pub fn current_year_key(tz: Tz) -> String {
    format!("{:04}", Utc::now().with_timezone(&tz).year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn year_keys() {
        assert!(validate_year_key("2025").is_ok());
        assert!(validate_year_key("25").is_err());
        assert!(validate_year_key("2025a").is_err());
        assert!(validate_year_key("../x").is_err());
        // Non-ASCII digits would sort and name files inconsistently.
        assert!(validate_year_key("٢٠٢٥").is_err());
        assert!(validate_year_key("２０２５").is_err());
    }

    #[test]
    fn month_follows_timezone() {
        // 2025-01-31 20:00 UTC is already February 1st in Shanghai (UTC+8).
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 20, 0, 0).unwrap();
        assert_eq!(month_index_at(now, chrono_tz::UTC), 0);
        assert_eq!(month_index_at(now, parse_timezone("Asia/Shanghai").unwrap()), 1);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
