//! Timestamp repair for raw monitoring records
//!
//! The state exports encode "end of day" as hour `24:00:00`, which no
//! datetime library accepts: it means midnight of the *next* calendar day.
//! Some networks also drop the seconds component ("13:00"). This resolver
//! repairs both encodings and composes one unambiguous timestamp per record.
//!
//! An unparseable date or hour yields a null timestamp; the record is
//! excluded from aggregation and counted, never raised as an error that
//! would abort the batch.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Literal end-of-day hour meaning midnight of the following day
const END_OF_DAY: &str = "24:00:00";

/// Date formats seen across the state networks, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Counters for a resolution batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Records seen
    pub total: usize,
    /// Records that produced a timestamp
    pub resolved: usize,
    /// Records whose hour was the 24:00:00 end-of-day encoding
    pub rolled_over: usize,
    /// Records with an unparseable date or hour
    pub unparseable: usize,
}

impl ResolverStats {
    /// One-line batch summary for logging
    pub fn summary(&self) -> String {
        format!(
            "Timestamp resolution: {} records | {} resolved | {} end-of-day rollovers | {} unparseable",
            self.total, self.resolved, self.rolled_over, self.unparseable
        )
    }
}

/// Stateful resolver accumulating diagnostics across a batch
#[derive(Debug)]
pub struct TemporalResolver {
    hour_shape: Regex,
    stats: ResolverStats,
}

impl Default for TemporalResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TemporalResolver {
    pub fn new() -> Self {
        Self {
            // H:MM or HH:MM with optional :SS
            hour_shape: Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").unwrap(),
            stats: ResolverStats::default(),
        }
    }

    /// Resolve a raw date and hour pair into a timestamp
    ///
    /// `24:00:00` becomes `00:00:00` of the next calendar day; hours without
    /// a seconds component gain `:00`. Returns `None` when either field is
    /// unparseable.
    pub fn resolve(&mut self, date_raw: &str, hour_raw: &str) -> Option<NaiveDateTime> {
        self.stats.total += 1;

        let resolved = self.resolve_inner(date_raw, hour_raw);
        match resolved {
            Some(_) => self.stats.resolved += 1,
            None => self.stats.unparseable += 1,
        }
        resolved
    }

    fn resolve_inner(&mut self, date_raw: &str, hour_raw: &str) -> Option<NaiveDateTime> {
        let date = parse_date(date_raw)?;
        let hour = self.normalize_hour(hour_raw)?;

        let (date, hour) = if hour == END_OF_DAY {
            self.stats.rolled_over += 1;
            (date + Duration::days(1), "00:00:00".to_string())
        } else {
            (date, hour)
        };

        let time = NaiveTime::parse_from_str(&hour, "%H:%M:%S").ok()?;
        Some(date.and_time(time))
    }

    /// Normalize an hour string to H:MM:SS shape, appending missing seconds
    fn normalize_hour(&self, hour_raw: &str) -> Option<String> {
        let captures = self.hour_shape.captures(hour_raw.trim())?;
        let hours = captures.get(1)?.as_str();
        let minutes = captures.get(2)?.as_str();
        let seconds = captures.get(3).map(|m| m.as_str()).unwrap_or("00");
        Some(format!("{}:{}:{}", hours, minutes, seconds))
    }

    /// Diagnostics accumulated so far
    pub fn stats(&self) -> ResolverStats {
        self.stats
    }
}

/// Parse a raw date field against the known formats
pub fn parse_date(date_raw: &str) -> Option<NaiveDate> {
    let trimmed = date_raw.trim();
    // Exports that carry a full timestamp in the date column
    let date_part = trimmed.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_plain_hour_kept() {
        let mut resolver = TemporalResolver::new();
        assert_eq!(
            resolver.resolve("2021-06-10", "13:00:00"),
            Some(ts(2021, 6, 10, 13))
        );
        assert_eq!(resolver.stats().rolled_over, 0);
    }

    #[test]
    fn test_end_of_day_rolls_to_next_date() {
        let mut resolver = TemporalResolver::new();
        assert_eq!(
            resolver.resolve("2021-06-10", "24:00:00"),
            Some(ts(2021, 6, 11, 0))
        );
        assert_eq!(resolver.stats().rolled_over, 1);
    }

    #[test]
    fn test_end_of_day_crosses_month_and_year() {
        let mut resolver = TemporalResolver::new();
        assert_eq!(
            resolver.resolve("2020-12-31", "24:00:00"),
            Some(ts(2021, 1, 1, 0))
        );
    }

    #[test]
    fn test_rollover_equivalence() {
        // resolve(date, "00:00:00") == resolve(previous day, "24:00:00")
        let mut resolver = TemporalResolver::new();
        let direct = resolver.resolve("2019-03-01", "00:00:00");
        let rolled = resolver.resolve("2019-02-28", "24:00:00");
        assert!(direct.is_some());
        assert_eq!(direct, rolled);
    }

    #[test]
    fn test_missing_seconds_appended() {
        let mut resolver = TemporalResolver::new();
        assert_eq!(
            resolver.resolve("2021-06-10", "7:30"),
            Some(
                NaiveDate::from_ymd_opt(2021, 6, 10)
                    .unwrap()
                    .and_hms_opt(7, 30, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_alternate_date_formats() {
        let mut resolver = TemporalResolver::new();
        assert_eq!(
            resolver.resolve("10/06/2021", "01:00:00"),
            Some(ts(2021, 6, 10, 1))
        );
        assert_eq!(
            resolver.resolve("2021/06/10", "01:00:00"),
            Some(ts(2021, 6, 10, 1))
        );
    }

    #[test]
    fn test_date_with_trailing_time_component() {
        let mut resolver = TemporalResolver::new();
        assert_eq!(
            resolver.resolve("2021-06-10 00:00:00", "05:00:00"),
            Some(ts(2021, 6, 10, 5))
        );
    }

    #[test]
    fn test_unparseable_yields_none_and_counts() {
        let mut resolver = TemporalResolver::new();
        assert_eq!(resolver.resolve("junho", "10:00:00"), None);
        assert_eq!(resolver.resolve("2021-06-10", "meia-noite"), None);
        assert_eq!(resolver.resolve("", ""), None);

        let stats = resolver.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.resolved, 0);
        assert_eq!(stats.unparseable, 3);
    }

    #[test]
    fn test_invalid_calendar_date_rejected() {
        let mut resolver = TemporalResolver::new();
        assert_eq!(resolver.resolve("2021-02-30", "10:00:00"), None);
    }
}
