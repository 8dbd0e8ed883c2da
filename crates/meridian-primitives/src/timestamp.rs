use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

///
/// Timestamp
///
/// UTC instant with second precision, as written to element rows and
/// changeset bookkeeping columns. Displays in the API's
/// `YYYY-MM-DD HH:MM:SS UTC` form.
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current wall-clock time, truncated to seconds.
    #[must_use]
    pub fn now() -> Self {
        Self::from_unix(Utc::now().timestamp())
    }

    /// Instant from a unix epoch second count.
    #[must_use]
    pub fn from_unix(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }

    /// Unix epoch seconds.
    #[must_use]
    pub fn unix(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted forward (or backward, for negative input).
    #[must_use]
    pub fn plus_seconds(&self, secs: i64) -> Self {
        Self::from_unix(self.unix() + secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_api_format() {
        let ts = Timestamp::from_unix(1_234_567_890);
        assert_eq!(ts.to_string(), "2009-02-13 23:31:30 UTC");
    }

    #[test]
    fn plus_seconds_shifts_and_orders() {
        let base = Timestamp::from_unix(1_000);
        let later = base.plus_seconds(3600);

        assert!(later > base);
        assert_eq!(later.unix(), 4_600);
    }
}
