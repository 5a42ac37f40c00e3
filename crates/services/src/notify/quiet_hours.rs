use chrono::{DateTime, Duration, NaiveTime, Utc};
use kindred_db::models::QuietHoursPrefs;

/// A daily `[start, end)` window in the user's local time. Windows with
/// `start > end` wrap midnight; `start == end` is never quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub utc_offset: Duration,
}

impl QuietHours {
    /// `None` when disabled or the stored times do not parse as `HH:MM`.
    pub fn from_prefs(prefs: &QuietHoursPrefs) -> Option<Self> {
        if !prefs.enabled {
            return None;
        }
        Some(Self {
            start: parse_hhmm(&prefs.start)?,
            end: parse_hhmm(&prefs.end)?,
            utc_offset: Duration::minutes(prefs.utc_offset_minutes as i64),
        })
    }

    pub fn is_quiet(&self, now: DateTime<Utc>) -> bool {
        let t = (now + self.utc_offset).time();
        if self.start == self.end {
            false
        } else if self.start < self.end {
            t >= self.start && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }

    /// The UTC instant at which the current quiet window closes, if `now` is inside one.
    pub fn window_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.is_quiet(now) {
            return None;
        }
        let local = (now + self.utc_offset).naive_utc();
        let mut end = local.date().and_time(self.end);
        if local.time() >= self.end {
            end += Duration::days(1);
        }
        Some((end - self.utc_offset).and_utc())
    }
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}
