//! Relative time phrase resolution.
//!
//! Phrases like "today at 1pm" or "2 hours ago" are resolved to absolute
//! timestamps against the turn's arrival time. A phrase the parser cannot
//! pin down resolves to the arrival time with `ambiguous = true` so the
//! mention is flagged rather than dropped.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeResolution {
    pub taken_at: DateTime<Utc>,
    pub ambiguous: bool,
}

impl TimeResolution {
    fn confident(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            ambiguous: false,
        }
    }

    fn ambiguous(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            ambiguous: true,
        }
    }
}

fn ago_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,3})\s*(hours?|hrs?|minutes?|mins?)\s+ago\b")
            .expect("ago regex is valid")
    })
}

fn clock_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b")
            .expect("clock regex is valid")
    })
}

/// Resolve a time phrase against the turn arrival time.
///
/// `None` or an empty phrase means "now" - the arrival time, confidently.
pub(crate) fn resolve_phrase(phrase: Option<&str>, arrival: DateTime<Utc>) -> TimeResolution {
    let Some(phrase) = phrase else {
        return TimeResolution::confident(arrival);
    };
    let phrase = phrase.trim().to_lowercase();
    if phrase.is_empty() || phrase == "now" || phrase == "just now" {
        return TimeResolution::confident(arrival);
    }

    // "N hours/minutes ago"
    if let Some(caps) = ago_regex().captures(&phrase) {
        let amount: i64 = caps[1].parse().unwrap_or(0);
        let unit = caps[2].to_lowercase();
        let delta = if unit.starts_with("hour") || unit.starts_with("hr") {
            Duration::hours(amount)
        } else {
            Duration::minutes(amount)
        };
        return TimeResolution::confident(arrival - delta);
    }

    let day_offset = if phrase.contains("yesterday") || phrase.contains("last night") {
        Duration::days(1)
    } else {
        Duration::zero()
    };
    let base_day = arrival - day_offset;

    // Day-part words carry a conventional clock time.
    if let Some(time) = day_part_time(&phrase) {
        return TimeResolution::confident(at_time(base_day, time));
    }

    // Explicit clock time, possibly with am/pm.
    if let Some(caps) = clock_regex().captures(&phrase) {
        let hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let meridiem = caps.get(3).map(|m| m.as_str().to_lowercase());

        if hour <= 23 && minute <= 59 {
            return match meridiem.as_deref() {
                Some("am") => {
                    let h = if hour == 12 { 0 } else { hour };
                    TimeResolution::confident(at_time(base_day, (h, minute)))
                }
                Some("pm") => {
                    let h = if hour == 12 { 12 } else { (hour + 12).min(23) };
                    TimeResolution::confident(at_time(base_day, (h, minute)))
                }
                None if hour > 12 || caps.get(2).is_some() => {
                    // 24-hour form ("13:30", "at 14") is unambiguous.
                    TimeResolution::confident(at_time(base_day, (hour, minute)))
                }
                None => {
                    // Bare hour without am/pm: pick the most recent
                    // occurrence at or before arrival and flag it.
                    let morning = at_time(base_day, (hour % 12, minute));
                    let evening = at_time(base_day, ((hour % 12) + 12, minute));
                    let picked = if evening <= arrival {
                        evening
                    } else if morning <= arrival {
                        morning
                    } else {
                        evening
                    };
                    TimeResolution::ambiguous(picked)
                }
                // The regex only captures "am"/"pm"; any other value is
                // impossible, but `&str` can't be matched exhaustively.
                Some(_) => unreachable!("clock_regex only captures am/pm"),
            };
        }
    }

    // "today" / "yesterday" with no clock defaults to the arrival clock
    // time shifted by the day offset.
    if phrase.contains("today") {
        return TimeResolution::confident(arrival);
    }
    if phrase.contains("yesterday") {
        return TimeResolution::confident(arrival - Duration::days(1));
    }

    TimeResolution::ambiguous(arrival)
}

fn day_part_time(phrase: &str) -> Option<(u32, u32)> {
    if phrase.contains("last night") || phrase.contains("tonight") {
        return Some((21, 0));
    }
    if phrase.contains("morning") {
        return Some((8, 0));
    }
    if phrase.contains("noon") && !phrase.contains("afternoon") {
        return Some((12, 0));
    }
    if phrase.contains("afternoon") {
        return Some((15, 0));
    }
    if phrase.contains("evening") {
        return Some((19, 0));
    }
    if phrase.contains("midnight") {
        return Some((0, 0));
    }
    None
}

fn at_time(day: DateTime<Utc>, (hour, minute): (u32, u32)) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let naive = day.date_naive().and_time(time);
    Utc.from_utc_datetime(&naive)
}
