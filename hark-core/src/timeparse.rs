//! Natural-language time phrases
//!
//! Resolves phrases such as "at 6 pm", "tomorrow 8 am", "in 20 minutes" or
//! "on 25 december 7 pm" to an absolute local timestamp. Ambiguous phrases
//! resolve into the future: a clock time already past today means tomorrow,
//! a calendar date already past this year means next year.

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday,
};
use regex::{Captures, Regex};

use crate::error::Result;

/// Turns a free-text time phrase into an absolute timestamp
pub trait TimeParser: Send + Sync {
    /// Resolve `phrase` relative to `now`; None when the phrase is not understood
    fn parse(&self, phrase: &str, now: DateTime<Local>) -> Option<DateTime<Local>>;
}

/// Words that may remain after all components were extracted
const FILLER_WORDS: [&str; 9] = ["at", "on", "by", "in", "the", "of", "this", "around", "coming"];

const NUMBER_WORDS: [(&str, i64); 17] = [
    ("a", 1),
    ("an", 1),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("fifteen", 15),
    ("twenty", 20),
    ("thirty", 30),
];

/// Date part of a phrase before it is anchored to "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatePart {
    /// Days from today; the clock time defaults to the current time
    Offset(i64),
    Weekday { day: Weekday, next: bool },
    Calendar { month: u32, day: u32 },
}

/// Rule-based parser covering the phrases people say to set reminders
pub struct PhraseTimeParser {
    duration: Regex,
    half_hour: Regex,
    date_day_month: Regex,
    date_month_day: Regex,
    day_word: Regex,
    next_week: Regex,
    weekday: Regex,
    clock_12h: Regex,
    clock_24h: Regex,
    oclock: Regex,
    named_time: Regex,
    bare_hour: Regex,
    period: Regex,
}

const MONTHS: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

impl PhraseTimeParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            duration: Regex::new(
                r"^(?:in|after)\s+(\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|fifteen|twenty|thirty)\s+(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?)$",
            )?,
            half_hour: Regex::new(r"^(?:in|after)\s+half\s+an?\s+hour$")?,
            date_day_month: Regex::new(&format!(
                r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTHS}\b"
            ))?,
            date_month_day: Regex::new(&format!(r"\b{MONTHS}\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"))?,
            day_word: Regex::new(r"\b(day after tomorrow|tomorrow|today|tonight)\b")?,
            next_week: Regex::new(r"\bnext\s+week\b")?,
            weekday: Regex::new(
                r"\b(next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            )?,
            clock_12h: Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b")?,
            clock_24h: Regex::new(r"\b(\d{1,2}):(\d{2})\b")?,
            oclock: Regex::new(r"\b(\d{1,2})\s*o\s?'?\s?clock\b")?,
            named_time: Regex::new(r"\b(noon|midday|midnight)\b")?,
            bare_hour: Regex::new(r"\b(?:at|by)\s+(\d{1,2})\b")?,
            period: Regex::new(r"\b(?:in\s+the\s+)?(morning|afternoon|evening|night)\b")?,
        })
    }

    fn parse_duration(&self, text: &str) -> Option<Duration> {
        if self.half_hour.is_match(text) {
            return Some(Duration::minutes(30));
        }

        let caps = self.duration.captures(text)?;
        let amount = parse_amount(&caps[1])?;
        let unit = &caps[2];
        // absurd amounts are rejected rather than overflowing
        if unit.starts_with("sec") {
            Duration::try_seconds(amount)
        } else if unit.starts_with("min") {
            Duration::try_minutes(amount)
        } else if unit.starts_with("h") {
            Duration::try_hours(amount)
        } else if unit.starts_with("day") {
            Duration::try_days(amount)
        } else {
            Duration::try_weeks(amount)
        }
    }

    /// Extract the date component, blanking the matched span
    fn take_date(&self, text: &mut String) -> Option<(DatePart, Option<NaiveTime>)> {
        if let Some((caps_day, caps_month)) = take(&self.date_day_month, text, |c| {
            (c[1].to_string(), c[2].to_string())
        }) {
            let day = caps_day.parse().ok()?;
            let month = month_number(&caps_month)?;
            return Some((DatePart::Calendar { month, day }, None));
        }

        if let Some((caps_month, caps_day)) = take(&self.date_month_day, text, |c| {
            (c[1].to_string(), c[2].to_string())
        }) {
            let day = caps_day.parse().ok()?;
            let month = month_number(&caps_month)?;
            return Some((DatePart::Calendar { month, day }, None));
        }

        if let Some(word) = take(&self.day_word, text, |c| c[1].to_string()) {
            return Some(match word.as_str() {
                "day after tomorrow" => (DatePart::Offset(2), None),
                "tomorrow" => (DatePart::Offset(1), None),
                "tonight" => (DatePart::Offset(0), NaiveTime::from_hms_opt(20, 0, 0)),
                _ => (DatePart::Offset(0), None),
            });
        }

        if take(&self.next_week, text, |_| ()).is_some() {
            return Some((DatePart::Offset(7), None));
        }

        if let Some((next, name)) = take(&self.weekday, text, |c| {
            (c.get(1).is_some(), c[2].to_string())
        }) {
            let day = name.parse::<Weekday>().ok()?;
            return Some((DatePart::Weekday { day, next }, None));
        }

        None
    }

    /// Extract the clock time, blanking the matched span
    fn take_time(&self, text: &mut String) -> Option<Option<NaiveTime>> {
        if let Some((hour, minute, meridiem)) = take(&self.clock_12h, text, |c| {
            (
                c[1].to_string(),
                c.get(2).map(|m| m.as_str().to_string()),
                c[3].to_string(),
            )
        }) {
            let hour: u32 = hour.parse().ok()?;
            let minute: u32 = minute.map(|m| m.parse().ok()).unwrap_or(Some(0))?;
            if !(1..=12).contains(&hour) {
                return Some(None);
            }
            let hour = hour % 12 + if meridiem == "pm" { 12 } else { 0 };
            return Some(NaiveTime::from_hms_opt(hour, minute, 0));
        }

        if let Some((hour, minute)) =
            take(&self.clock_24h, text, |c| (c[1].to_string(), c[2].to_string()))
        {
            let hour = hour.parse().ok()?;
            let minute = minute.parse().ok()?;
            return Some(NaiveTime::from_hms_opt(hour, minute, 0));
        }

        if let Some(hour) = take(&self.oclock, text, |c| c[1].to_string()) {
            return Some(NaiveTime::from_hms_opt(hour.parse().ok()?, 0, 0));
        }

        if let Some(name) = take(&self.named_time, text, |c| c[1].to_string()) {
            let hour = if name == "midnight" { 0 } else { 12 };
            return Some(NaiveTime::from_hms_opt(hour, 0, 0));
        }

        if let Some(hour) = take(&self.bare_hour, text, |c| c[1].to_string()) {
            return Some(NaiveTime::from_hms_opt(hour.parse().ok()?, 0, 0));
        }

        if let Some(period) = take(&self.period, text, |c| c[1].to_string()) {
            let hour = match period.as_str() {
                "morning" => 9,
                "afternoon" => 15,
                "evening" => 18,
                _ => 20,
            };
            return Some(NaiveTime::from_hms_opt(hour, 0, 0));
        }

        None
    }
}

impl TimeParser for PhraseTimeParser {
    fn parse(&self, phrase: &str, now: DateTime<Local>) -> Option<DateTime<Local>> {
        let mut text = clean_phrase(phrase);
        if text.is_empty() {
            return None;
        }

        if let Some(delta) = self.parse_duration(&text) {
            return now.checked_add_signed(delta);
        }

        let date = self.take_date(&mut text);
        // an unparseable clock (e.g. "13 pm") poisons the whole phrase
        let time = match self.take_time(&mut text) {
            Some(None) => return None,
            Some(Some(t)) => Some(t),
            None => None,
        };

        let leftover_ok = text
            .split_whitespace()
            .all(|word| FILLER_WORDS.contains(&word));
        if !leftover_ok {
            return None;
        }

        let today = now.date_naive();
        let default_time = NaiveTime::from_hms_opt(9, 0, 0)?;

        let naive = match date {
            Some((DatePart::Offset(days), implied)) => {
                let day = today + Duration::days(days);
                let time = time.or(implied).unwrap_or_else(|| now.time());
                day.and_time(time)
            }
            Some((DatePart::Weekday { day, next }, _)) => {
                let current = today.weekday().num_days_from_monday() as i64;
                let target = day.num_days_from_monday() as i64;
                let mut ahead = (target - current).rem_euclid(7);
                let time = time.unwrap_or(default_time);
                if ahead == 0 && (next || time <= now.time()) {
                    ahead = 7;
                }
                (today + Duration::days(ahead)).and_time(time)
            }
            Some((DatePart::Calendar { month, day }, _)) => {
                let time = time.unwrap_or(default_time);
                let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?.and_time(time);
                if this_year <= now.naive_local() {
                    NaiveDate::from_ymd_opt(today.year() + 1, month, day)?.and_time(time)
                } else {
                    this_year
                }
            }
            None => {
                let time = time?;
                let candidate = today.and_time(time);
                if candidate <= now.naive_local() {
                    candidate + Duration::days(1)
                } else {
                    candidate
                }
            }
        };

        to_local(naive)
    }
}

/// Run `re` once against `text`; on a match, extract values and blank the span
fn take<T>(re: &Regex, text: &mut String, extract: impl FnOnce(&Captures<'_>) -> T) -> Option<T> {
    let (range, value) = {
        let caps = re.captures(text)?;
        let whole = caps.get(0)?;
        (whole.range(), extract(&caps))
    };
    text.replace_range(range, " ");
    Some(value)
}

fn clean_phrase(phrase: &str) -> String {
    let lower = phrase
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace(['.', ',', '!', '?'], " ");
    lower.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_amount(word: &str) -> Option<i64> {
    if let Ok(n) = word.parse::<i64>() {
        return Some(n);
    }
    NUMBER_WORDS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, n)| *n)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match &name[..3.min(name.len())] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn to_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    // nonexistent local times (DST gaps) are treated as unparseable
    Local.from_local_datetime(&naive).earliest()
}
