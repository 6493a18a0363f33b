//! Date phrases inside captions. Chinese forms are matched with patterns,
//! English ones by resolving short word windows with chrono-english.

use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_english::{parse_date_string, Dialect};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::outcome::{Degradation, Outcome};

const MAX_DATE_WORDS: usize = 4;
/// Longer bare numbers make chrono-english overflow.
const MAX_NUMBER_DIGITS: usize = 4;
const MIN_YEAR: i32 = 1000;

const RELATIVE_WORDS: [&str; 7] = ["today", "tonight", "tomorrow", "yesterday", "next", "last", "ago"];

const WEEKDAYS: [&str; 7] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Month names that are also everyday words.
const COMMON_WORD_MONTHS: [&str; 2] = ["march", "may"];

static CHINESE_ABSOLUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:([0-9]{4})\s*年\s*)?([0-9]{1,2})\s*月\s*([0-9]{1,2})\s*[日号]")
        .expect("chinese date pattern is valid")
});

static CHINESE_RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new("前天|昨天|今天|明天|后天").expect("chinese day pattern is valid"));

/// Finds the first phrase in a text that reads as a date.
#[derive(Debug, Clone, Copy)]
pub struct DateSearch {
    month_first: bool,
    max_words: usize,
}

impl Default for DateSearch {
    fn default() -> Self {
        DateSearch {
            month_first: false,
            max_words: MAX_DATE_WORDS,
        }
    }
}

impl DateSearch {
    /// `month_first` reads `04/03` as April 3rd instead of 4th March.
    pub fn new(month_first: bool) -> Self {
        DateSearch { month_first, ..Default::default() }
    }

    fn dialect(&self) -> Dialect {
        if self.month_first { Dialect::Us } else { Dialect::Uk }
    }

    /// Chinese dates win when present. Otherwise word windows are scanned
    /// left to right, longest first at each start, and the first plausible
    /// one that parses relative to `now` is returned.
    ///
    /// A parser panic stops the scan and is recorded on the outcome.
    pub fn first_date(&self, text: &str, now: DateTime<Utc>) -> Outcome<Option<NaiveDateTime>> {
        if let Some(found) = chinese_date(text, now) {
            return Outcome::complete(Some(found));
        }

        let words: Vec<&str> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| ",.;:!?\"'()".contains(c)))
            .filter(|w| !w.is_empty())
            .collect();

        for start in 0..words.len() {
            let longest = self.max_words.min(words.len() - start);
            for len in (1..=longest).rev() {
                let slice = &words[start..start + len];
                if !is_plausible(slice) {
                    continue;
                }

                let window = slice.join(" ");
                let dialect = self.dialect();
                match panic::catch_unwind(AssertUnwindSafe(|| parse_date_string(&window, now, dialect))) {
                    Ok(Ok(found)) if found.year() >= MIN_YEAR => {
                        return Outcome::complete(Some(found.naive_utc()));
                    }
                    Ok(_) => {}
                    Err(_) => {
                        warn!(window = %window, "date parser panicked, giving up on caption date");
                        return Outcome::degraded(None, Degradation::DateSearchFailed(window));
                    }
                }
            }
        }
        Outcome::complete(None)
    }
}

/// `2023年5月1日`, `5月1号` (year taken from `now`) and the day words
/// 前天 昨天 今天 明天 后天, whichever comes first in the text.
fn chinese_date(text: &str, now: DateTime<Utc>) -> Option<NaiveDateTime> {
    let absolute = CHINESE_ABSOLUTE.captures_iter(text).find_map(|caps| {
        let year = match caps.get(1) {
            Some(year) => year.as_str().parse().ok()?,
            None => now.year(),
        };
        if year < MIN_YEAR {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(year, caps[2].parse().ok()?, caps[3].parse().ok()?)?;
        Some((caps.get(0)?.start(), date.and_hms_opt(0, 0, 0)?))
    });

    let relative = CHINESE_RELATIVE.find(text).and_then(|m| {
        let days = match m.as_str() {
            "前天" => -2,
            "昨天" => -1,
            "今天" => 0,
            "明天" => 1,
            "后天" => 2,
            _ => return None,
        };
        Some((m.start(), (now + Duration::days(days)).naive_utc()))
    });

    match (absolute, relative) {
        (Some(a), Some(r)) => Some(if a.0 <= r.0 { a.1 } else { r.1 }),
        (a, r) => a.or(r).map(|(_, found)| found),
    }
}

fn is_bare_number(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

fn starts_with_digit(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn is_relative(word: &str) -> bool {
    RELATIVE_WORDS.iter().any(|r| word.eq_ignore_ascii_case(r))
}

/// `2021-05-01`, `04/03`, `1.5.2020`. A lone dot is a decimal.
fn is_numeric_date(word: &str) -> bool {
    let separators = word.chars().filter(|c| matches!(c, '-' | '/' | '.')).count();
    let dots = word.matches('.').count();
    starts_with_digit(word)
        && word.chars().all(|c| c.is_ascii_digit() || matches!(c, '-' | '/' | '.'))
        && separators > 0
        && !(dots == 1 && separators == 1)
}

enum CalendarWord {
    Unambiguous,
    /// Abbreviations and month names that double as ordinary words.
    Ambiguous,
}

fn calendar_word(word: &str) -> Option<CalendarWord> {
    let lower = word.to_lowercase();
    let full = WEEKDAYS.contains(&lower.as_str()) || MONTHS.contains(&lower.as_str());
    if full && !COMMON_WORD_MONTHS.contains(&lower.as_str()) {
        return Some(CalendarWord::Unambiguous);
    }
    let abbreviated = lower.len() == 3
        && WEEKDAYS.iter().chain(MONTHS.iter()).any(|name| name.starts_with(&lower));
    if full || abbreviated { Some(CalendarWord::Ambiguous) } else { None }
}

/// Whether word `i` of the window marks a date.
fn is_anchor(words: &[&str], i: usize) -> bool {
    let word = words[i];
    if is_relative(word) || is_numeric_date(word) {
        return true;
    }
    match calendar_word(word) {
        Some(CalendarWord::Unambiguous) => true,
        Some(CalendarWord::Ambiguous) => {
            let capitalised = word.chars().next().is_some_and(char::is_uppercase);
            let qualified = |w: &&str| starts_with_digit(w) || is_relative(w);
            let neighbour = (i > 0 && qualified(&words[i - 1]))
                || words.get(i + 1).is_some_and(|w| qualified(w));
            capitalised && neighbour
        }
        None => false,
    }
}

/// Only windows that mention a date word and carry no oversized number
/// are handed to the parser.
fn is_plausible(words: &[&str]) -> bool {
    if words.iter().any(|w| is_bare_number(w) && w.len() > MAX_NUMBER_DIGITS) {
        return false;
    }
    if let [only] = words {
        if is_bare_number(only) {
            return false;
        }
    }
    (0..words.len()).any(|i| is_anchor(words, i))
}
