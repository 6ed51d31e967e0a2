use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

static DAY_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,2})\s+([а-яё]+)").unwrap());

/// Genitive month names as they appear in "Доставим 5 января".
const RU_MONTHS: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня",
    "июля", "августа", "сентября", "октября", "ноября", "декабря",
];

/// Relative-day words, matched as whole words.
const RELATIVE_DAYS: [(&str, i64); 3] = [("сегодня", 0), ("завтра", 1), ("послезавтра", 2)];

/// Days from today until the delivery date mentioned in `text`.
pub fn delivery_days(text: &str) -> Option<i64> {
    delivery_days_on(text, Local::now().date_naive())
}

/// Same as [`delivery_days`] with an explicit "today".
///
/// A day/month already behind `today` is read as next year's date, so the
/// result is never negative. Impossible dates (e.g. "31 апреля") give `None`.
pub fn delivery_days_on(text: &str, today: NaiveDate) -> Option<i64> {
    let t = text.to_lowercase().replace('\u{a0}', " ");
    let t = t.trim();
    if t.is_empty() {
        return None;
    }

    if let Some(days) = relative_days(t) {
        return Some(days);
    }

    let caps = DAY_MONTH_RE.captures(t)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;

    let mut date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if date < today {
        date = NaiveDate::from_ymd_opt(today.year() + 1, month, day)?;
    }
    Some((date - today).num_days())
}

fn relative_days(t: &str) -> Option<i64> {
    t.split(|c: char| !c.is_alphabetic())
        .find_map(|word| RELATIVE_DAYS.iter().find(|(w, _)| *w == word).map(|&(_, d)| d))
}

fn month_number(name: &str) -> Option<u32> {
    RU_MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn relative_keywords() {
        let today = day(2024, 6, 10);
        assert_eq!(delivery_days_on("Доставим сегодня", today), Some(0));
        assert_eq!(delivery_days_on("доставим завтра", today), Some(1));
    }

    #[test]
    fn day_after_tomorrow_is_not_tomorrow() {
        let today = day(2024, 6, 10);
        assert_eq!(delivery_days_on("Доставим послезавтра", today), Some(2));
        assert_eq!(delivery_days_on("доставка завтра, 11 июня", today), Some(1));
    }

    #[test]
    fn same_year_date() {
        assert_eq!(delivery_days_on("доставим 15 июня", day(2024, 6, 10)), Some(5));
        assert_eq!(delivery_days_on("10 июня", day(2024, 6, 10)), Some(0));
    }

    #[test]
    fn wraps_into_next_year() {
        let today = day(2024, 12, 28);
        assert_eq!(delivery_days_on("Доставим 5 января", today), Some(8));
    }

    #[test]
    fn nbsp_between_day_and_month() {
        assert_eq!(delivery_days_on("Доставим 3\u{a0}июля", day(2024, 7, 1)), Some(2));
    }

    #[test]
    fn unknown_month_is_none() {
        assert_eq!(delivery_days_on("доставим 5 брюмера", day(2024, 6, 10)), None);
        assert_eq!(delivery_days_on("доставим на неделе", day(2024, 6, 10)), None);
    }

    #[test]
    fn impossible_dates_are_none() {
        assert_eq!(delivery_days_on("31 апреля", day(2024, 3, 1)), None);
        assert_eq!(delivery_days_on("29 февраля", day(2023, 1, 10)), None);
        // Leap day already passed this year; next year has none.
        assert_eq!(delivery_days_on("29 февраля", day(2024, 3, 5)), None);
        assert_eq!(delivery_days_on("0 марта", day(2024, 1, 5)), None);
    }

    #[test]
    fn empty_text() {
        assert_eq!(delivery_days_on("", day(2024, 1, 1)), None);
    }
}
