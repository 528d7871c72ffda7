//! Spanish date recognition normalized to DD/MM/YYYY.

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};

/// Month names matched by containment in the captured word.
const MONTHS: [(&str, u32); 12] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

/// Recognizes `DD/MM/YYYY`, `DD de <mes> [de YYYY]` and `<mes> DD[, YYYY]`.
#[derive(Debug, Clone)]
pub struct DateParser {
    numeric: Regex,
    day_month: Regex,
    month_day: Regex,
}

impl DateParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            numeric: Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b")?,
            day_month: Regex::new(
                r"(?i)\b(\d{1,2})\s+de\s+([a-zñáéíóú]+)(?:\s+(?:de(?:l)?\s+)?(\d{4})\b)?",
            )?,
            month_day: Regex::new(r"(?i)\b([a-zñáéíóú]+)\s+(\d{1,2})\b(?:,?\s+(\d{4})\b)?")?,
        })
    }

    /// First valid calendar date in `text`. A missing year falls back to
    /// `today`'s year; impossible dates such as 31/02 are skipped.
    pub fn parse(&self, text: &str, today: NaiveDate) -> Option<String> {
        self.find(text, Some(today))
    }

    /// Like [`DateParser::parse`], but only dates that spell out their year.
    pub fn parse_with_year(&self, text: &str) -> Option<String> {
        self.find(text, None)
    }

    fn find(&self, text: &str, today: Option<NaiveDate>) -> Option<String> {
        for caps in self.numeric.captures_iter(text) {
            let date = number(&caps, 3).and_then(|year| {
                let month = number(&caps, 2)?;
                let day = number(&caps, 1)?;
                calendar_date(year as i32, month, day)
            });
            if date.is_some() {
                return date;
            }
        }
        for caps in self.day_month.captures_iter(text) {
            if let Some(date) = self.worded(&caps, 1, 2, 3, today) {
                return Some(date);
            }
        }
        for caps in self.month_day.captures_iter(text) {
            if let Some(date) = self.worded(&caps, 2, 1, 3, today) {
                return Some(date);
            }
        }
        None
    }

    fn worded(
        &self,
        caps: &Captures<'_>,
        day_idx: usize,
        month_idx: usize,
        year_idx: usize,
        today: Option<NaiveDate>,
    ) -> Option<String> {
        let month = month_number(caps.get(month_idx)?.as_str())?;
        let day = number(caps, day_idx)?;
        let year = match number(caps, year_idx) {
            Some(year) => year as i32,
            None => today?.year(),
        };
        calendar_date(year, month, day)
    }
}

fn number(caps: &Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

fn month_number(word: &str) -> Option<u32> {
    let lower = word.to_lowercase();
    MONTHS
        .iter()
        .find(|(name, _)| lower.contains(name))
        .map(|(_, number)| *number)
}

fn calendar_date(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.format("%d/%m/%Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::DateParser;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
    }

    #[test]
    fn normalizes_supported_forms() {
        let parser = DateParser::new().expect("parser");
        let cases = [
            ("15/03/2021", "15/03/2021"),
            ("5-3-1990", "05/03/1990"),
            ("nací el 15 de marzo de 2021", "15/03/2021"),
            ("7 de Diciembre 1985", "07/12/1985"),
            ("marzo 15, 2021", "15/03/2021"),
            ("el 3 de mayo", "03/05/2024"),
        ];
        for (input, expected) in cases {
            assert_eq!(parser.parse(input, today()).as_deref(), Some(expected), "{input}");
        }
    }

    #[test]
    fn rejects_impossible_and_missing_dates() {
        let parser = DateParser::new().expect("parser");
        assert_eq!(parser.parse("31/02/2020", today()), None);
        assert_eq!(parser.parse("marzo 2021", today()), None);
        assert_eq!(parser.parse("tengo 45 años", today()), None);
        assert_eq!(parser.parse("vivo en Cali", today()), None);
    }

    #[test]
    fn skips_invalid_candidate_for_later_valid_one() {
        let parser = DateParser::new().expect("parser");
        assert_eq!(
            parser.parse("no es 40/13/2020 sino 01/02/2000", today()).as_deref(),
            Some("01/02/2000")
        );
    }
}
