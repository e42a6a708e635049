//! Line cleanup plus Argentine amount and date parsing shared by the PDF extractors.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// `1.234,56`, `-1.234,56`, `$1.234,56`, `1.234,56-`, `15,00`
static RE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?\$?(-)?(\d{1,3}(?:\.\d{3})+|\d+),(\d{2})(-)?$").unwrap()
});

/// `dd/mm`, `dd/mm/yy`, `dd/mm/yyyy`, `-` accepted as separator.
static RE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2}|\d{4}))?$").unwrap());

static RE_FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-](\d{4})\b").unwrap());

static RE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:hoja\s*\d+(?:\s*/\s*\d+)?|p[aáà]gina\s*\d+(?:\s*(?:/|de)\s*\d+)?|fecha de descarga|home banking|contact(?: center)?)$",
    )
    .unwrap()
});

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub fn parse_amount(token: &str) -> Option<f64> {
    let caps = RE_AMOUNT.captures(token.trim())?;
    let integer = caps.get(3)?.as_str().replace('.', "");
    let decimals = caps.get(4)?.as_str();
    let value: f64 = format!("{}.{}", integer, decimals).parse().ok()?;

    let negative = caps.get(1).is_some() || caps.get(2).is_some() || caps.get(5).is_some();
    Some(if negative { -value } else { value })
}

/// Parses a date token, taking the year from `fallback_year` when the token has none.
pub fn parse_date(token: &str, fallback_year: Option<i32>) -> Option<NaiveDate> {
    let caps = RE_DATE.captures(token.trim())?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;

    let year = match caps.get(3) {
        Some(y) if y.as_str().len() == 2 => 2000 + y.as_str().parse::<i32>().ok()?,
        Some(y) => y.as_str().parse().ok()?,
        None => fallback_year?,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn is_date_token(token: &str) -> bool {
    RE_DATE.is_match(token)
}

/// First four-digit year of a full date anywhere in `text`.
pub fn first_full_date_year(text: &str) -> Option<i32> {
    RE_FULL_DATE
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<i32>().ok())
        .find(|y| (1990..=2100).contains(y))
}

pub fn format_date(date: NaiveDate) -> String {
    format!("{:02}/{:02}/{}", date.day(), date.month(), date.year())
}

/// Collapses whitespace (including non-breaking spaces) and trims.
pub fn normalize_line(line: &str) -> String {
    RE_WHITESPACE
        .replace_all(&line.replace('\u{00A0}', " "), " ")
        .trim()
        .to_string()
}

pub fn is_noise(line: &str) -> bool {
    line.chars().count() < 3 || RE_NOISE.is_match(line)
}

/// Normalized, non-empty, non-noise lines.
pub fn preclean<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    lines
        .into_iter()
        .map(normalize_line)
        .filter(|line| !line.is_empty() && !is_noise(line))
        .collect()
}
