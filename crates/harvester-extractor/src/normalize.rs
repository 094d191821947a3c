//! Normalization of raw page text into field values

use crate::profile::DecimalStyle;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// A double-quoted http(s) URL inside a JSON blob
fn quoted_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#""(https?:(?:[^"\\]|\\.)+)""#).ok())
        .as_ref()
}

/// Collapse whitespace (NBSP included) and trim; `None` when nothing is left
pub fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw
        .split(|c: char| c.is_whitespace() || c == '\u{a0}' || c == '\u{202f}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Parse a price-like string such as `1.299,99 €` or `$1,299.99`
///
/// Currency symbols, letters and spaces are dropped. With [`DecimalStyle::Auto`]
/// the last separator is the decimal point when both kinds occur; a single
/// kind followed by exactly three digits (or repeated) is a thousands
/// separator.
pub fn parse_number(raw: &str, style: DecimalStyle) -> Option<f64> {
    let negative = raw.trim_start().starts_with('-');
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let kept = kept.trim_matches(|c| c == ',' || c == '.');
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let canonical = match style {
        DecimalStyle::Comma => kept.replace('.', "").replace(',', "."),
        DecimalStyle::Dot => kept.replace(',', ""),
        DecimalStyle::Auto => auto_canonical(kept),
    };

    let value: f64 = canonical.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn auto_canonical(kept: &str) -> String {
    let last_comma = kept.rfind(',');
    let last_dot = kept.rfind('.');

    match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => kept.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => kept.replace(',', ""),
        (Some(_), None) => single_separator(kept, ','),
        (None, Some(_)) => single_separator(kept, '.'),
        (None, None) => kept.to_string(),
    }
}

fn single_separator(kept: &str, sep: char) -> String {
    let count = kept.matches(sep).count();
    let digits_after = kept.rsplit(sep).next().map(str::len).unwrap_or(0);

    if count > 1 || digits_after == 3 {
        kept.replace(sep, "")
    } else {
        kept.replace(sep, ".")
    }
}

/// Join a whole part and a fractional part read from separate elements
///
/// Only digits count, so `1.299,` and `99` give `1299.99`.
pub fn join_whole_fraction(whole: &str, fraction: Option<&str>) -> Option<f64> {
    let whole_digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    if whole_digits.is_empty() {
        return None;
    }
    let fraction_digits: String = fraction
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    let joined = if fraction_digits.is_empty() {
        whole_digits
    } else {
        format!("{}.{}", whole_digits, fraction_digits)
    };
    joined.parse().ok()
}

/// Every http(s) URL inside `raw`
///
/// A JSON blob (`{...}` or `[...]`) yields each quoted URL in it. Anything
/// else is one attribute value and yields at most one URL, which may
/// contain commas (`._SR38,50_`).
pub fn extract_urls(raw: &str) -> Vec<String> {
    let raw = raw.trim();

    if raw.starts_with('{') || raw.starts_with('[') {
        return match quoted_url_pattern() {
            Some(pattern) => pattern
                .captures_iter(raw)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().replace("\\/", "/"))
                .collect(),
            None => Vec::new(),
        };
    }

    match raw.split_whitespace().next() {
        Some(url) if url.starts_with("https://") || url.starts_with("http://") => vec![url.to_string()],
        _ => Vec::new(),
    }
}

/// Filter, strip, dedupe and cap a URL list, keeping first-seen order
///
/// Exclusion is checked before stripping so size markers in the original
/// URL still identify thumbnails.
pub fn clean_urls(urls: Vec<String>, strip: Option<&Regex>, exclude: &[Regex], max_items: Option<usize>) -> Vec<String> {
    let mut seen = HashSet::new();
    let cap = max_items.unwrap_or(usize::MAX);

    urls.into_iter()
        .filter(|url| !exclude.iter().any(|pattern| pattern.is_match(url)))
        .map(|url| match strip {
            Some(pattern) => pattern.replace_all(&url, "").into_owned(),
            None => url,
        })
        .filter(|url| seen.insert(url.clone()))
        .take(cap)
        .collect()
}

/// `false` when any marker occurs in the texts, case-insensitively
pub fn is_available(texts: &[String], markers: &[String]) -> bool {
    let haystack = texts.join(" ").to_lowercase();
    !markers
        .iter()
        .any(|marker| haystack.contains(&marker.to_lowercase()))
}
