use chrono::{Days, NaiveDate};
use regex::Regex;

use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%Y%m%d";

/// Returns the calendar day after `start`, in `YYYYMMDD` form.
///
/// An omitted end date means "this single day", and the archive's file
/// query takes an inclusive range, so the range becomes
/// `[start, start + 1 day]`. Month and year rollover follow the calendar.
pub(crate) fn default_end_date(start: &str) -> Result<String> {
    let day = NaiveDate::parse_from_str(start, DATE_FORMAT)
        .map_err(|_| Error::Date(start.to_string()))?;
    let next = day
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::Date(start.to_string()))?;
    Ok(next.format(DATE_FORMAT).to_string())
}

/// Keeps the items `pattern` matches anywhere; identity when `None`.
///
/// Filtering only narrows: relative order is preserved and nothing is
/// added or rewritten.
pub(crate) fn regex_filter(items: Vec<String>, pattern: Option<&Regex>) -> Vec<String> {
    match pattern {
        None => items,
        Some(re) => items.into_iter().filter(|item| re.is_match(item)).collect(),
    }
}

/// Lexicographic ascending sort. Duplicates stay as the service sent them.
pub(crate) fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn end_date_is_next_day() {
        assert_eq!(default_end_date("20200101").unwrap(), "20200102");
    }

    #[test]
    fn end_date_rolls_over_month_and_year() {
        assert_eq!(default_end_date("20230228").unwrap(), "20230301");
        assert_eq!(default_end_date("20240228").unwrap(), "20240229");
        assert_eq!(default_end_date("20241231").unwrap(), "20250101");
    }

    #[test]
    fn end_date_rejects_malformed_input() {
        for bad in ["", "2020-01-01", "20200230", "notadate"] {
            assert!(matches!(default_end_date(bad), Err(Error::Date(_))));
        }
    }

    #[test]
    fn filter_without_pattern_is_identity() {
        let items = names(&["b.cdf", "a.cdf", "b.cdf"]);
        assert_eq!(regex_filter(items.clone(), None), items);
    }

    #[test]
    fn filter_narrows_and_preserves_order() {
        let re = Regex::new(r"E13").unwrap();
        let items = names(&["sgpmetE13.b1", "nsametC1.b1", "sgpdlprofE13.c1"]);
        assert_eq!(
            regex_filter(items, Some(&re)),
            names(&["sgpmetE13.b1", "sgpdlprofE13.c1"])
        );
    }

    #[test]
    fn filter_uses_search_semantics() {
        let re = Regex::new(r"met").unwrap();
        let items = names(&["sgpmetE13.b1"]);
        assert_eq!(regex_filter(items.clone(), Some(&re)), items);
    }

    #[test]
    fn sorted_is_ascending_and_keeps_duplicates() {
        let items = names(&["c", "a", "b", "a"]);
        assert_eq!(sorted(items), names(&["a", "a", "b", "c"]));
    }
}
