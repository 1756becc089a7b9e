//! Composite symbol string parsing: `INDEX <EXPIRY> <STRIKE> <OPT>`.
//!
//! `<EXPIRY>` is one of three dialects — day-form (`7TH OCT`, `05 NOV 25`),
//! compact (`16OCT25`), or month-only (`OCT`, `OCT25`, resolved via the
//! cache's monthly-expiry table). All matching is case-insensitive; runs of
//! whitespace are tolerated by splitting on `split_whitespace`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::cache::Cache;
use crate::order::OptionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolError {
    Malformed,
    UnknownOptionType,
    InvalidExpiry,
    MonthlyExpiryMiss,
}

pub struct ParsedSymbol {
    pub index: String,
    pub expiry: String, // YYYY-MM-DD
    pub strike: String,
    pub option_type: OptionType,
}

pub fn parse_symbol(
    symbol: &str,
    cache: &Cache,
    now: DateTime<Utc>,
) -> Result<ParsedSymbol, SymbolError> {
    let tokens: Vec<&str> = symbol.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(SymbolError::Malformed);
    }
    let n = tokens.len();
    let index = tokens[0].to_string();
    let expiry_tokens = &tokens[1..n - 2];
    let strike = tokens[n - 2].to_string();
    let option_type = parse_option_type(tokens[n - 1])?;

    let expiry = resolve_expiry(expiry_tokens, &index, cache, now)?;

    Ok(ParsedSymbol {
        index,
        expiry,
        strike,
        option_type,
    })
}

fn parse_option_type(tok: &str) -> Result<OptionType, SymbolError> {
    match tok.to_uppercase().as_str() {
        "CE" | "C" => Ok(OptionType::Call),
        "PE" | "P" => Ok(OptionType::Put),
        _ => Err(SymbolError::UnknownOptionType),
    }
}

fn resolve_expiry(
    tokens: &[&str],
    index: &str,
    cache: &Cache,
    now: DateTime<Utc>,
) -> Result<String, SymbolError> {
    match tokens.len() {
        1 => resolve_single_token_expiry(tokens[0], index, cache, now),
        2 => resolve_day_form(tokens[0], tokens[1], None, now),
        3 => resolve_day_form(tokens[0], tokens[1], Some(tokens[2]), now),
        _ => Err(SymbolError::InvalidExpiry),
    }
}

fn resolve_single_token_expiry(
    tok: &str,
    index: &str,
    cache: &Cache,
    now: DateTime<Utc>,
) -> Result<String, SymbolError> {
    if let Some(date) = try_compact_form(tok) {
        return Ok(date);
    }
    // month-only: 3 letters, optional 2-digit year (year is not used — the
    // cache's monthly_expiry table is keyed by index+month only).
    let upper = tok.to_uppercase();
    let month3 = if upper.len() == 3 {
        Some(upper.as_str())
    } else if upper.len() == 5 && upper[3..].chars().all(|c| c.is_ascii_digit()) {
        Some(&upper[0..3])
    } else {
        None
    };
    let month3 = month3.filter(|m| month_number(m).is_some());
    match month3 {
        Some(m) => cache
            .monthly_expiry(index, m)
            .ok_or(SymbolError::MonthlyExpiryMiss),
        None => {
            let _ = now;
            Err(SymbolError::InvalidExpiry)
        }
    }
}

/// `DDMMMYY`: exactly 7 chars, `DD` digits, `MMM` letters, `YY` digits.
fn try_compact_form(tok: &str) -> Option<String> {
    if tok.len() != 7 {
        return None;
    }
    let bytes = tok.as_bytes();
    if !bytes[0..2].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if !bytes[2..5].iter().all(u8::is_ascii_alphabetic) {
        return None;
    }
    if !bytes[5..7].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let day: u32 = tok[0..2].parse().ok()?;
    let month = month_number(&tok[2..5].to_uppercase())?;
    let yy: i32 = tok[5..7].parse().ok()?;
    let year = 2000 + yy;
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// `DD[ST|ND|RD|TH] MMM [YY]`
fn resolve_day_form(
    day_tok: &str,
    month_tok: &str,
    year_tok: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String, SymbolError> {
    let mut stripped = day_tok.to_uppercase();
    for suffix in ["TH", "ST", "ND", "RD"] {
        if let Some(prefix) = stripped.strip_suffix(suffix) {
            stripped = prefix.to_string();
            break;
        }
    }
    let day: u32 = stripped.trim().parse().map_err(|_| SymbolError::InvalidExpiry)?;
    let month = month_number(&month_tok.to_uppercase()).ok_or(SymbolError::InvalidExpiry)?;
    let year = match year_tok {
        Some(y) => {
            let yy: i32 = y.parse().map_err(|_| SymbolError::InvalidExpiry)?;
            2000 + yy
        }
        None => now.date_naive().year(),
    };
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or(SymbolError::InvalidExpiry)
}

fn month_number(month3: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ];
    MONTHS
        .iter()
        .position(|m| *m == month3)
        .map(|i| (i + 1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_cache;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 9, 10, 30, 0).unwrap()
    }

    #[test]
    fn day_form_with_ordinal_no_year() {
        let cache = test_cache();
        let r = parse_symbol("NIFTY 7TH OCT 25900 CE", &cache, now()).unwrap();
        assert_eq!(r.index, "NIFTY");
        assert_eq!(r.expiry, "2025-10-07");
        assert_eq!(r.strike, "25900");
        assert_eq!(r.option_type, OptionType::Call);
    }

    #[test]
    fn day_form_with_explicit_year() {
        let cache = test_cache();
        let r = parse_symbol("NIFTY 05 NOV 25 25900 PE", &cache, now()).unwrap();
        assert_eq!(r.expiry, "2025-11-05");
        assert_eq!(r.option_type, OptionType::Put);
    }

    #[test]
    fn compact_form() {
        let cache = test_cache();
        let r = parse_symbol("NIFTY 16OCT25 25000 CE", &cache, now()).unwrap();
        assert_eq!(r.expiry, "2025-10-16");
    }

    #[test]
    fn month_only_resolved_via_cache() {
        let cache = test_cache();
        let r = parse_symbol("NIFTY OCT 25000 C", &cache, now()).unwrap();
        assert_eq!(r.expiry, "2025-10-28");
        assert_eq!(r.option_type, OptionType::Call);
    }

    #[test]
    fn month_only_missing_cache_entry_rejects() {
        let cache = test_cache();
        let err = parse_symbol("BANKNIFTY OCT 50000 PE", &cache, now()).unwrap_err();
        assert_eq!(err, SymbolError::MonthlyExpiryMiss);
    }

    #[test]
    fn unknown_option_type_rejects() {
        let cache = test_cache();
        let err = parse_symbol("NIFTY 16OCT25 25000 XX", &cache, now()).unwrap_err();
        assert_eq!(err, SymbolError::UnknownOptionType);
    }

    #[test]
    fn case_insensitive() {
        let cache = test_cache();
        let r = parse_symbol("nifty 16oct25 25000 ce", &cache, now()).unwrap();
        assert_eq!(r.expiry, "2025-10-16");
    }

    /// Re-emitting a day-form symbol string from the parsed fields
    /// re-parses to the same tuple.
    #[test]
    fn idempotent_on_day_form_roundtrip() {
        let cache = test_cache();
        let original = parse_symbol("NIFTY 7TH OCT 25900 CE", &cache, now()).unwrap();
        let date = NaiveDate::parse_from_str(&original.expiry, "%Y-%m-%d").unwrap();
        let rebuilt = format!(
            "{} {} {} {}",
            original.index,
            date.format("%-d %b").to_string().to_uppercase(),
            original.strike,
            original.option_type.short_code()
        );
        let reparsed = parse_symbol(&rebuilt, &cache, now()).unwrap();
        assert_eq!(reparsed.expiry, original.expiry);
        assert_eq!(reparsed.index, original.index);
        assert_eq!(reparsed.strike, original.strike);
        assert_eq!(reparsed.option_type, original.option_type);
    }
}
