use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

pub const DECIMAL_PLACES: u32 = 2;

/// Prefix shown before reference-currency amounts.
pub const REF_SYMBOL: &str = "$";
/// Prefix shown before local-currency amounts.
pub const LOCAL_SYMBOL: &str = "BsD";

/// Half-away-from-zero rounding to cents.
#[inline]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// One cent, the settlement tolerance.
#[inline]
pub fn cent() -> Decimal {
    Decimal::new(1, DECIMAL_PLACES)
}

/// Sums without panicking; a total past the representable range pins at `Decimal::MAX`.
pub fn saturating_sum(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values
        .into_iter()
        .fold(Decimal::ZERO, |total, value| total.saturating_add(value))
}

/// Parses a user or server supplied amount. Blank or non-numeric text yields `None`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Reads a JSON value holding either a number or numeric text.
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(text) => parse_amount(text),
        serde_json::Value::Number(number) => parse_amount(&number.to_string()),
        _ => None,
    }
}

/// Serde adapter for amounts that may be malformed in the payload.
pub fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(decimal_from_json(&value))
}

/// Fixed two-decimal rendering without a currency prefix.
pub fn fixed2(value: Decimal) -> String {
    let mut rounded = round2(value);
    if rounded.is_zero() {
        rounded = Decimal::ZERO;
    }
    rounded.rescale(DECIMAL_PLACES);
    rounded.to_string()
}

pub fn format_ref(value: Decimal) -> String {
    format!("{REF_SYMBOL}{}", fixed2(value))
}

pub fn format_local(value: Decimal) -> String {
    format!("{LOCAL_SYMBOL} {}", fixed2(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    #[test]
    fn round2_goes_away_from_zero_on_midpoint() {
        assert_eq!(round2(dec("1.005")), dec("1.01"));
        assert_eq!(round2(dec("-1.005")), dec("-1.01"));
        assert_eq!(round2(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn parse_amount_rejects_blank_and_garbage() {
        assert_eq!(parse_amount("  "), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(" 12.50 "), Some(dec("12.50")));
        assert_eq!(parse_amount("1e2"), Some(dec("100")));
    }

    #[test]
    fn decimal_from_json_accepts_numbers_and_text() {
        assert_eq!(decimal_from_json(&serde_json::json!("3.10")), Some(dec("3.10")));
        assert_eq!(decimal_from_json(&serde_json::json!(4)), Some(dec("4")));
        assert_eq!(decimal_from_json(&serde_json::json!(null)), None);
        assert_eq!(decimal_from_json(&serde_json::json!("n/a")), None);
    }

    #[test]
    fn saturating_sum_pins_at_max() {
        assert_eq!(saturating_sum([dec("1.25"), dec("2.5")]), dec("3.75"));
        assert_eq!(saturating_sum([Decimal::MAX, Decimal::ONE]), Decimal::MAX);
        assert_eq!(saturating_sum(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn formatting_always_shows_cents() {
        assert_eq!(format_ref(dec("6")), "$6.00");
        assert_eq!(format_ref(dec("-0.001")), "$0.00");
        assert_eq!(format_local(dec("600.5")), "BsD 600.50");
    }
}
