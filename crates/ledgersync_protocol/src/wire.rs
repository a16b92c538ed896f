//! Lenient field decoders for rows coming back from the remote store.
//!
//! Relational DECIMAL columns are serialized as JSON strings and DATE columns
//! may come back as full timestamps, so both are normalized on input. Output
//! always uses plain numbers and `YYYY-MM-DD`.

use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Calendar date format used on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a wire date, discarding any time component (`2024-01-01T08:00:00Z`).
pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    let day = raw.trim().split('T').next().unwrap_or_default();
    NaiveDate::parse_from_str(day, DATE_FORMAT)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDecimal {
    Number(f64),
    Text(String),
}

/// Decodes an amount given either as a JSON number or a numeric string.
pub(crate) fn decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDecimal::deserialize(deserializer)? {
        RawDecimal::Number(n) => Ok(n),
        RawDecimal::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| de::Error::custom(format!("invalid decimal {s:?}: {e}"))),
    }
}

/// Decodes a date given as `YYYY-MM-DD` or an ISO-8601 timestamp.
pub(crate) fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(|e| de::Error::custom(format!("invalid date {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "decimal")]
        cost: f64,
        #[serde(deserialize_with = "date")]
        date: NaiveDate,
    }

    #[test]
    fn timestamp_dates_are_truncated() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_date("2024-03-09").unwrap(), expected);
        assert_eq!(parse_date("2024-03-09T00:00:00.000Z").unwrap(), expected);
        assert!(parse_date("09/03/2024").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn decimal_columns_accept_strings() {
        let row: Row = serde_json::from_str(r#"{"cost":"12.50","date":"2024-01-01"}"#).unwrap();
        assert_eq!(row.cost, 12.5);

        let row: Row = serde_json::from_str(r#"{"cost":3,"date":"2024-01-01T10:00:00Z"}"#).unwrap();
        assert_eq!(row.cost, 3.0);
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        assert!(serde_json::from_str::<Row>(r#"{"cost":"abc","date":"2024-01-01"}"#).is_err());
    }
}
