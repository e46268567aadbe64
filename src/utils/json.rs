use chrono::NaiveDate;
use serde_json::Value;

/// A PATCH field that may be absent, explicitly null, or a string.
pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

/// `None` when omitted, `Some(None)` to clear, `Some(Some(date))` to set.
pub fn nullable_date(field: &str, value: Option<&Value>) -> Result<Option<Option<NaiveDate>>, String> {
    match classify_nullable(value).map_err(|err| format!("{field}: {err}"))? {
        NullableValue::Omitted => Ok(None),
        NullableValue::Null => Ok(Some(None)),
        NullableValue::String(raw) if raw.trim().is_empty() => Ok(Some(None)),
        NullableValue::String(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(|date| Some(Some(date)))
            .map_err(|_| format!("{field} must be a YYYY-MM-DD date")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn dates_distinguish_omitted_from_cleared() {
        assert_eq!(nullable_date("delivery_date", None).unwrap(), None);
        assert_eq!(
            nullable_date("delivery_date", Some(&Value::Null)).unwrap(),
            Some(None)
        );
        assert_eq!(
            nullable_date("delivery_date", Some(&json!("2026-05-01"))).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 1).map(Some)
        );
        assert!(nullable_date("delivery_date", Some(&json!(12))).is_err());
        assert!(nullable_date("delivery_date", Some(&json!("01.05.2026"))).is_err());
    }
}
