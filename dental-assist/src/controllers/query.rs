//! Lenient decoding for query-string filters, where a form's "all" option
//! arrives as an empty value.

use serde::de::{DeserializeOwned, Error, IntoDeserializer};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

fn non_blank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Decode a string-valued enum, treating a blank value as unset.
pub(crate) fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match non_blank(deserializer)? {
        Some(value) => {
            T::deserialize(IntoDeserializer::<D::Error>::into_deserializer(value.as_str()))
                .map(Some)
        }
        None => Ok(None),
    }
}

/// Parse a number sent as text, treating a blank value as unset.
pub(crate) fn blank_as_none_parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_blank(deserializer)? {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid value {value:?}: {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Query {
        #[serde(deserialize_with = "blank_as_none")]
        status: Option<RequestStatus>,
        #[serde(deserialize_with = "blank_as_none_parsed")]
        rating: Option<f32>,
    }

    #[test]
    fn blank_values_are_unset() {
        let query: Query = serde_json::from_str(r#"{"status":"  ","rating":""}"#).unwrap();
        assert!(query.status.is_none());
        assert!(query.rating.is_none());

        let query: Query = serde_json::from_str("{}").unwrap();
        assert!(query.status.is_none());
    }

    #[test]
    fn present_values_are_decoded() {
        let query: Query =
            serde_json::from_str(r#"{"status":"approved","rating":" 4.5 "}"#).unwrap();
        assert_eq!(query.status, Some(RequestStatus::Approved));
        assert_eq!(query.rating, Some(4.5));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(serde_json::from_str::<Query>(r#"{"rating":"alto"}"#).is_err());
        assert!(serde_json::from_str::<Query>(r#"{"status":"pending"}"#).is_err());
    }
}
