//! Wire models for the Xtream provider listing API.
//!
//! Providers are sloppy about JSON value types: ids arrive as numbers or
//! strings depending on the panel version, optional fields as `null` or
//! empty strings. Deserialization is deliberately forgiving.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "number_as_string")]
    pub category_id: String,
    pub category_name: String,
    #[serde(default)]
    pub parent_id: i64,
}

/// A live channel as listed by `get_live_streams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub stream_id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "optional_number_as_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "optional_number_as_string")]
    pub epg_channel_id: Option<String>,
    #[serde(default)]
    pub stream_icon: Option<String>,
    /// Catch-up window in days, when the provider advertises one.
    #[serde(default, deserialize_with = "optional_number_as_string")]
    pub tv_archive_duration: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
}

fn number_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn optional_number_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected string, number or null, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_id_accepts_number_or_string() {
        let cat: Category = serde_json::from_str(r#"{"category_id":1,"category_name":"News"}"#)
            .expect("numeric id");
        assert_eq!(cat.category_id, "1");

        let cat: Category = serde_json::from_str(r#"{"category_id":"7","category_name":"Sport"}"#)
            .expect("string id");
        assert_eq!(cat.category_id, "7");
    }

    #[test]
    fn channel_tolerates_sloppy_fields() {
        let json = r#"{
            "stream_id": 414142,
            "name": "CA EN: TSN 1",
            "category_id": 1,
            "epg_channel_id": null,
            "tv_archive_duration": "3",
            "unknown_field": {"ignored": true}
        }"#;
        let channel: Channel = serde_json::from_str(json).expect("sloppy channel");
        assert_eq!(channel.stream_id, 414142);
        assert_eq!(channel.category_id.as_deref(), Some("1"));
        assert!(channel.epg_channel_id.is_none());
        assert_eq!(channel.tv_archive_duration.as_deref(), Some("3"));
        assert!(channel.container_extension.is_none());
    }

    #[test]
    fn empty_epg_channel_id_becomes_none() {
        let json = r#"{"stream_id": 1, "name": "x", "epg_channel_id": ""}"#;
        let channel: Channel = serde_json::from_str(json).expect("empty epg id");
        assert!(channel.epg_channel_id.is_none());
    }
}
