use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Request metadata elevated into an entry's `httpRequest` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<Latency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Request latency as whole seconds plus a nanosecond remainder.
///
/// Written on the wire as a duration string (`"1.250000000s"`). Reads accept
/// that form or a `{seconds, nanos}` object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latency {
    pub seconds: i64,
    pub nanos: i32,
}

impl Latency {
    pub fn from_millis(millis: u64) -> Self {
        Self {
            seconds: (millis / 1000) as i64,
            nanos: ((millis % 1000) * 1_000_000) as i32,
        }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self {
            seconds: duration.as_secs() as i64,
            nanos: duration.subsec_nanos() as i32,
        }
    }

    fn parse(text: &str) -> Option<Self> {
        let body = text.trim().strip_suffix('s')?;
        let (whole, fraction) = match body.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (body, ""),
        };
        let seconds = whole.parse::<i64>().ok()?;
        if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let nanos = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<9}").parse::<i32>().ok()?
        };
        Some(Self { seconds, nanos })
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.seconds, self.nanos)
    }
}

impl Serialize for Latency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Latency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Parts {
                #[serde(default)]
                seconds: i64,
                #[serde(default)]
                nanos: i32,
            },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Latency::parse(&text)
                .ok_or_else(|| de::Error::custom(format!("invalid latency: {text}"))),
            Repr::Parts { seconds, nanos } => Ok(Latency { seconds, nanos }),
        }
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Option::<Size>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Size::Number(n)) => Ok(Some(n)),
        Some(Size::Text(text)) => text.trim().parse().map(Some).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latency_from_millis_splits_seconds_and_nanos() {
        let latency = Latency::from_millis(1_250);
        assert_eq!(latency.seconds, 1);
        assert_eq!(latency.nanos, 250_000_000);
        assert_eq!(latency.to_string(), "1.250000000s");
    }

    #[test]
    fn test_latency_reads_string_and_object_forms() {
        let from_text: Latency = serde_json::from_value(json!("0.5s")).unwrap();
        assert_eq!(from_text, Latency { seconds: 0, nanos: 500_000_000 });

        let from_parts: Latency =
            serde_json::from_value(json!({"seconds": 3, "nanos": 7})).unwrap();
        assert_eq!(from_parts, Latency { seconds: 3, nanos: 7 });

        let whole: Latency = serde_json::from_value(json!("12s")).unwrap();
        assert_eq!(whole, Latency { seconds: 12, nanos: 0 });
    }

    #[test]
    fn test_latency_rejects_garbage() {
        assert!(serde_json::from_value::<Latency>(json!("fast")).is_err());
        assert!(serde_json::from_value::<Latency>(json!("1.5")).is_err());
    }

    #[test]
    fn test_http_request_accepts_string_sizes() {
        let request: HttpRequest = serde_json::from_value(json!({
            "requestMethod": "POST",
            "requestUrl": "http://example.com/upload",
            "requestSize": "1024",
            "responseSize": 12,
            "status": 201,
        }))
        .unwrap();

        assert_eq!(request.request_size, Some(1024));
        assert_eq!(request.response_size, Some(12));
        assert_eq!(request.status, Some(201));
    }

    #[test]
    fn test_http_request_serializes_camel_case_without_nulls() {
        let request = HttpRequest {
            request_method: Some("GET".to_string()),
            remote_ip: Some("10.0.0.1".to_string()),
            latency: Some(Latency::from_millis(20)),
            ..Default::default()
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "requestMethod": "GET",
                "remoteIp": "10.0.0.1",
                "latency": "0.020000000s",
            })
        );
    }
}
