//! Forgiving deserializers for node parameters
//!
//! Flow editors store every field as text, while hand-written payloads use
//! real JSON numbers and booleans. These helpers accept both and treat an
//! empty string the same as an absent field.

use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn loose<'de, D>(deserializer: D) -> Result<Option<Loose>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(match value {
        Some(Loose::Text(text)) if text.trim().is_empty() => None,
        other => other,
    })
}

/// Optional string; numbers and booleans are rendered as text.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose(deserializer)?.map(|value| match value {
        Loose::Bool(b) => b.to_string(),
        Loose::Int(n) => n.to_string(),
        Loose::Float(f) => f.to_string(),
        Loose::Text(text) => text,
    }))
}

/// Optional signed integer from a number or numeric text.
pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match loose(deserializer)? {
        None => Ok(None),
        Some(Loose::Int(n)) => Ok(Some(n)),
        #[allow(clippy::cast_possible_truncation)]
        Some(Loose::Float(f)) if f.fract() == 0.0 => Ok(Some(f as i64)),
        Some(Loose::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected an integer, got '{text}'"))),
        Some(_) => Err(de::Error::custom("expected an integer")),
    }
}

/// Optional unsigned 32-bit integer from a number or numeric text.
pub fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    opt_i64(deserializer)?
        .map(|n| {
            u32::try_from(n)
                .map_err(|_| de::Error::custom(format!("expected a non-negative count, got {n}")))
        })
        .transpose()
}

/// Optional boolean from a bool, `0`/`1`, or `true`/`false`/`yes`/`no`/`on`/`off`.
pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match loose(deserializer)? {
        None => Ok(None),
        Some(Loose::Bool(b)) => Ok(Some(b)),
        Some(Loose::Int(n)) => Ok(Some(n != 0)),
        Some(Loose::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(de::Error::custom(format!("expected a boolean, got '{text}'"))),
        },
        Some(Loose::Float(_)) => Err(de::Error::custom("expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "super::opt_i64")]
        count: Option<i64>,
        #[serde(default, deserialize_with = "super::opt_bool")]
        flag: Option<bool>,
        #[serde(default, deserialize_with = "super::opt_string")]
        label: Option<String>,
        #[serde(default, deserialize_with = "super::opt_u32")]
        limit: Option<u32>,
    }

    #[test]
    fn accepts_text_and_native_values() {
        let probe: Probe =
            serde_json::from_value(json!({"count": "60", "flag": "true", "label": 7, "limit": 10}))
                .unwrap();
        assert_eq!(probe.count, Some(60));
        assert_eq!(probe.flag, Some(true));
        assert_eq!(probe.label.as_deref(), Some("7"));
        assert_eq!(probe.limit, Some(10));
    }

    #[test]
    fn empty_strings_and_nulls_are_absent() {
        let probe: Probe =
            serde_json::from_value(json!({"count": "", "flag": null, "label": "  "})).unwrap();
        assert_eq!(probe.count, None);
        assert_eq!(probe.flag, None);
        assert_eq!(probe.label, None);
        assert_eq!(probe.limit, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_value::<Probe>(json!({"count": "sixty"})).is_err());
        assert!(serde_json::from_value::<Probe>(json!({"flag": "maybe"})).is_err());
        assert!(serde_json::from_value::<Probe>(json!({"limit": -1})).is_err());
    }
}
