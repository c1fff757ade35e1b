use chrono::NaiveDateTime;

/// Wire and storage format for due times: naive local, no zone marker.
pub const LOCAL_NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const LOCAL_NAIVE_FORMAT_NO_SECONDS: &str = "%Y-%m-%dT%H:%M";

/// Parses a naive local timestamp as emitted by the inference service.
/// Tolerates a missing seconds field; anything else is rejected.
pub fn parse_local_naive(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    NaiveDateTime::parse_from_str(trimmed, LOCAL_NAIVE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, LOCAL_NAIVE_FORMAT_NO_SECONDS))
        .ok()
}

pub fn format_local_naive(dt: NaiveDateTime) -> String {
    dt.format(LOCAL_NAIVE_FORMAT).to_string()
}

pub mod local_naive_serde {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::LOCAL_NAIVE_FORMAT;

    pub fn serialize<S>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(LOCAL_NAIVE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, LOCAL_NAIVE_FORMAT).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        use super::LOCAL_NAIVE_FORMAT;

        pub fn serialize<S>(dt: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let opt = Option::<String>::deserialize(deserializer)?;
            match opt {
                Some(raw) => NaiveDateTime::parse_from_str(&raw, LOCAL_NAIVE_FORMAT)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
