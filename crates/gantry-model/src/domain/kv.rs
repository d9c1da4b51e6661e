use serde::{Deserialize, Serialize};

/// Single `KEY=VALUE` entry of a child-process environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    key: String,
    value: String,
}

impl KeyValue {
    /// Create a new entry.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a `KEY=VALUE` line; the value may itself contain `=`.
    ///
    /// Returns `None` when there is no `=` or the key is empty.
    pub fn parse(line: &str) -> Option<Self> {
        let (key, value) = line.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key, value))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl From<(&str, &str)> for KeyValue {
    fn from((key, value): (&str, &str)) -> Self {
        Self::new(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::KeyValue;

    #[test]
    fn parse_splits_on_first_equals() {
        let kv = KeyValue::parse("GIT_CLEAN_FLAGS=-ffdx -e a=b").unwrap();
        assert_eq!(kv.key(), "GIT_CLEAN_FLAGS");
        assert_eq!(kv.value(), "-ffdx -e a=b");
    }

    #[test]
    fn parse_rejects_missing_key_or_separator() {
        assert!(KeyValue::parse("NOVALUE").is_none());
        assert!(KeyValue::parse("=value").is_none());
    }

    #[test]
    fn parse_accepts_empty_value() {
        let kv = KeyValue::parse("EMPTY=").unwrap();
        assert_eq!(kv.value(), "");
    }
}
