use std::fmt;
use std::str::FromStr;

/// A string property registered on a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextProperty {
    key: String,
    value: String,
}

impl ContextProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// `true`/`false`, case-insensitive.
    pub fn as_bool(&self) -> Option<bool> {
        match self.value.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.parse()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.parse()
    }

    pub fn parse<T: FromStr>(&self) -> Option<T> {
        self.value.trim().parse().ok()
    }
}

impl fmt::Display for ContextProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
