//! Identifier for watched change streams.

use floe_core::ComponentKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of one watched change stream in the `streams:` map.
///
/// The key labels logs and metrics for every partition of the stream.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(ComponentKey);

impl StreamKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(ComponentKey::new(id))
    }

    pub fn id(&self) -> &str {
        self.0.id()
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StreamKey {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let key = StreamKey::new("orders");
        assert_eq!(key.id(), "orders");
        assert_eq!(format!("{key}"), "orders");
    }

    #[test]
    fn test_deserializes_from_plain_string() {
        let key: StreamKey = serde_yaml::from_str("payments").unwrap();
        assert_eq!(key, StreamKey::new("payments"));
    }
}
