use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tracked entity (a token address).
///
/// Always stored lowercased so the same token maps to the same checkpoint,
/// sink file and dedup entry regardless of how it was spelled in the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for EntityId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque pagination token issued by the upstream service.
///
/// Only two places produce a `Cursor`: decoding a page response and loading a
/// checkpoint. Callers can read it back for persistence and display, but the
/// contents are never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub(crate) fn from_persisted(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_is_lowercased_and_trimmed() {
        let id = EntityId::new("  0xAbCdEF0123 ");
        assert_eq!(id.as_str(), "0xabcdef0123");
        assert_eq!(id, EntityId::new("0xabcdef0123"));
    }

    #[test]
    fn entity_id_deserializes_normalized() {
        let id: EntityId = serde_json::from_str("\"0xDEAD\"").unwrap();
        assert_eq!(id.as_str(), "0xdead");
    }

    #[test]
    fn cursor_decodes_verbatim() {
        let cursor: Cursor = serde_json::from_str("\"AbC==:12/x\"").unwrap();
        assert_eq!(cursor.as_str(), "AbC==:12/x");
        assert_eq!(cursor.to_string(), "AbC==:12/x");
    }
}
