//! Token list: the ordered set of addresses to download.
//!
//! Stored as a JSON array of address strings (`data/token_list.json`).
//! Addresses are normalized to lowercase; blank entries are dropped and
//! repeats keep their first position. Each address names a sink and a
//! checkpoint file, so entries that are not plain file names are rejected.

use super::provider::DataError;
use crate::domain::EntityId;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenList {
    tokens: Vec<EntityId>,
}

impl TokenList {
    /// Load a token list from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::TokenList(format!("read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Parse a token list from a JSON array of strings.
    pub fn from_json(content: &str) -> Result<Self, DataError> {
        let raw: Vec<String> = serde_json::from_str(content)
            .map_err(|e| DataError::TokenList(format!("parse token list: {e}")))?;
        Self::from_addresses(raw)
    }

    pub fn from_addresses<I, S>(addresses: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for raw in addresses {
            let id = EntityId::new(raw);
            if id.is_empty() {
                continue;
            }
            if !is_plain_file_name(id.as_str()) {
                return Err(DataError::TokenList(format!(
                    "address {:?} is not usable as a file name",
                    id.as_str()
                )));
            }
            if seen.insert(id.clone()) {
                tokens.push(id);
            }
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[EntityId] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn is_plain_file_name(name: &str) -> bool {
    name != "." && !name.contains("..") && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}
