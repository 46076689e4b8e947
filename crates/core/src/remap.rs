use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::{IngestError, Result};

/// Bijection between external word identifiers and dense internal indices.
///
/// Built once per request; read-only afterwards, so it is shared across
/// script workers without locking.
#[derive(Debug, Clone, Default)]
pub struct IdentifierRemapper {
    to_internal: HashMap<String, usize>,
    to_external: Vec<String>,
}

impl IdentifierRemapper {
    /// Assign each id the index of its position in `ids`.
    pub fn new<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut to_internal = HashMap::new();
        let mut to_external = Vec::new();

        for (index, id) in ids.into_iter().enumerate() {
            let id: String = id.into();
            match to_internal.entry(id) {
                Entry::Occupied(existing) => {
                    return Err(IngestError::DuplicateIdentifier {
                        id: existing.key().clone(),
                        first: *existing.get(),
                        second: index,
                    });
                }
                Entry::Vacant(slot) => {
                    to_external.push(slot.key().clone());
                    slot.insert(index);
                }
            }
        }

        Ok(Self {
            to_internal,
            to_external,
        })
    }

    pub fn len(&self) -> usize {
        self.to_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_external.is_empty()
    }

    pub fn to_internal(&self, external_id: &str) -> Result<usize> {
        self.to_internal
            .get(external_id)
            .copied()
            .ok_or_else(|| IngestError::UnknownIdentifier {
                id: external_id.to_string(),
            })
    }

    pub fn to_external(&self, index: usize) -> Result<&str> {
        self.to_external
            .get(index)
            .map(String::as_str)
            .ok_or(IngestError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    /// External ids for every index in `[start, end]`, in order.
    pub fn externals(&self, start: usize, end: usize) -> Result<Vec<String>> {
        if end >= self.len() {
            return Err(IngestError::IndexOutOfRange {
                index: end,
                len: self.len(),
            });
        }
        Ok(self
            .to_external
            .get(start..=end)
            .map(|ids| ids.to_vec())
            .unwrap_or_default())
    }
}
