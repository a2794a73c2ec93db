use super::tokenizer::{Token, TokenizedPayload};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Key/value pair of a data set. A removed entry is a tombstone: it only ever
/// appears in recorded deltas, never in effective state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub removed: bool,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            removed: false,
        }
    }

    pub fn tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            removed: true,
        }
    }

    fn live_value(&self) -> Option<&str> {
        if self.removed {
            None
        } else {
            self.value.as_deref()
        }
    }
}

/// Key-ordered set of entries.
///
/// Equality ignores tombstones: two sets are equal when their live entries
/// carry the same values.
#[derive(Debug, Clone, Default)]
pub struct EntrySet {
    entries: BTreeMap<String, Entry>,
}

/// Result of applying a tokenized payload onto a base set.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySetChange {
    /// Effective state after the payload; never holds tombstones.
    pub state: EntrySet,
    /// Entries that changed relative to the base, with tombstones for removals.
    pub delta: EntrySet,
    /// The payload carried a reset trigger and the base was discarded.
    pub reset: bool,
}

impl EntrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set of live entries from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(key, value)| Entry::new(key, value))
            .collect()
    }

    /// Number of entries, tombstones included (the rendered `count`).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Value of a live entry.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Entry::live_value)
    }

    pub fn is_removed(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn insert(&mut self, entry: Entry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.entries.remove(key)
    }

    /// Applies upsert and remove tokens left to right onto this set, or onto
    /// an empty set when the payload carries a reset trigger.
    pub fn apply(&self, payload: &TokenizedPayload) -> EntrySetChange {
        let reset = payload.is_reset();
        let mut state = if reset { EntrySet::new() } else { self.clone() };
        let mut touched = BTreeSet::new();
        for token in &payload.tokens {
            match token {
                Token::Upsert { key, value } => {
                    state.insert(Entry::new(key.clone(), value.clone()));
                    touched.insert(key.as_str());
                }
                Token::Remove { key } => {
                    if state.remove(key).is_some() {
                        touched.insert(key.as_str());
                    }
                }
                Token::Reset(_) => {}
            }
        }

        let delta = if reset {
            state.clone()
        } else {
            touched
                .into_iter()
                .filter_map(|key| match (self.value(key), state.value(key)) {
                    (before, Some(after)) if before != Some(after) => Some(Entry::new(key, after)),
                    (Some(_), None) => Some(Entry::tombstone(key)),
                    _ => None,
                })
                .collect()
        };

        EntrySetChange {
            state,
            delta,
            reset,
        }
    }

    /// Folds a recorded delta into this set: live entries overwrite,
    /// tombstones delete.
    pub fn fold_delta(&mut self, delta: &EntrySet) {
        for entry in delta.iter() {
            if entry.removed {
                self.entries.remove(&entry.key);
            } else {
                self.insert(entry.clone());
            }
        }
    }

    fn live(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .filter_map(|entry| entry.live_value().map(|value| (entry.key.as_str(), value)))
    }
}

impl PartialEq for EntrySet {
    fn eq(&self, other: &Self) -> bool {
        self.live().eq(other.live())
    }
}

impl FromIterator<Entry> for EntrySet {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut set = EntrySet::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

impl Serialize for EntrySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.values())
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}
