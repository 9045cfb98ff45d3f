use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Canonical form of a quest-type label: trimmed and uppercase. Blank labels
/// mean "no type".
pub fn normalize_quest_type(label: &str) -> Option<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Allow-list of quest-type labels, kept sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestTypeRegistry {
    labels: BTreeSet<String>,
}

impl QuestTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a label. Returns `false` for blank labels and labels that
    /// are already known (compared after normalization).
    pub fn add(&mut self, label: &str) -> bool {
        match normalize_quest_type(label) {
            Some(normalized) => self.labels.insert(normalized),
            None => false,
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        normalize_quest_type(label).map_or(false, |l| self.labels.contains(&l))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
