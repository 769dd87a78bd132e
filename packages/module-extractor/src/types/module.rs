//! Module records - the unit of extraction output.
//!
//! The wire shape follows the JSON the UI displays:
//!
//! ```json
//! {"module": "Billing", "Description": "...", "Submodules": {"Invoices": "..."}}
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered submodule mapping (name -> value).
pub type Submodules = IndexMap<String, SubmoduleValue>;

/// A module with its description and submodules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Module name
    pub module: String,

    /// What the module covers
    #[serde(rename = "Description", default)]
    pub description: String,

    /// Named submodules, arbitrarily nested
    #[serde(rename = "Submodules", default)]
    pub submodules: Submodules,
}

/// Per-chunk Pass 1 output. Duplicates across chunks are expected.
pub type RawModuleRecord = ModuleRecord;

/// Synthesis output. Names are case-insensitively distinct.
pub type FinalModuleRecord = ModuleRecord;

/// Value of a single submodule entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmoduleValue {
    /// Plain description
    Text(String),
    /// List of details
    List(Vec<String>),
    /// Further submodules
    Nested(Submodules),
}

impl ModuleRecord {
    /// Create a record with no submodules.
    pub fn new(module: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            description: description.into(),
            submodules: Submodules::new(),
        }
    }

    /// Add a submodule.
    pub fn with_submodule(mut self, name: impl Into<String>, value: impl Into<SubmoduleValue>) -> Self {
        self.submodules.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive key used to detect the same module across chunks.
    pub fn name_key(&self) -> String {
        self.module.trim().to_lowercase()
    }

    /// Fold `other` into this record.
    ///
    /// Keeps this record's name, appends a differing description and
    /// merges submodules key by key.
    pub fn absorb(&mut self, other: ModuleRecord) {
        let incoming = other.description.trim();
        if self.description.trim().is_empty() {
            self.description = incoming.to_string();
        } else if !incoming.is_empty() && !self.description.contains(incoming) {
            self.description.push(' ');
            self.description.push_str(incoming);
        }
        merge_submodules(&mut self.submodules, other.submodules);
    }
}

/// Merge `incoming` into `target`; existing keys win unless both sides nest.
pub fn merge_submodules(target: &mut Submodules, incoming: Submodules) {
    for (name, value) in incoming {
        match target.get_mut(&name) {
            None => {
                target.insert(name, value);
            }
            Some(existing) => existing.merge(value),
        }
    }
}

impl SubmoduleValue {
    fn merge(&mut self, other: SubmoduleValue) {
        match (self, other) {
            (SubmoduleValue::Nested(mine), SubmoduleValue::Nested(theirs)) => {
                merge_submodules(mine, theirs)
            }
            (SubmoduleValue::List(mine), SubmoduleValue::List(theirs)) => {
                for item in theirs {
                    if !mine.contains(&item) {
                        mine.push(item);
                    }
                }
            }
            (SubmoduleValue::Text(mine), SubmoduleValue::Text(theirs)) if mine.trim().is_empty() => {
                *mine = theirs;
            }
            _ => {}
        }
    }
}

impl From<&str> for SubmoduleValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SubmoduleValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for SubmoduleValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<Submodules> for SubmoduleValue {
    fn from(map: Submodules) -> Self {
        Self::Nested(map)
    }
}
