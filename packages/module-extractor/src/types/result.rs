//! Run outputs handed back to the caller.

use serde::{Deserialize, Serialize};

use super::module::ModuleRecord;
use crate::error::Result;

/// The artifact returned for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Final (or, when degraded, raw Pass 1) module records
    pub records: Vec<ModuleRecord>,

    /// True if Pass 2 succeeded
    pub synthesized: bool,
}

impl ExtractionResult {
    pub fn synthesized(records: Vec<ModuleRecord>) -> Self {
        Self {
            records,
            synthesized: true,
        }
    }

    /// Raw Pass 1 output returned unmodified.
    pub fn degraded(records: Vec<ModuleRecord>) -> Self {
        Self {
            records,
            synthesized: false,
        }
    }

    /// The JSON array shown to the user.
    pub fn to_json_array(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.records)?)
    }
}

/// Why Pass 2 did or did not produce the final records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SynthesisOutcome {
    /// The model merged the raw list
    Merged,
    /// Nothing to merge; no call was made
    SkippedEmpty,
    /// Serialized raw list exceeded the input budget; no call was made
    SkippedOverBudget { estimated_tokens: usize, budget: usize },
    /// The call failed after being issued
    CallFailed { reason: String },
    /// The call returned output that held no usable module list
    Unparsable { reason: String },
}

impl SynthesisOutcome {
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Merged)
    }
}

/// Statistics for one root URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub root_url: String,
    pub pages_fetched: usize,
    pub fetch_failures: usize,
    pub corpus_segments: usize,
    pub chunks: usize,
    pub raw_records: usize,
    /// Chunks whose output could not be used
    pub soft_failures: usize,
    /// Run stopped early on request
    pub cancelled: bool,
    pub synthesis: SynthesisOutcome,
    pub result: ExtractionResult,
}

/// A root URL that failed as a whole within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteFailure {
    pub url: String,
    pub reason: String,
}

/// Combined result for several root URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// All sites' records, in input order
    pub result: ExtractionResult,
    pub reports: Vec<PipelineReport>,
    pub failures: Vec<SiteFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_array_is_records_only() {
        let result = ExtractionResult::degraded(vec![ModuleRecord::new("Search", "Find things")]);
        let value = result.to_json_array().unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["module"], "Search");
        assert!(!result.synthesized);
    }
}
