//! Pass 2: a single consolidation call over the raw list.
//!
//! Never fails. If the raw list is over the input budget, the call fails
//! or its output cannot be used, the raw list comes back unmodified with
//! `synthesized: false`.

use indexmap::IndexMap;
use tracing::{info, instrument, warn};

use super::parse::parse_module_list;
use super::prompts::synthesis_prompt;
use crate::error::ModelError;
use crate::traits::model::LanguageModel;
use crate::types::config::{estimate_tokens, SynthesisConfig};
use crate::types::module::{FinalModuleRecord, ModuleRecord, RawModuleRecord};
use crate::types::result::{ExtractionResult, SynthesisOutcome};

/// Pass 2 synthesizer.
pub struct Synthesizer<M: LanguageModel> {
    model: M,
    config: SynthesisConfig,
}

impl<M: LanguageModel> Synthesizer<M> {
    pub fn new(model: M, config: SynthesisConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Merge the raw list with exactly one model call, or fall back to it.
    #[instrument(skip_all, fields(raw = raw.len(), model = self.model.model_name()))]
    pub async fn synthesize(&self, raw: Vec<RawModuleRecord>) -> (ExtractionResult, SynthesisOutcome) {
        if raw.is_empty() {
            info!("Nothing to synthesize");
            return (ExtractionResult::degraded(raw), SynthesisOutcome::SkippedEmpty);
        }

        let serialized = match serde_json::to_string(&raw) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Could not serialize raw list, returning it unsynthesized");
                let outcome = SynthesisOutcome::Unparsable {
                    reason: e.to_string(),
                };
                return (ExtractionResult::degraded(raw), outcome);
            }
        };

        let estimated_tokens = estimate_tokens(&serialized);
        let budget = self.config.input_budget_tokens;
        if estimated_tokens > budget {
            warn!(
                estimated_tokens,
                budget, "Raw list exceeds synthesis budget, returning it unsynthesized"
            );
            let outcome = SynthesisOutcome::SkippedOverBudget {
                estimated_tokens,
                budget,
            };
            return (ExtractionResult::degraded(raw), outcome);
        }

        info!(estimated_tokens, budget, "Starting Pass 2");
        let prompt = synthesis_prompt(&serialized);
        let output = match tokio::time::timeout(
            self.config.call_timeout,
            self.model.complete(&prompt, self.config.max_output_tokens),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout(self.config.call_timeout)),
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Synthesis call failed, returning raw list");
                let outcome = SynthesisOutcome::CallFailed {
                    reason: e.to_string(),
                };
                return (ExtractionResult::degraded(raw), outcome);
            }
        };

        let parsed = match parse_module_list(&output) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Synthesis output unparsable, returning raw list");
                let outcome = SynthesisOutcome::Unparsable {
                    reason: e.to_string(),
                };
                return (ExtractionResult::degraded(raw), outcome);
            }
        };

        let records = consolidate(parsed);
        if records.is_empty() {
            warn!("Synthesis returned no usable modules, returning raw list");
            let outcome = SynthesisOutcome::Unparsable {
                reason: "no modules in synthesis output".to_string(),
            };
            return (ExtractionResult::degraded(raw), outcome);
        }

        info!(raw = raw.len(), merged = records.len(), "Pass 2 finished");
        (ExtractionResult::synthesized(records), SynthesisOutcome::Merged)
    }
}

/// Enforce the final-record invariants on a synthesized list.
///
/// Records with the same case-insensitive name are merged into the first
/// one seen. Records without a name, or whose description is still empty
/// after merging, are dropped.
pub fn consolidate(records: Vec<ModuleRecord>) -> Vec<FinalModuleRecord> {
    let mut merged: IndexMap<String, ModuleRecord> = IndexMap::new();

    for mut record in records {
        record.module = record.module.trim().to_string();
        record.description = record.description.trim().to_string();
        if record.module.is_empty() {
            continue;
        }
        match merged.get_mut(&record.name_key()) {
            Some(existing) => existing.absorb(record),
            None => {
                merged.insert(record.name_key(), record);
            }
        }
    }

    merged
        .into_values()
        .filter(|record| {
            let keep = !record.description.is_empty();
            if !keep {
                warn!(module = %record.module, "Dropping module without description");
            }
            keep
        })
        .collect()
}
