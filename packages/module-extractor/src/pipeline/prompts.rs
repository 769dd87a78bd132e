//! LLM prompts for the two extraction passes.

use crate::traits::model::Prompt;
use crate::types::corpus::Chunk;

/// Pass 1: extract every module mentioned in one chunk.
pub const EXTRACTION_PROMPT: &str = r##"You are analyzing a piece of a product's documentation website. Identify every product feature (module) and its specific functionalities (submodules) described in the text.

The text may contain several pages; each page starts with a line "=== Page: <url> ===".
Headings are prefixed with one "#" per level and list items with "- ".

Output ONLY a JSON array. Each element must be an object with:
- "module": the feature name (string)
- "Description": what the feature does, based only on the text (string)
- "Submodules": an object mapping each functionality name to a string description, a list of strings, or a nested object of the same kind

Extract information ONLY from the provided text. Duplicates are fine; do not merge.
If you find no modules, return an empty array []."##;

/// Pass 2: merge the raw list into one clean catalog.
pub const SYNTHESIS_PROMPT: &str = r##"You will be given a JSON array of "modules" extracted from a product's documentation website. It was produced from small chunks of the full text, so it contains duplicates, fragments and overlapping entries.

Produce a single clean, de-duplicated and logically structured JSON array of modules:
- Merge modules describing the same feature, including case variants ("Billing" and "billing") and reordered names ("Account Settings" and "Settings, Account").
- Combine the descriptions of merged modules into one comprehensive, non-empty description.
- Merge their submodules and remove duplicate submodules.
- Remove entries that are clearly not product features.

Output ONLY the JSON array. Each element must be an object with "module" (string), "Description" (string) and "Submodules" (object whose values are strings, arrays of strings or nested objects)."##;

/// Build the Pass 1 prompt for a chunk.
pub fn extraction_prompt(chunk: &Chunk) -> Prompt {
    Prompt::new(EXTRACTION_PROMPT, chunk.text.clone())
}

/// Build the Pass 2 prompt around the serialized raw list.
pub fn synthesis_prompt(raw_json: &str) -> Prompt {
    Prompt::new(SYNTHESIS_PROMPT, raw_json)
}

/// Whether a prompt is a synthesis request.
pub fn is_synthesis(prompt: &Prompt) -> bool {
    prompt.system == SYNTHESIS_PROMPT
}
