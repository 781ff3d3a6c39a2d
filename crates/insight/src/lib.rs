//! Report-side building blocks: PII scrubbing, prompt rendering and
//! validation of the report document returned by the AI backend.

pub mod business;
pub mod output;
pub mod pii;
pub mod prompt;

pub use business::{niche_guideline, BusinessGoals, BusinessInfo, VisualPreference, GENERIC_GUIDELINE};
pub use output::{merge_warnings, sanitize_json_text, validate_report, SchemaViolation, AI_OUTPUT_SCHEMA};
pub use pii::{scrub_sample, PII_SENTINEL, PII_WARNING};
pub use prompt::{build as build_prompt, DatasetMeta, PromptContext};
